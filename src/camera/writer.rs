//! Background thread that writes camera frames to a file the host polls.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::error::{MailError, Result};

/// Write the camera's next frame to `path` atomically.
///
/// Returns `false` (and leaves the file untouched) if the camera had no frame.
pub fn write_frame(camera: &dyn Camera, path: &Path) -> Result<bool> {
    let Some(frame) = camera.camera_image() else {
        return Ok(false);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| MailError::InvalidPath(path.display().to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MailError::io(parent, e))?;
    }

    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
    std::fs::write(&tmp, &frame).map_err(|e| MailError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| MailError::io(path, e))?;
    debug!(path = %path.display(), size = frame.len(), "Wrote camera frame");
    Ok(true)
}

/// Periodically writes frames from a camera until stopped.
pub struct FrameWriter {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FrameWriter {
    /// Start the writer thread. The first frame is written immediately.
    pub fn spawn(camera: Arc<dyn Camera>, output: PathBuf, refresh: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("frame-writer".into())
            .spawn(move || {
                info!(
                    camera = camera.name(),
                    path = %output.display(),
                    refresh_secs = refresh.as_secs(),
                    "Frame writer started"
                );
                loop {
                    if let Err(e) = write_frame(camera.as_ref(), &output) {
                        warn!(error = %e, "Failed to write camera frame");
                    }
                    match stop_rx.recv_timeout(refresh) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Frame writer stopped");
            })
            .map_err(|e| MailError::io("<frame-writer thread>", e))?;

        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stop the thread and wait for it to finish.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Frame writer thread panicked");
            }
        }
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
