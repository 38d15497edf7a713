//! Service loop: scan at startup, on every interval, and on demand.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::camera::LocalFileCamera;
use crate::mailbox::Connect;
use crate::publish::StatePublisher;
use crate::scanner::MailScanner;

/// Requests accepted by a running [`Service`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a scan now (the `scan_mail` action).
    ScanMail,
    /// Point the file camera at a new image.
    UpdateFilePath(PathBuf),
    /// Leave the loop after the current command.
    Shutdown,
}

/// Cloneable sender for [`Command`]s.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    tx: Sender<Command>,
}

impl ServiceHandle {
    /// Trigger a manual scan. Returns `false` if the service has stopped.
    pub fn scan_mail(&self) -> bool {
        self.tx.send(Command::ScanMail).is_ok()
    }

    /// Change the file camera's path. Returns `false` if the service has stopped.
    pub fn update_file_path(&self, path: impl Into<PathBuf>) -> bool {
        self.tx.send(Command::UpdateFilePath(path.into())).is_ok()
    }

    /// Ask the service to stop. Returns `false` if it already has.
    pub fn shutdown(&self) -> bool {
        self.tx.send(Command::Shutdown).is_ok()
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub scans_ok: u64,
    pub scans_failed: u64,
}

/// Owns the scanner and runs it on schedule.
pub struct Service<C: Connect> {
    scanner: MailScanner<C>,
    interval: Duration,
    publisher: Arc<dyn StatePublisher>,
    file_camera: Option<Arc<LocalFileCamera>>,
    rx: Receiver<Command>,
    stats: ServiceStats,
}

impl<C: Connect> Service<C> {
    pub fn new(
        scanner: MailScanner<C>,
        interval: Duration,
        publisher: Arc<dyn StatePublisher>,
    ) -> (Self, ServiceHandle) {
        let (tx, rx) = mpsc::channel();
        let service = Self {
            scanner,
            interval,
            publisher,
            file_camera: None,
            rx,
            stats: ServiceStats::default(),
        };
        (service, ServiceHandle { tx })
    }

    /// Route [`Command::UpdateFilePath`] to this camera.
    pub fn with_file_camera(mut self, camera: Arc<LocalFileCamera>) -> Self {
        self.file_camera = Some(camera);
        self
    }

    /// Run until [`Command::Shutdown`] arrives or every handle is dropped.
    pub fn run(mut self) -> ServiceStats {
        info!(interval_secs = self.interval.as_secs(), "Mail scan service starting");
        self.scan_once("startup");
        let mut next_due = self.next_due();

        loop {
            let received = match next_due {
                Some(due) => self
                    .rx
                    .recv_timeout(due.saturating_duration_since(Instant::now())),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Err(RecvTimeoutError::Timeout) => {
                    self.scan_once("schedule");
                    next_due = self.next_due();
                }
                Ok(Command::ScanMail) => self.scan_once("manual"),
                Ok(Command::UpdateFilePath(path)) => self.update_file_path(path),
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!(
            scans_ok = self.stats.scans_ok,
            scans_failed = self.stats.scans_failed,
            "Mail scan service stopped"
        );
        self.stats
    }

    /// When the next scheduled scan is due, or `None` if the interval is too
    /// long to represent; then only commands wake the loop.
    fn next_due(&self) -> Option<Instant> {
        let due = Instant::now().checked_add(self.interval);
        if due.is_none() {
            warn!(
                interval_secs = self.interval.as_secs(),
                "Scan interval out of range, scheduled scans disabled"
            );
        }
        due
    }

    fn scan_once(&mut self, trigger: &'static str) {
        debug!(trigger, "Running mail scan");
        // Failures are already logged by the scanner; the next trigger retries.
        match self.scanner.scan() {
            Ok(_) => self.stats.scans_ok += 1,
            Err(_) => self.stats.scans_failed += 1,
        }
    }

    fn update_file_path(&self, path: PathBuf) {
        let Some(camera) = &self.file_camera else {
            warn!(path = %path.display(), "No file camera configured, ignoring path update");
            return;
        };
        if let Err(e) = camera.update_file_path(&path, self.publisher.as_ref()) {
            warn!(path = %path.display(), error = %e, "Could not update camera file path");
        }
    }
}
