//! Camera backed by a single image file on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::{info, warn};

use crate::camera::Camera;
use crate::error::{MailError, Result};
use crate::model::sensor::SensorState;
use crate::publish::StatePublisher;

/// Serves whatever is currently at `file_path`, re-reading it on each request.
#[derive(Debug)]
pub struct LocalFileCamera {
    name: String,
    file_path: RwLock<PathBuf>,
}

impl LocalFileCamera {
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_path: RwLock::new(file_path.into()),
        }
    }

    /// The file currently served.
    pub fn file_path(&self) -> PathBuf {
        self.file_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Point the camera at a new file and refresh its state on the host.
    pub fn update_file_path(
        &self,
        file_path: impl AsRef<Path>,
        publisher: &dyn StatePublisher,
    ) -> Result<()> {
        let file_path = file_path.as_ref();
        if file_path.as_os_str().is_empty() {
            return Err(MailError::InvalidPath("camera file path is empty".into()));
        }
        *self
            .file_path
            .write()
            .unwrap_or_else(PoisonError::into_inner) = file_path.to_path_buf();
        info!(name = %self.name, path = %file_path.display(), "Camera file path updated");
        publisher.set_state(&SensorState::camera(&self.name, self.attributes()))
    }
}

impl Camera for LocalFileCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn camera_image(&self) -> Option<Vec<u8>> {
        let path = self.file_path();
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(
                    name = %self.name,
                    path = %path.display(),
                    error = %e,
                    "Could not read camera image file"
                );
                None
            }
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        attrs.insert(
            "file_path".to_string(),
            self.file_path().display().to_string(),
        );
        attrs
    }
}
