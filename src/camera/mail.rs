//! Round-robin camera over the images extracted by the last scan.

use std::collections::BTreeMap;

use tracing::trace;

use crate::camera::Camera;
use crate::model::scan::ScanHandle;

/// Serves the scanner's images one per request, wrapping after the last.
#[derive(Debug, Clone)]
pub struct MailCamera {
    name: String,
    handle: ScanHandle,
}

impl MailCamera {
    pub fn new(name: impl Into<String>, handle: ScanHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    /// Return the image at the cursor of the current scan result and
    /// advance the cursor.
    ///
    /// Works on one snapshot throughout, so a scan that replaces the result
    /// concurrently affects only the following calls.
    pub fn next_image(&self) -> Vec<u8> {
        let current = self.handle.snapshot();
        let idx = current.advance();
        trace!(index = idx, of = current.images().len(), "Serving mail image");
        current.images()[idx].clone()
    }
}

impl Camera for MailCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn camera_image(&self) -> Option<Vec<u8>> {
        Some(self.next_image())
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let current = self.handle.snapshot();
        let mut attrs = BTreeMap::new();
        attrs.insert("images".to_string(), current.images().len().to_string());
        attrs.insert("letters".to_string(), current.letter_count().to_string());
        attrs
    }
}
