//! Camera entities: hand one image per request to the host.

pub mod local_file;
pub mod mail;
pub mod writer;

use std::collections::BTreeMap;

pub use local_file::LocalFileCamera;
pub use mail::MailCamera;
pub use writer::FrameWriter;

/// Default display name of the camera entity.
pub const DEFAULT_NAME: &str = "USPS Mail Pictures";

/// The host's view of a camera: a name, a still frame on demand, attributes.
pub trait Camera: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Raw bytes of the next frame, or `None` if there is nothing to show.
    fn camera_image(&self) -> Option<Vec<u8>>;

    /// Extra state attributes exposed with the entity.
    fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
