//! Placeholder image shown when no digest image was found.

use std::path::Path;

use tracing::{debug, warn};

/// Built-in "no mail today" PNG.
pub const NO_MAIL_PNG: &[u8] = include_bytes!("../../assets/no_mail.png");

/// Load the placeholder image.
///
/// An override that cannot be read is logged and the built-in image is used.
pub fn load_fallback(override_path: Option<&Path>) -> Vec<u8> {
    let Some(path) = override_path else {
        return NO_MAIL_PNG.to_vec();
    };
    match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => {
            debug!(path = %path.display(), size = bytes.len(), "Using custom placeholder image");
            bytes
        }
        Ok(_) => {
            warn!(path = %path.display(), "Placeholder image is empty, using built-in image");
            NO_MAIL_PNG.to_vec()
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Could not read placeholder image, using built-in image"
            );
            NO_MAIL_PNG.to_vec()
        }
    }
}

/// Guess an image MIME type from its leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_png() {
        assert_eq!(sniff_content_type(NO_MAIL_PNG), "image/png");
        assert_eq!(load_fallback(None), NO_MAIL_PNG);
    }

    #[test]
    fn test_override_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.gif");
        std::fs::write(&path, b"GIF89a....").unwrap();
        let img = load_fallback(Some(&path));
        assert_eq!(img, b"GIF89a....");
        assert_eq!(sniff_content_type(&img), "image/gif");
    }

    #[test]
    fn test_missing_override_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let img = load_fallback(Some(&dir.path().join("missing.png")));
        assert_eq!(img, NO_MAIL_PNG);
    }
}
