//! Centralized error types for usps-mail.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the usps-mail library.
#[derive(Error, Debug)]
pub enum MailError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is missing, unreadable, or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The TCP connection to the mail server could not be established.
    #[error("Could not connect to {host}:{port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    /// The TLS handshake with the mail server failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The server rejected the configured credentials.
    #[error("Failed to authenticate as '{username}': {reason}")]
    Authentication { username: String, reason: String },

    /// An IMAP command (SELECT, SEARCH, FETCH, LOGOUT) failed.
    #[error("IMAP {command} failed: {reason}")]
    Imap {
        command: &'static str,
        reason: String,
    },

    /// A fetched message could not be decoded.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// Publishing a state to the host platform failed.
    #[error("Failed to publish '{entity_id}': {reason}")]
    Publish { entity_id: String, reason: String },

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `Imap` variant for the given command.
    pub fn imap(command: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Imap {
            command,
            reason: reason.to_string(),
        }
    }

    /// `true` for failures that happen before a usable session exists.
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Tls(_) | Self::Authentication { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_message_names_user() {
        let err = MailError::Authentication {
            username: "me@example.com".into(),
            reason: "NO [AUTHENTICATIONFAILED]".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("me@example.com"));
        assert!(msg.contains("AUTHENTICATIONFAILED"));
    }

    #[test]
    fn test_session_failure_classification() {
        assert!(MailError::Tls("handshake".into()).is_session_failure());
        assert!(!MailError::imap("SEARCH", "BAD").is_session_failure());
    }
}
