//! Error types for the Piwigo to digiKam transfer.
//!
//! Errors fall into three groups:
//! - gallery errors (authentication, protocol, malformed responses, transport)
//! - collection errors (invalid input, filesystem, name conflicts, catalog)
//! - run control (configuration, cancellation)
//!
//! Per-image failures are wrapped in [`Error::SaveImage`] so the caller can
//! report the image id without re-querying state.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for transfer operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The gallery rejected the credentials or reported a login failure
    #[error("failed to login to Piwigo: {0}")]
    Authentication(String),

    /// A session call was made before a successful login
    #[error("not logged in to Piwigo")]
    NotLoggedIn,

    /// The gallery answered `stat=fail` on a non-login call
    #[error("Piwigo API error: {}{}", .message, format_code(.code))]
    Protocol {
        /// Message reported by the service
        message: String,
        /// Service error code, when one was sent
        code: Option<String>,
    },

    /// The body was empty or not JSON-looking (typically an HTML error page)
    #[error("server returned {0}")]
    MalformedResponse(String),

    /// The body looked like JSON but did not parse
    #[error("invalid JSON from server: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection, DNS, TLS, HTTP status or body read failure
    #[error("network error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("filesystem error at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every collision suffix for a file name is already taken
    #[error("too many file name conflicts for {0:?}")]
    NameConflicts(PathBuf),

    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    /// A single image could not be saved; the run may continue
    #[error("failed to save image {id}: {source}")]
    SaveImage {
        id: i64,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("transfer worker panicked")]
    WorkerPanicked,
}

fn format_code(code: &Option<String>) -> String {
    match code {
        Some(code) if !code.is_empty() => format!(" (error code: {})", code),
        _ => String::new(),
    }
}

impl Error {
    pub(crate) fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Error::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_includes_code() {
        let err = Error::Protocol {
            message: "Invalid category".to_string(),
            code: Some("1003".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Piwigo API error: Invalid category (error code: 1003)"
        );

        let err = Error::Protocol {
            message: "Access denied".to_string(),
            code: None,
        };
        assert_eq!(err.to_string(), "Piwigo API error: Access denied");
    }

    #[test]
    fn test_save_image_error_carries_id() {
        let err = Error::SaveImage {
            id: 42,
            source: Box::new(Error::InvalidArgument("image data is empty".to_string())),
        };
        let text = err.to_string();
        assert!(text.contains("42"));
        assert!(text.contains("image data is empty"));
    }
}
