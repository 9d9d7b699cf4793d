//! Domain-level error types for fiverr-inbox-export.
//!
//! All errors are typed with `thiserror` and carry enough context to be shown
//! to the user as a single line in an error event.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Http { status: u16, url: String },

    /// Network failure before a status was received.
    #[error("Network error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Upstream payload is missing expected fields.
    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    /// No target identity was provided or stored.
    #[error("No target identity set. Run `inbox-export target <username>` first")]
    MissingTarget,

    /// A pagination run for the same target is already in flight.
    #[error("A run for {target} is already in progress")]
    RunInProgress { target: String },

    /// Failed to open or query the key-value store.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid or corrupted data.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a storage error from rusqlite error.
    pub fn storage(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a transport error from a reqwest error.
    pub fn transport(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message() {
        let err = AppError::Http {
            status: 403,
            url: "https://www.fiverr.com/inbox/contacts".into(),
        };
        assert_eq!(
            err.to_string(),
            "Request to https://www.fiverr.com/inbox/contacts failed with status 403"
        );
    }

    #[test]
    fn test_malformed_helper() {
        let err = AppError::malformed("missing `messages`");
        assert!(matches!(err, AppError::MalformedPayload { .. }));
        assert!(err.to_string().contains("missing `messages`"));
    }
}
