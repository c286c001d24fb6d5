//! Crate-wide error type.
//!
//! Only handler panics (via the recovery callback) and validation outcomes
//! reach application code as explicit values. Body parse failures are logged
//! and absorbed by the request view; coercion misses never produce an error.

use thiserror::Error;

/// Errors surfaced by the request/response adaptation layer.
#[derive(Debug, Error)]
pub enum Error {
    /// The request body could not be decoded for its declared content type.
    #[error("Body parse error ({content_type}): {reason}")]
    Body { content_type: String, reason: String },

    /// Binding the buffered body or query string into a typed value failed.
    #[error("Bind error: {0}")]
    Bind(String),

    /// No uploaded file exists under the requested field name.
    #[error("No uploaded file for field '{0}'")]
    FileNotFound(String),

    /// `validate` was called with an empty rule set.
    #[error("Validation rules can't be empty")]
    EmptyRules,

    /// A form request refused authorization.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The validation engine failed to build a validator.
    #[error("Validation engine error: {0}")]
    Validation(String),

    /// No validation engine has been attached to the router.
    #[error("Validation engine not configured")]
    ValidationUnavailable,

    /// The client stopped reading a streamed response.
    #[error("Stream closed by client")]
    StreamClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn body(content_type: &str, reason: impl std::fmt::Display) -> Self {
        Error::Body {
            content_type: content_type.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
