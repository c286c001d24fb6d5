//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeout within a day, body limit > 0, port present)
//! - Check CORS methods and path patterns are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::AppConfig;

/// Longest accepted request timeout, in seconds.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// One semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("http.port can't be empty")]
    EmptyPort,

    #[error("http.port '{0}' is not a valid port number")]
    InvalidPort(String),

    #[error("http.request_timeout_secs must be greater than 0")]
    ZeroTimeout,

    #[error("http.request_timeout_secs {0} exceeds the maximum of {max}", max = MAX_REQUEST_TIMEOUT_SECS)]
    TimeoutTooLarge(u64),

    #[error("http.body_limit_kb must be greater than 0")]
    ZeroBodyLimit,

    #[error("cors.allowed_methods contains invalid method '{0}'")]
    InvalidCorsMethod(String),

    #[error("cors.paths pattern '{0}' may only use '*' as its last character")]
    InvalidCorsPath(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let port = config.http.port.trim();
    if port.is_empty() {
        errors.push(ValidationError::EmptyPort);
    } else if port.parse::<u16>().is_err() {
        errors.push(ValidationError::InvalidPort(config.http.port.clone()));
    }

    match config.http.request_timeout_secs {
        0 => errors.push(ValidationError::ZeroTimeout),
        secs if secs > MAX_REQUEST_TIMEOUT_SECS => errors.push(ValidationError::TimeoutTooLarge(secs)),
        _ => {}
    }

    if config.http.body_limit_kb == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    for method in &config.cors.allowed_methods {
        if method != "*" && Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
            errors.push(ValidationError::InvalidCorsMethod(method.clone()));
        }
    }

    for path in &config.cors.paths {
        let body = path.strip_suffix('*').unwrap_or(path);
        if body.contains('*') {
            errors.push(ValidationError::InvalidCorsPath(path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
