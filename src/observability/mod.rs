//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (parse failures, panics, timeouts, pool decisions)
//!     → logging.rs (EnvFilter + fmt layer)
//!
//! Per request (debug mode):
//!     → tower_http TraceLayer spans, keyed by x-request-id
//! ```
//!
//! # Design Decisions
//! - Structured key/value fields, no interpolated messages
//! - Request ID stamped by tower_http before any handler runs

pub mod logging;

pub use logging::init_logging;
