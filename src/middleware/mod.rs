//! Built-in middleware.
//!
//! # Data Flow
//! ```text
//! Dispatch (catch_unwind → recovery)
//!     → timeout.rs (deadline, worker task, 504)
//!     → user global middleware
//!     → cors.rs (only on matching paths)
//!     → group middleware (origin, then local)
//!     → capture.rs (record handler response)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Every built-in is an ordinary `Middleware`; nothing bypasses the chain
//! - Recovery is a shared callback so the dispatch boundary and every
//!   timeout guard answer panics the same way

pub mod capture;
pub mod cors;
pub mod recover;
pub mod timeout;

pub use capture::ResponseCapture;
pub use cors::CorsPolicy;
pub use recover::{default_recovery, panic_message, PanicPayload, Recovery};
pub use timeout::{GuardState, TimeoutGuard};
