//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Per request (pool.rs):
//!     Acquire context → run chain → finalize response → Release (reset)
//!
//! Shutdown (shutdown.rs):
//!     Trigger → serving loops stop accepting → in-flight requests drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Context reset happens on release, never lazily on acquire
//! - One level-triggered shutdown flag shared by every listener

pub mod pool;
pub mod shutdown;
pub mod signals;

pub use pool::ContextPool;
pub use shutdown::Shutdown;
