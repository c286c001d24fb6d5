//! Request/response adaptation and middleware core for axum services.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ tower layers (request id, body limit, trace)
//!                         │
//!                         ▼
//!                     routing (axum match → Dispatch)
//!                         │  acquire pooled Context
//!                         ▼
//!                     middleware chain
//!                       timeout guard → globals → cors → group → capture
//!                         │
//!                         ▼
//!                     handler ── http::RequestView (body, query, route)
//!                         │
//!                         ▼
//!     Client Response ◀── finalize (pending headers, cookies) → release
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod routing;

// Chain building blocks
pub mod middleware;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use http::Context;
pub use routing::Router;
