//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (setup):
//!     Router → group.rs (prefix + origin/local/trailing middleware)
//!     → matcher.rs (CORS path patterns against the full path)
//!     → handler.rs (compiled Endpoint per verb)
//!     → table.rs (listing row, optional name)
//!
//! Compilation (router.rs):
//!     Endpoints ++ globals → axum::Router → tower layers
//!
//! Dispatch (router.rs):
//!     axum match → buffer body → pooled Context → chain → finalize
//! ```
//!
//! # Design Decisions
//! - Registrations compiled once, immutable while serving
//! - Path matching and parameter capture delegated to axum
//! - Deterministic listing: path, then canonical method order

pub mod group;
pub mod handler;
pub mod matcher;
pub mod router;
pub mod table;

pub use group::{Group, ResourceController};
pub use handler::{BoxFuture, Endpoint, Handler, Middleware, Next};
pub use matcher::{AnyMatcher, ExactPathMatcher, Matcher, PathPrefixMatcher};
pub use router::Router;
pub use table::{Action, RouteInfo, RouteMethod, RouteTable};
