//! Deadline enforcement for the downstream chain.
//!
//! # Responsibilities
//! - Bound the rest of the chain by a per-request deadline
//! - Catch panics raised downstream and hand them to the recovery callback
//! - Answer `504` once the deadline passes and freeze the response
//!
//! # Design Decisions
//! - The downstream chain runs on its own task; on timeout it is detached,
//!   not aborted, and its later writes are rejected by the committed flag
//! - Only an expired deadline produces `504`; plain cancellation keeps
//!   waiting for the worker
//! - When the worker finishes at the same instant the deadline fires, the
//!   worker's response wins

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use futures_util::FutureExt;

use crate::http::{Context, ScopeError};
use crate::middleware::recover::{default_recovery, Recovery};
use crate::routing::{BoxFuture, Middleware, Next};

/// Where a guarded request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Running,
    Completed,
    Panicked,
    TimedOut,
}

impl GuardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardState::Running => "running",
            GuardState::Completed => "completed",
            GuardState::Panicked => "panicked",
            GuardState::TimedOut => "timed_out",
        }
    }
}

/// Runs the remaining chain on a worker task under a deadline.
#[derive(Clone)]
pub struct TimeoutGuard {
    timeout: Duration,
    recovery: Recovery,
}

impl TimeoutGuard {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            recovery: default_recovery(),
        }
    }

    pub fn with_recovery(timeout: Duration, recovery: Recovery) -> Self {
        Self { timeout, recovery }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for TimeoutGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutGuard").field("timeout", &self.timeout).finish()
    }
}

fn gateway_timeout() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::GATEWAY_TIMEOUT;
    response
}

impl Middleware for TimeoutGuard {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, Response> {
        let timeout = self.timeout;
        let recovery = self.recovery.clone();

        Box::pin(async move {
            let _scope = ctx.with_timeout(timeout);
            tracing::debug!(state = GuardState::Running.as_str(), ?timeout, "Guard started");

            let worker_ctx = ctx.clone();
            let mut worker = tokio::spawn(async move {
                match AssertUnwindSafe(next.run(worker_ctx.clone())).catch_unwind().await {
                    Ok(response) => (GuardState::Completed, response),
                    Err(payload) => (GuardState::Panicked, recovery(&worker_ctx, payload)),
                }
            });

            let joined = tokio::select! {
                biased;
                joined = &mut worker => joined,
                _ = ctx.done() => match ctx.err() {
                    Some(ScopeError::DeadlineExceeded) => {
                        ctx.commit();
                        let parts = &ctx.source().parts;
                        tracing::warn!(
                            method = %parts.method,
                            path = %parts.uri.path(),
                            ?timeout,
                            state = GuardState::TimedOut.as_str(),
                            "Request timed out"
                        );
                        return gateway_timeout();
                    }
                    _ => worker.await,
                },
            };

            match joined {
                Ok((state, response)) => {
                    tracing::debug!(state = state.as_str(), status = response.status().as_u16(), "Guard finished");
                    response
                }
                Err(e) => {
                    // Only reachable if the recovery callback itself panicked.
                    tracing::error!(error = %e, "Guarded worker failed");
                    let mut response = Response::new(Body::empty());
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    response
                }
            }
        })
    }
}
