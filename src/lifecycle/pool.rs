//! Per-request context recycling.
//!
//! # Responsibilities
//! - Hand out a context for each dispatched request
//! - Reset and keep released contexts for reuse
//!
//! # Design Decisions
//! - Unbounded free list behind a mutex; an empty list allocates instead
//!   of waiting
//! - A context is only recycled when the pool holds the last handle. A
//!   detached timeout worker still owning a clone keeps it out of the pool
//! - Reset happens on release, so nothing from the previous borrower is
//!   reachable while the object sits idle

use std::sync::{Arc, Mutex, MutexGuard};

use crate::http::context::{ContextInner, RequestSource};
use crate::http::{Context, Validation};

#[derive(Default)]
pub struct ContextPool {
    free: Mutex<Vec<ContextInner>>,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context bound to `source`; request and response views stay unbuilt
    /// until first accessed.
    pub(crate) fn acquire(&self, source: RequestSource, validation: Option<Arc<dyn Validation>>) -> Context {
        let mut inner = self.lock().pop().unwrap_or_default();
        inner.source = source;
        inner.validation = validation;
        Context::from_inner(inner)
    }

    /// Return a context to the pool once the request is finished.
    pub fn release(&self, ctx: Context) {
        match Arc::into_inner(ctx.inner) {
            Some(mut inner) => {
                inner.reset();
                let mut free = self.lock();
                free.push(inner);
                tracing::debug!(idle = free.len(), "Context recycled");
            }
            None => {
                tracing::debug!("Context still referenced, not recycled");
            }
        }
    }

    /// Number of reset contexts waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ContextInner>> {
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool").field("idle", &self.idle_count()).finish()
    }
}
