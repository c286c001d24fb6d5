//! Per-request context handle.
//!
//! # Responsibilities
//! - Own the buffered request (parts, body bytes, route params, peer address)
//! - Lazily build the memoized request view on first access
//! - Hold pending response headers and the committed flag
//! - Provide request-scoped key/value storage
//! - Carry the deadline/cancellation scope rebound by the timeout guard
//!
//! # Design Decisions
//! - `Context` is an `Arc` handle so a guarded worker can own a clone
//! - Once the response is committed, further header writes are rejected
//! - Every per-request field lives in `ContextInner` so the pool can reset
//!   them in one place

use std::any::Any;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request};
use dashmap::DashMap;
use futures_util::future::select_all;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::http::request::{RequestData, RequestView};
use crate::http::response::{ResponseOrigin, ResponseView};
use crate::http::validation::Validation;

/// The buffered inbound request a context was acquired for.
pub(crate) struct RequestSource {
    pub(crate) parts: Parts,
    pub(crate) body: Bytes,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl RequestSource {
    pub(crate) fn new(parts: Parts, body: Bytes, params: Vec<(String, String)>) -> Self {
        let remote_addr = parts
            .extensions
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Self {
            parts,
            body,
            params,
            remote_addr,
        }
    }
}

impl Default for RequestSource {
    fn default() -> Self {
        let (parts, ()) = Request::new(()).into_parts();
        Self {
            parts,
            body: Bytes::new(),
            params: Vec::new(),
            remote_addr: None,
        }
    }
}

/// Response-side state shared by every view of one request.
#[derive(Default)]
pub(crate) struct ResponseState {
    pub(crate) headers: HeaderMap,
    pub(crate) committed: bool,
    pub(crate) origin: Option<ResponseOrigin>,
}

/// Why a request scope is no longer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    DeadlineExceeded,
    Canceled,
}

impl std::fmt::Display for ScopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeError::DeadlineExceeded => write!(f, "context deadline exceeded"),
            ScopeError::Canceled => write!(f, "context canceled"),
        }
    }
}

impl std::error::Error for ScopeError {}

/// Deadline and cancellation signals visible to the chain.
#[derive(Clone, Default)]
pub(crate) struct Scope {
    deadline: Option<Instant>,
    cancels: Vec<watch::Receiver<bool>>,
}

/// Cancels a derived scope when dropped.
pub struct ScopeGuard {
    tx: watch::Sender<bool>,
}

impl ScopeGuard {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub(crate) struct ContextInner {
    pub(crate) source: RequestSource,
    pub(crate) request: OnceLock<RequestData>,
    pub(crate) response: Mutex<ResponseState>,
    pub(crate) values: DashMap<String, Arc<dyn Any + Send + Sync>>,
    pub(crate) scope: Mutex<Scope>,
    pub(crate) validation: Option<Arc<dyn Validation>>,
}

impl Default for ContextInner {
    fn default() -> Self {
        Self {
            source: RequestSource::default(),
            request: OnceLock::new(),
            response: Mutex::new(ResponseState::default()),
            values: DashMap::new(),
            scope: Mutex::new(Scope::default()),
            validation: None,
        }
    }
}

impl ContextInner {
    /// Clears every per-request field before the object is reused.
    ///
    /// The exhaustive destructuring makes adding a field without a reset
    /// step a compile error.
    pub(crate) fn reset(&mut self) {
        let ContextInner {
            source,
            request,
            response,
            values,
            scope,
            validation,
        } = self;

        *source = RequestSource::default();
        request.take();
        *response.get_mut().unwrap_or_else(|e| e.into_inner()) = ResponseState::default();
        values.clear();
        *scope.get_mut().unwrap_or_else(|e| e.into_inner()) = Scope::default();
        *validation = None;
    }
}

/// Handle to the state of one in-flight request.
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn from_inner(inner: ContextInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// A detached context with an empty request, for tests and tooling.
    pub fn background() -> Self {
        Self::from_inner(ContextInner::default())
    }

    /// A detached context wrapping an already-buffered request.
    pub fn from_request(request: Request<Bytes>, params: Vec<(String, String)>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_inner(ContextInner {
            source: RequestSource::new(parts, body, params),
            ..ContextInner::default()
        })
    }

    /// Request accessors; the view is built from the body on first call.
    pub fn request(&self) -> RequestView<'_> {
        let data = self
            .inner
            .request
            .get_or_init(|| RequestData::build(&self.inner.source));
        RequestView::new(self, data)
    }

    /// Response builders and pending header state.
    pub fn response(&self) -> ResponseView<'_> {
        ResponseView::new(self)
    }

    /// Store a request-scoped value.
    pub fn with_value<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.inner.values.insert(key.into(), Arc::new(value));
    }

    /// Read a request-scoped value stored with [`Context::with_value`].
    pub fn value<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Clone,
    {
        self.inner
            .values
            .get(key)
            .and_then(|entry| entry.value().downcast_ref::<T>().cloned())
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.inner.values.contains_key(key)
    }

    /// Derive a scope that expires after `timeout` and rebind this context to it.
    ///
    /// The derived deadline never outlives an existing one. A timeout too
    /// large to represent as an instant adds no deadline. Dropping the
    /// returned guard cancels the derived scope.
    pub fn with_timeout(&self, timeout: Duration) -> ScopeGuard {
        let (tx, rx) = watch::channel(false);
        let mut scope = self.lock_scope();
        scope.deadline = match (scope.deadline, Instant::now().checked_add(timeout)) {
            (Some(existing), Some(deadline)) => Some(existing.min(deadline)),
            (existing, None) => existing,
            (None, deadline) => deadline,
        };
        scope.cancels.push(rx);
        ScopeGuard { tx }
    }

    /// The deadline of the current scope, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.lock_scope().deadline
    }

    /// Why the current scope ended, or `None` while it is live.
    pub fn err(&self) -> Option<ScopeError> {
        let scope = self.lock_scope();
        if scope.cancels.iter().any(|rx| *rx.borrow()) {
            if scope.deadline.is_some_and(|d| Instant::now() >= d) {
                return Some(ScopeError::DeadlineExceeded);
            }
            return Some(ScopeError::Canceled);
        }
        match scope.deadline {
            Some(d) if Instant::now() >= d => Some(ScopeError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the current scope's deadline passes or it is cancelled.
    /// Never resolves for a scope with neither.
    pub async fn done(&self) {
        let scope = self.lock_scope().clone();

        let deadline = async move {
            match scope.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let cancelled = async move {
            if scope.cancels.is_empty() {
                return std::future::pending::<()>().await;
            }
            let waits = scope.cancels.into_iter().map(|mut rx| {
                Box::pin(async move {
                    let _ = rx.wait_for(|cancelled| *cancelled).await;
                })
            });
            select_all(waits).await;
        };

        tokio::select! {
            _ = deadline => {}
            _ = cancelled => {}
        }
    }

    /// Freeze the response: later header writes are rejected.
    pub fn commit(&self) {
        self.lock_response().committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.lock_response().committed
    }

    /// Whether two handles refer to the same request.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn source(&self) -> &RequestSource {
        &self.inner.source
    }

    pub(crate) fn validation(&self) -> Option<&Arc<dyn Validation>> {
        self.inner.validation.as_ref()
    }

    pub(crate) fn lock_response(&self) -> MutexGuard<'_, ResponseState> {
        self.inner.response.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_scope(&self) -> MutexGuard<'_, Scope> {
        self.inner.scope.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.inner.source.parts.method)
            .field("uri", &self.inner.source.parts.uri)
            .field("committed", &self.is_committed())
            .finish()
    }
}
