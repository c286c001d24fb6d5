//! Handler and middleware abstractions.
//!
//! # Responsibilities
//! - Erase async handler closures into one callable shape
//! - Run a compiled middleware chain in order, ending at the handler
//!
//! # Design Decisions
//! - Continuation is explicit: a middleware calls `next.run(ctx)`; returning
//!   without it short-circuits the rest of the chain
//! - Chains are built once per route and shared through `Arc<[..]>`

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use crate::http::Context;

/// Boxed `Send` future returned by erased handlers and middleware.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A route endpoint.
///
/// Implemented for every `Fn(Context) -> impl Future<Output = impl IntoResponse>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxFuture<'static, Response>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, ctx: Context) -> BoxFuture<'static, Response> {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// A link in a route's chain.
///
/// Implemented for every `Fn(Context, Next) -> impl Future<Output = Response>`.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, Response>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, Response> {
        Box::pin((self)(ctx, next))
    }
}

/// The remainder of a chain, handed to each middleware.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    handler: Arc<dyn Handler>,
    index: usize,
}

impl Next {
    /// Run the next middleware, or the handler once the chain is exhausted.
    pub fn run(mut self, ctx: Context) -> BoxFuture<'static, Response> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(ctx, self)
            }
            None => self.handler.call(ctx),
        }
    }

    /// Middleware still ahead of this point, handler excluded.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("len", &self.chain.len())
            .finish()
    }
}

/// A fully composed route: ordered middleware plus the terminating handler.
#[derive(Clone)]
pub struct Endpoint {
    chain: Arc<[Arc<dyn Middleware>]>,
    handler: Arc<dyn Handler>,
}

impl Endpoint {
    pub fn new(chain: Vec<Arc<dyn Middleware>>, handler: Arc<dyn Handler>) -> Self {
        Self {
            chain: chain.into(),
            handler,
        }
    }

    pub fn run(&self, ctx: Context) -> BoxFuture<'static, Response> {
        Next {
            chain: self.chain.clone(),
            handler: self.handler.clone(),
            index: 0,
        }
        .run(ctx)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Same endpoint with `outer` running ahead of the existing chain.
    pub(crate) fn wrapped(&self, outer: &[Arc<dyn Middleware>]) -> Self {
        let chain: Vec<_> = outer.iter().cloned().chain(self.chain.iter().cloned()).collect();
        Self::new(chain, self.handler.clone())
    }
}
