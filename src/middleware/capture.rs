//! Records the handler's response on the context.
//!
//! Runs last in every compiled chain, directly around the handler, so the
//! captured origin is exactly what the handler produced before outer
//! middleware decorate it. Streamed bodies are recorded with an empty
//! body and passed through undrained.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;

use crate::http::{Context, ResponseOrigin, StreamedBody};
use crate::routing::{BoxFuture, Middleware, Next};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseCapture;

impl Middleware for ResponseCapture {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let response = next.run(ctx.clone()).await;
            if response.extensions().get::<StreamedBody>().is_some() {
                ctx.response().set_origin(ResponseOrigin {
                    status: response.status(),
                    headers: response.headers().clone(),
                    body: Default::default(),
                });
                return response;
            }
            let (parts, body) = response.into_parts();

            let body = match axum::body::to_bytes(body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to buffer handler response");
                    let mut response = Response::new(Body::empty());
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    return response;
                }
            };

            ctx.response().set_origin(ResponseOrigin {
                status: parts.status,
                headers: parts.headers.clone(),
                body: body.clone(),
            });

            Response::from_parts(parts, Body::from(body))
        })
    }
}
