//! Panic recovery.
//!
//! The recovery callback is a plain value owned by the router and handed to
//! every boundary that catches panics: the outermost dispatch boundary and
//! each timeout guard.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use serde_json::json;

use crate::http::Context;

/// Payload carried by a caught panic.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Turns a caught panic into the response sent to the client.
pub type Recovery = Arc<dyn Fn(&Context, PanicPayload) -> Response + Send + Sync>;

/// Logs the panic and answers a generic 500.
pub fn default_recovery() -> Recovery {
    Arc::new(|ctx: &Context, payload: PanicPayload| {
        let parts = &ctx.source().parts;
        tracing::error!(
            method = %parts.method,
            path = %parts.uri.path(),
            panic = %panic_message(payload.as_ref()),
            "Handler panicked"
        );
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({"error": "Internal Server Error"}))).into_response()
    })
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Drive `fut`, routing a panic through `recovery`.
pub(crate) async fn catch_panic<F>(ctx: &Context, recovery: &Recovery, fut: F) -> Result<Response, Response>
where
    F: Future<Output = Response>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(payload) => Err(recovery(ctx, payload)),
    }
}
