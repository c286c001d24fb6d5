//! Response builders.
//!
//! # Responsibilities
//! - Build JSON / text / raw / redirect / empty responses
//! - Serve files inline or as attachments, and writer-fed streams
//! - Queue headers and cookies that are merged into the final response
//! - Expose the captured origin (status, headers, body) of the rendered response
//!
//! # Design Decisions
//! - Builders return `axum` responses; the first response produced for a
//!   request is the one sent, later ones are dropped
//! - Pending header writes after the response is committed are rejected
//!   and logged rather than applied

use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::Result;
use crate::http::context::Context;
use crate::http::stream::{stream_response, StreamWriter};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Snapshot of the response produced by the route handler.
#[derive(Debug, Clone)]
pub struct ResponseOrigin {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResponseOrigin {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub use cookie::SameSite;

/// A `Set-Cookie` directive.
///
/// Name and value are percent-encoded on the wire; `path` and `domain`
/// are emitted as given and must not contain `;` or control characters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Seconds; `Some(0)` or negative deletes the cookie.
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Render the header value, or `None` when an attribute would break
    /// out of its slot.
    fn header_value(&self) -> Option<String> {
        let path = self.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/");
        if !is_attribute_safe(path) || self.domain.as_deref().is_some_and(|d| !is_attribute_safe(d)) {
            return None;
        }

        let mut builder = cookie::Cookie::build((self.name.as_str(), self.value.as_str())).path(path);
        if let Some(domain) = self.domain.as_deref() {
            builder = builder.domain(domain);
        }
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(cookie::time::Duration::seconds(max_age.max(0)));
        }
        if self.http_only {
            builder = builder.http_only(true);
        }
        if self.secure {
            builder = builder.secure(true);
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site);
        }
        Some(builder.build().encoded().to_string())
    }
}

fn is_attribute_safe(value: &str) -> bool {
    !value.chars().any(|c| c == ';' || c.is_control())
}

/// Response facade for one request.
pub struct ResponseView<'a> {
    ctx: &'a Context,
}

impl<'a> ResponseView<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub fn json<T: Serialize>(&self, status: StatusCode, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => build(status, JSON_CONTENT_TYPE, body.into()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    pub fn string(&self, status: StatusCode, text: impl Into<String>) -> Response {
        build(status, TEXT_CONTENT_TYPE, Bytes::from(text.into()))
    }

    pub fn data(&self, status: StatusCode, content_type: &str, data: impl Into<Bytes>) -> Response {
        build(status, content_type, data.into())
    }

    pub fn no_content(&self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }

    pub fn no_content_with(&self, status: StatusCode) -> Response {
        status.into_response()
    }

    pub fn redirect(&self, status: StatusCode, location: &str) -> Response {
        let mut response = status.into_response();
        match HeaderValue::from_str(location) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(e) => tracing::warn!(location = %location, error = %e, "Invalid redirect location"),
        }
        response
    }

    /// Stream a body produced by `produce`; see [`StreamWriter`].
    pub fn stream<F, Fut>(&self, status: StatusCode, produce: F) -> Response
    where
        F: FnOnce(StreamWriter) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        stream_response(status, produce)
    }

    /// Serve the file at `path` inline.
    pub async fn file(&self, path: impl AsRef<Path>) -> Response {
        serve_file(path.as_ref(), None).await
    }

    /// Serve the file at `path` as an attachment named `filename`.
    pub async fn download(&self, path: impl AsRef<Path>, filename: &str) -> Response {
        serve_file(path.as_ref(), Some(filename)).await
    }

    /// Builder for a 200 response.
    pub fn success(&self) -> StatusResponse {
        StatusResponse { status: StatusCode::OK }
    }

    /// Builder for a response with the given status.
    pub fn status(&self, status: StatusCode) -> StatusResponse {
        StatusResponse { status }
    }

    /// Queue a header for the final response. Headers already set by the
    /// rendered response take precedence.
    pub fn header(&self, key: &str, value: &str) -> &Self {
        let (Ok(name), Ok(value)) = (HeaderName::try_from(key), HeaderValue::from_str(value)) else {
            tracing::warn!(header = %key, "Invalid response header ignored");
            return self;
        };
        self.queue(name, value, false);
        self
    }

    pub fn cookie(&self, cookie: Cookie) -> &Self {
        match cookie.header_value().map(HeaderValue::try_from) {
            Some(Ok(value)) => self.queue(header::SET_COOKIE, value, true),
            _ => tracing::warn!(cookie = %cookie.name, "Invalid cookie ignored"),
        }
        self
    }

    /// Expire a cookie on the client.
    pub fn without_cookie(&self, name: &str) -> &Self {
        let mut cookie = Cookie::new(name, "");
        cookie.max_age = Some(-1);
        self.cookie(cookie)
    }

    /// Queue an already-validated header, replacing any pending value.
    pub(crate) fn insert_header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        self.queue(name, value, false);
        self
    }

    /// Pending headers queued so far.
    pub fn pending_headers(&self) -> HeaderMap {
        self.ctx.lock_response().headers.clone()
    }

    /// The captured response, once the handler has rendered one.
    pub fn origin(&self) -> Option<ResponseOrigin> {
        self.ctx.lock_response().origin.clone()
    }

    pub(crate) fn set_origin(&self, origin: ResponseOrigin) -> bool {
        let mut state = self.ctx.lock_response();
        if state.committed {
            tracing::warn!(status = %origin.status, "Late response from a timed out handler discarded");
            return false;
        }
        state.origin = Some(origin);
        true
    }

    fn queue(&self, name: HeaderName, value: HeaderValue, append: bool) {
        let mut state = self.ctx.lock_response();
        if state.committed {
            tracing::warn!(header = %name, "Header write after response commit rejected");
            return;
        }
        if append {
            state.headers.append(name, value);
        } else {
            state.headers.insert(name, value);
        }
    }
}

/// Builder with a fixed status code.
#[derive(Debug, Clone, Copy)]
pub struct StatusResponse {
    status: StatusCode,
}

impl StatusResponse {
    pub fn json<T: Serialize>(&self, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => build(self.status, JSON_CONTENT_TYPE, body.into()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    pub fn string(&self, text: impl Into<String>) -> Response {
        build(self.status, TEXT_CONTENT_TYPE, Bytes::from(text.into()))
    }

    pub fn data(&self, content_type: &str, data: impl Into<Bytes>) -> Response {
        build(self.status, content_type, data.into())
    }
}

/// Commit the context and merge its pending headers into `response`.
///
/// `Set-Cookie` entries are appended; any other pending header is only
/// applied when the response does not already carry it.
pub(crate) fn finalize(ctx: &Context, mut response: Response) -> Response {
    let pending = {
        let mut state = ctx.lock_response();
        state.committed = true;
        std::mem::take(&mut state.headers)
    };

    let headers = response.headers_mut();
    for (name, value) in pending.iter() {
        if name == header::SET_COOKIE {
            headers.append(name.clone(), value.clone());
        } else if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    response
}

async fn serve_file(path: &Path, attachment: Option<&str>) -> Response {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            let status = match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(path = %path.display(), error = %e, status = status.as_u16(), "File response failed");
            return build(status, TEXT_CONTENT_TYPE, Bytes::from(status.canonical_reason().unwrap_or_default()));
        }
    };

    let mut response = build(StatusCode::OK, content_type_for(path), Bytes::from(data));
    if let Some(filename) = attachment {
        match content_disposition(filename) {
            Some(value) => {
                response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
            }
            None => tracing::warn!(filename = %filename, "Invalid attachment name ignored"),
        }
    }
    response
}

/// `attachment` disposition; names outside printable ASCII use the
/// RFC 5987 `filename*` form.
fn content_disposition(filename: &str) -> Option<HeaderValue> {
    let value = if filename.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        format!(r#"attachment; filename="{}""#, filename.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        let encoded: String = url::form_urlencoded::byte_serialize(filename.as_bytes()).collect();
        format!("attachment; filename*=UTF-8''{}", encoded.replace('+', "%20"))
    };
    HeaderValue::from_str(&value).ok()
}

/// Content type from the file extension.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => TEXT_CONTENT_TYPE,
        "csv" => "text/csv",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

fn build(status: StatusCode, content_type: &str, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    match HeaderValue::from_str(content_type) {
        Ok(value) => {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        Err(e) => tracing::warn!(content_type = %content_type, error = %e, "Invalid content type ignored"),
    }
    response
}
