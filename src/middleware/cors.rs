//! Cross-origin resource sharing middleware.
//!
//! # Responsibilities
//! - Answer preflight requests (`OPTIONS` + `Access-Control-Request-Method`)
//!   with `204` and the negotiated headers
//! - Stamp `Access-Control-Allow-Origin` and friends on actual requests
//!
//! # Design Decisions
//! - Negotiation is delegated to `tower_http::cors::CorsLayer`, run over an
//!   empty inner service; this module only maps config onto the layer and
//!   moves the resulting headers into the route chain
//! - A disallowed origin gets no `Access-Control-Allow-Origin`; the
//!   preflight still answers `204` and the browser enforces the refusal
//! - Actual-request headers are queued before the chain runs, so responses
//!   produced further down (including a timeout) still carry them
//! - `"*"` for methods or headers mirrors the request, and with credentials
//!   enabled `"*"` origins are echoed, so the layer never sees a wildcard
//!   it would reject alongside credentials

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use tower::{service_fn, Layer, ServiceExt};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders};

use crate::config::CorsConfig;
use crate::http::Context;
use crate::routing::{BoxFuture, Middleware, Next};

#[derive(Debug, Clone)]
enum OriginPattern {
    Exact(String),
    Wildcard { prefix: String, suffix: String },
}

impl OriginPattern {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.split_once('*') {
            Some((prefix, suffix)) => OriginPattern::Wildcard {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            None => OriginPattern::Exact(raw),
        }
    }

    fn matches(&self, origin: &str) -> bool {
        match self {
            OriginPattern::Exact(expected) => expected == origin,
            OriginPattern::Wildcard { prefix, suffix } => {
                origin.len() >= prefix.len() + suffix.len() && origin.starts_with(prefix.as_str()) && origin.ends_with(suffix.as_str())
            }
        }
    }
}

fn allow_origin(config: &CorsConfig) -> AllowOrigin {
    if config.allowed_origins.iter().any(|o| o.trim() == "*") {
        return if config.supports_credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        };
    }

    let patterns: Vec<OriginPattern> = config.allowed_origins.iter().map(|o| OriginPattern::parse(o)).collect();
    AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        let origin = origin.to_ascii_lowercase();
        let allowed = patterns.iter().any(|p| p.matches(&origin));
        if !allowed {
            tracing::debug!(origin = %origin, "Cross-origin request from unlisted origin");
        }
        allowed
    })
}

fn allow_methods(config: &CorsConfig) -> AllowMethods {
    if config.allowed_methods.iter().any(|m| m.trim() == "*") {
        return AllowMethods::mirror_request();
    }
    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
        .collect();
    AllowMethods::list(methods)
}

fn header_names(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .map(|h| h.trim())
        .filter(|h| *h != "*")
        .filter_map(|h| HeaderName::try_from(h).ok())
        .collect()
}

fn allow_headers(config: &CorsConfig) -> AllowHeaders {
    if config.allowed_headers.iter().any(|h| h.trim() == "*") {
        return AllowHeaders::mirror_request();
    }
    AllowHeaders::list(header_names(&config.allowed_headers))
}

fn expose_headers(config: &CorsConfig) -> ExposeHeaders {
    if !config.supports_credentials && config.exposed_headers.iter().any(|h| h.trim() == "*") {
        return ExposeHeaders::any();
    }
    ExposeHeaders::list(header_names(&config.exposed_headers))
}

/// Compiled cross-origin policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    layer: CorsLayer,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut layer = CorsLayer::new()
            .allow_origin(allow_origin(config))
            .allow_methods(allow_methods(config))
            .allow_headers(allow_headers(config))
            .expose_headers(expose_headers(config))
            .allow_credentials(config.supports_credentials)
            .allow_private_network(true);
        if config.max_age > 0 {
            layer = layer.max_age(Duration::from_secs(config.max_age));
        }
        Self { layer }
    }

    /// Headers the policy grants to a request with this method, URI and headers.
    pub async fn negotiate(&self, parts: &Parts) -> HeaderMap {
        let mut request = Request::new(Body::empty());
        *request.method_mut() = parts.method.clone();
        *request.uri_mut() = parts.uri.clone();
        *request.headers_mut() = parts.headers.clone();

        let service = self
            .layer
            .layer(service_fn(|_request: Request<Body>| async { Ok::<_, Infallible>(Response::new(Body::empty())) }));
        let response = service.oneshot(request).await.unwrap_or_else(|never| match never {});
        response.into_parts().0.headers
    }
}

fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
    *method == Method::OPTIONS && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

impl Middleware for CorsPolicy {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, Response> {
        let policy = self.clone();

        Box::pin(async move {
            let parts = &ctx.source().parts;
            let headers = policy.negotiate(parts).await;

            if is_preflight(&parts.method, &parts.headers) {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::NO_CONTENT;
                *response.headers_mut() = headers;
                return response;
            }

            let view = ctx.response();
            for (name, value) in headers.iter() {
                view.insert_header(name.clone(), value.clone());
            }
            next.run(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(configure: impl FnOnce(&mut CorsConfig)) -> CorsPolicy {
        let mut config = CorsConfig::default();
        configure(&mut config);
        CorsPolicy::from_config(&config)
    }

    fn parts(method: Method, pairs: &[(&'static str, &'static str)]) -> Parts {
        let mut builder = Request::builder().method(method).uri("/api/users");
        for (k, v) in pairs {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_preflight_with_defaults() {
        let out = policy(|_| {})
            .negotiate(&parts(
                Method::OPTIONS,
                &[
                    ("origin", "http://app.test"),
                    ("access-control-request-method", "POST"),
                    ("access-control-request-headers", "Content-Type, X-Token"),
                ],
            ))
            .await;

        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type, X-Token");
        assert!(out.contains_key(header::VARY));
        assert!(!out.contains_key(header::ACCESS_CONTROL_MAX_AGE));
        assert!(!out.contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_unlisted_origin_gets_no_allow_origin() {
        let restricted = policy(|c| {
            c.allowed_origins = vec!["https://*.example.com".into()];
            c.allowed_methods = vec!["GET".into()];
            c.allowed_headers = vec!["Content-Type".into()];
        });

        let refused = restricted
            .negotiate(&parts(
                Method::OPTIONS,
                &[("origin", "https://evil.test"), ("access-control-request-method", "GET")],
            ))
            .await;
        assert!(!refused.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let granted = restricted
            .negotiate(&parts(
                Method::OPTIONS,
                &[
                    ("origin", "https://App.Example.com"),
                    ("access-control-request-method", "DELETE"),
                    ("access-control-request-headers", "x-secret"),
                ],
            ))
            .await;
        assert_eq!(granted[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://App.Example.com");
        // Only the configured lists are advertised; the browser refuses the rest.
        assert_eq!(granted[header::ACCESS_CONTROL_ALLOW_METHODS], "GET");
        assert_eq!(granted[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
    }

    #[tokio::test]
    async fn test_actual_request_with_credentials() {
        let cors = policy(|c| {
            c.exposed_headers = vec!["X-Total".into(), "X-Page".into()];
            c.supports_credentials = true;
            c.max_age = 600;
        });

        let out = cors.negotiate(&parts(Method::GET, &[("origin", "http://app.test")])).await;
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://app.test");
        assert_eq!(out[header::ACCESS_CONTROL_EXPOSE_HEADERS], "x-total,x-page");
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(!out.contains_key(header::ACCESS_CONTROL_MAX_AGE));
        assert!(!out.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn test_wildcards_with_credentials_are_accepted() {
        let cors = policy(|c| {
            c.supports_credentials = true;
            c.exposed_headers = vec!["*".into()];
        });

        let out = cors
            .negotiate(&parts(
                Method::OPTIONS,
                &[
                    ("origin", "http://app.test"),
                    ("access-control-request-method", "PUT"),
                    ("access-control-request-headers", "x-token"),
                ],
            ))
            .await;
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://app.test");
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_METHODS], "PUT");
        assert_eq!(out[header::ACCESS_CONTROL_ALLOW_HEADERS], "x-token");
    }

    #[tokio::test]
    async fn test_max_age_and_private_network_on_preflight() {
        let out = policy(|c| c.max_age = 600)
            .negotiate(&parts(
                Method::OPTIONS,
                &[
                    ("origin", "http://app.test"),
                    ("access-control-request-method", "GET"),
                    ("access-control-request-private-network", "true"),
                ],
            ))
            .await;

        assert_eq!(out[header::ACCESS_CONTROL_MAX_AGE], "600");
        assert_eq!(out["access-control-allow-private-network"], "true");
    }
}
