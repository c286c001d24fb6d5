//! Route compilation and dispatch.
//!
//! # Responsibilities
//! - Own the root group and every router-wide setting (globals, recovery,
//!   fallback, validation engine)
//! - Compile registrations into one immutable `axum::Router`
//! - Dispatch each request: buffer body, acquire context, run chain,
//!   finalize response, release context
//! - Serve over TCP with graceful shutdown
//!
//! # Design Decisions
//! - Registration happens on `Router` through `Deref<Target = Group>`; the
//!   compiled service is a snapshot, later registrations need a recompile
//! - Globals are prepended at compile time, so `global_middleware` and
//!   `recover` may be called in any order before serving
//! - The dispatch boundary always catches panics, whether or not a
//!   timeout guard is installed

use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Body;
use axum::extract::RawPathParams;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::Result;
use crate::http::context::RequestSource;
use crate::http::response::finalize;
use crate::http::{Context, Validation};
use crate::lifecycle::{ContextPool, Shutdown};
use crate::middleware::recover::catch_panic;
use crate::middleware::{default_recovery, CorsPolicy, PanicPayload, Recovery, ResponseCapture, TimeoutGuard};
use crate::routing::group::{CorsInjection, Group, Registry, Verb};
use crate::routing::handler::{Endpoint, Handler, Middleware};
use crate::routing::matcher::AnyMatcher;
use crate::routing::table::RouteInfo;

/// Application router: registration surface plus the serving entry points.
pub struct Router {
    root: Group,
    registry: Arc<Mutex<Registry>>,
    config: AppConfig,
    globals: Vec<Arc<dyn Middleware>>,
    timeout_guard: bool,
    recovery: Recovery,
    fallback: Option<Arc<dyn Handler>>,
    validation: Option<Arc<dyn Validation>>,
    pool: Arc<ContextPool>,
}

impl Router {
    pub fn new(config: AppConfig) -> Self {
        let cors = if config.cors.paths.is_empty() {
            None
        } else {
            let middleware: Arc<dyn Middleware> = Arc::new(CorsPolicy::from_config(&config.cors));
            Some(CorsInjection {
                paths: AnyMatcher::from_patterns(&config.cors.paths),
                middleware,
            })
        };

        let registry = Arc::new(Mutex::new(Registry {
            cors,
            ..Registry::default()
        }));
        let trailing: Vec<Arc<dyn Middleware>> = vec![Arc::new(ResponseCapture)];

        Self {
            root: Group::root(registry.clone(), trailing),
            registry,
            config,
            globals: Vec::new(),
            timeout_guard: false,
            recovery: default_recovery(),
            fallback: None,
            validation: None,
            pool: Arc::new(ContextPool::new()),
        }
    }

    /// Install the request timeout guard followed by `middlewares` ahead of
    /// every route.
    pub fn global_middleware(&mut self, middlewares: Vec<Arc<dyn Middleware>>) -> &mut Self {
        self.globals = middlewares;
        self.timeout_guard = true;
        self
    }

    /// Replace the panic recovery callback.
    pub fn recover<F>(&mut self, recovery: F) -> &mut Self
    where
        F: Fn(&Context, PanicPayload) -> Response + Send + Sync + 'static,
    {
        self.recovery = Arc::new(recovery);
        self
    }

    /// Handler for requests no route matches.
    pub fn fallback<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Validation engine used by `validate` and `validate_request`.
    pub fn validation(&mut self, validation: Arc<dyn Validation>) -> &mut Self {
        self.validation = Some(validation);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registered routes, ordered by path then canonical method order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.lock().table.list()
    }

    /// The route registered under `name`.
    pub fn info(&self, name: &str) -> Option<RouteInfo> {
        self.lock().table.find(name)
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Compile every registration into a servable `axum::Router`.
    pub fn into_service(&self) -> axum::Router {
        let globals = self.global_chain();
        let registry = self.lock();
        let mut app = axum::Router::new();

        for (path, verbs) in &registry.endpoints {
            let mut method_router = MethodRouter::new();
            for (verb, endpoint) in verbs {
                let handler = self.route_handler(endpoint.wrapped(&globals));
                method_router = match verb.filter() {
                    Some(filter) => method_router.on(filter, handler),
                    None => method_router.fallback(handler),
                };
            }

            if let Some(cors) = registry.cors.as_ref() {
                let explicit = verbs.contains_key(&Verb::Options) || verbs.contains_key(&Verb::Any);
                if registry.cors_paths.contains(path) && !explicit {
                    let preflight = Endpoint::new(
                        vec![cors.middleware.clone()],
                        Arc::new(|_ctx: Context| async { StatusCode::NO_CONTENT }),
                    );
                    let handler = self.route_handler(preflight.wrapped(&globals));
                    method_router = method_router.on(axum::routing::MethodFilter::OPTIONS, handler);
                }
            }

            app = app.route(path, method_router);
        }
        drop(registry);

        if let Some(fallback) = &self.fallback {
            let trailing: Vec<Arc<dyn Middleware>> = vec![Arc::new(ResponseCapture)];
            let dispatch = self.dispatch(Endpoint::new(trailing, fallback.clone()).wrapped(&globals));
            app = app.fallback(move |request: Request<Body>| {
                let dispatch = dispatch.clone();
                async move { dispatch.serve(Vec::new(), request).await }
            });
        }

        let app = app
            .layer(RequestBodyLimitLayer::new(self.config.http.body_limit()))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        if self.config.app.debug {
            app.layer(TraceLayer::new_for_http())
        } else {
            app
        }
    }

    /// Drive one request through the compiled service.
    pub async fn test(&self, request: Request<Body>) -> Response {
        match self.into_service().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// Serve on `listener` until `shutdown` is triggered.
    pub async fn listen(&self, listener: TcpListener, shutdown: &Shutdown) -> Result<()> {
        let addr = listener.local_addr()?;
        if self.config.app.debug {
            for route in self.routes() {
                tracing::info!(method = %route.method, path = %route.path, name = %route.name, handler = %route.handler, "Route");
            }
        }

        let app = self.into_service().into_make_service_with_connect_info::<SocketAddr>();
        tracing::info!(address = %addr, app = %self.config.app.name, "HTTP server starting");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Bind `http.host:http.port` and serve until SIGINT or SIGTERM.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.http.address()).await?;
        let shutdown = Shutdown::new();
        crate::lifecycle::signals::spawn_signal_listener(shutdown.clone());
        self.listen(listener, &shutdown).await
    }

    fn global_chain(&self) -> Vec<Arc<dyn Middleware>> {
        let mut chain: Vec<Arc<dyn Middleware>> = Vec::with_capacity(self.globals.len() + 1);
        if self.timeout_guard {
            chain.push(Arc::new(TimeoutGuard::with_recovery(
                self.config.http.request_timeout(),
                self.recovery.clone(),
            )));
        }
        chain.extend(self.globals.iter().cloned());
        chain
    }

    fn dispatch(&self, endpoint: Endpoint) -> Dispatch {
        Dispatch {
            endpoint,
            pool: self.pool.clone(),
            validation: self.validation.clone(),
            recovery: self.recovery.clone(),
            body_limit: self.config.http.body_limit(),
            header_limit: self.config.http.header_limit(),
        }
    }

    fn route_handler(
        &self,
        endpoint: Endpoint,
    ) -> impl Fn(RawPathParams, Request<Body>) -> crate::routing::BoxFuture<'static, Response> + Clone + Send + Sync + 'static
    {
        let dispatch = self.dispatch(endpoint);
        move |params: RawPathParams, request: Request<Body>| {
            let dispatch = dispatch.clone();
            let params: Vec<(String, String)> = params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            Box::pin(async move { dispatch.serve(params, request).await })
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Deref for Router {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.root
    }
}

impl DerefMut for Router {
    fn deref_mut(&mut self) -> &mut Group {
        &mut self.root
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.lock().table.len())
            .field("globals", &self.globals.len())
            .field("timeout_guard", &self.timeout_guard)
            .finish()
    }
}

/// Per-endpoint request entry point.
#[derive(Clone)]
struct Dispatch {
    endpoint: Endpoint,
    pool: Arc<ContextPool>,
    validation: Option<Arc<dyn Validation>>,
    recovery: Recovery,
    body_limit: usize,
    header_limit: usize,
}

impl Dispatch {
    async fn serve(self, params: Vec<(String, String)>, request: Request<Body>) -> Response {
        let header_bytes: usize = request
            .headers()
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        if header_bytes > self.header_limit {
            tracing::warn!(size = header_bytes, limit = self.header_limit, "Request headers too large");
            return StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE.into_response();
        }

        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, limit = self.body_limit, "Failed to read request body");
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
        };

        let ctx = self
            .pool
            .acquire(RequestSource::new(parts, body, params), self.validation.clone());

        let chain_ctx = ctx.clone();
        let endpoint = self.endpoint.clone();
        let response = match catch_panic(&ctx, &self.recovery, async move { endpoint.run(chain_ctx).await }).await {
            Ok(response) | Err(response) => response,
        };

        let response = finalize(&ctx, response);
        self.pool.release(ctx);
        response
    }
}
