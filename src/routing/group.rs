//! Route group builder.
//!
//! # Responsibilities
//! - Accumulate path prefixes across nested groups
//! - Track origin (inherited), local (next registration only) and trailing
//!   (always last) middleware
//! - Compile each registration into an [`Endpoint`] and a listing row
//! - Prepend the cross-origin middleware to routes whose full path matches
//!
//! # Design Decisions
//! - Every registering call takes the local accumulator, so middleware
//!   attached right before a registration never reaches a sibling
//! - `prefix` and `group` snapshot origin ++ local into the child and clear
//!   the parent's local list the same way
//! - CORS matching runs against the fully qualified path at registration

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::response::Response;
use axum::routing::MethodFilter;

use crate::http::Context;
use crate::routing::handler::{Endpoint, Handler, Middleware};
use crate::routing::matcher::{AnyMatcher, Matcher};
use crate::routing::table::{Action, RouteInfo, RouteMethod, RouteTable};

/// HTTP verb an endpoint is mounted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Verb {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    /// Every method without a dedicated endpoint on the same path.
    Any,
}

impl Verb {
    pub(crate) fn filter(self) -> Option<MethodFilter> {
        match self {
            Verb::Get => Some(MethodFilter::GET),
            Verb::Head => Some(MethodFilter::HEAD),
            Verb::Post => Some(MethodFilter::POST),
            Verb::Put => Some(MethodFilter::PUT),
            Verb::Delete => Some(MethodFilter::DELETE),
            Verb::Patch => Some(MethodFilter::PATCH),
            Verb::Options => Some(MethodFilter::OPTIONS),
            Verb::Any => None,
        }
    }
}

/// Cross-origin middleware plus the paths it applies to.
pub(crate) struct CorsInjection {
    pub(crate) paths: AnyMatcher,
    pub(crate) middleware: Arc<dyn Middleware>,
}

/// Shared registration state behind every group of one router.
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) endpoints: BTreeMap<String, BTreeMap<Verb, Endpoint>>,
    pub(crate) table: RouteTable,
    pub(crate) cors: Option<CorsInjection>,
    pub(crate) cors_paths: BTreeSet<String>,
}

impl Registry {
    fn insert(&mut self, verb: Verb, path: &str, endpoint: Endpoint) {
        let replaced = self
            .endpoints
            .entry(path.to_string())
            .or_default()
            .insert(verb, endpoint);
        if replaced.is_some() {
            tracing::debug!(path = %path, verb = ?verb, "Route re-registered, previous endpoint replaced");
        }
    }

    /// The cross-origin middleware when `path` matches a configured pattern.
    fn cors_for(&mut self, path: &str) -> Option<Arc<dyn Middleware>> {
        let cors = self.cors.as_ref()?;
        if !cors.paths.matches(path) {
            return None;
        }
        let middleware = cors.middleware.clone();
        self.cors_paths.insert(path.to_string());
        Some(middleware)
    }
}

/// A controller exposing the five resource actions.
pub trait ResourceController: Send + Sync + 'static {
    fn index(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn show(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn store(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn update(&self, ctx: Context) -> impl Future<Output = Response> + Send;
    fn destroy(&self, ctx: Context) -> impl Future<Output = Response> + Send;
}

/// Builder scoping a path prefix and a middleware set over registrations.
pub struct Group {
    registry: Arc<Mutex<Registry>>,
    prefix: String,
    origin: Vec<Arc<dyn Middleware>>,
    local: Vec<Arc<dyn Middleware>>,
    trailing: Vec<Arc<dyn Middleware>>,
}

impl Group {
    pub(crate) fn root(registry: Arc<Mutex<Registry>>, trailing: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            registry,
            prefix: String::new(),
            origin: Vec::new(),
            local: Vec::new(),
            trailing,
        }
    }

    /// Attach middleware to the next registration (or the next child group).
    pub fn middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.local.push(Arc::new(middleware));
        self
    }

    pub fn middlewares<I>(&mut self, middlewares: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.local.extend(middlewares);
        self
    }

    /// A child group under `segment`, inheriting this group's middleware.
    pub fn prefix(&mut self, segment: &str) -> Group {
        let prefix = join(&self.prefix, segment);
        self.child(prefix)
    }

    /// Run `f` against a child group with the same prefix.
    pub fn group<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Group),
    {
        let mut child = self.child(self.prefix.clone());
        f(&mut child);
    }

    /// Registers `GET` and `HEAD`.
    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> Action {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let full = self.full_path(path);
        self.register(
            RouteMethod::GetHead,
            &full,
            handler_name::<H>(),
            vec![(Verb::Get, full.clone(), handler.clone()), (Verb::Head, full.clone(), handler)],
        )
    }

    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> Action {
        self.single(Verb::Post, RouteMethod::Post, path, handler)
    }

    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> Action {
        self.single(Verb::Put, RouteMethod::Put, path, handler)
    }

    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> Action {
        self.single(Verb::Delete, RouteMethod::Delete, path, handler)
    }

    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> Action {
        self.single(Verb::Patch, RouteMethod::Patch, path, handler)
    }

    pub fn options<H: Handler>(&mut self, path: &str, handler: H) -> Action {
        self.single(Verb::Options, RouteMethod::Options, path, handler)
    }

    /// Matches every method that has no dedicated endpoint on `path`.
    pub fn any<H: Handler>(&mut self, path: &str, handler: H) -> Action {
        self.single(Verb::Any, RouteMethod::Any, path, handler)
    }

    /// `GET`/`POST` on `path`, `GET`/`PUT`/`PATCH`/`DELETE` on `path/{id}`.
    pub fn resource<C: ResourceController>(&mut self, path: &str, controller: C) -> Action {
        let controller = Arc::new(controller);
        let full = self.full_path(path);
        let member = self.full_path(&format!("{}/{{id}}", path.trim_end_matches('/')));

        let index = action(&controller, |c, ctx| async move { c.index(ctx).await });
        let store = action(&controller, |c, ctx| async move { c.store(ctx).await });
        let show = action(&controller, |c, ctx| async move { c.show(ctx).await });
        let update = action(&controller, |c, ctx| async move { c.update(ctx).await });
        let destroy = action(&controller, |c, ctx| async move { c.destroy(ctx).await });

        self.register(
            RouteMethod::Resource,
            &full,
            handler_name::<C>(),
            vec![
                (Verb::Get, full.clone(), index),
                (Verb::Post, full.clone(), store),
                (Verb::Get, member.clone(), show),
                (Verb::Put, member.clone(), update.clone()),
                (Verb::Patch, member.clone(), update),
                (Verb::Delete, member, destroy),
            ],
        )
    }

    /// Fully qualified path this group would register `path` under.
    pub fn full_path(&self, path: &str) -> String {
        let full = join(&self.prefix, path);
        if full.is_empty() {
            "/".to_string()
        } else {
            full
        }
    }

    fn child(&mut self, prefix: String) -> Group {
        let mut origin = self.origin.clone();
        origin.append(&mut self.local);
        Group {
            registry: self.registry.clone(),
            prefix,
            origin,
            local: Vec::new(),
            trailing: self.trailing.clone(),
        }
    }

    fn single<H: Handler>(&mut self, verb: Verb, method: RouteMethod, path: &str, handler: H) -> Action {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let full = self.full_path(path);
        self.register(method, &full, handler_name::<H>(), vec![(verb, full.clone(), handler)])
    }

    fn register(
        &mut self,
        method: RouteMethod,
        path: &str,
        handler: String,
        endpoints: Vec<(Verb, String, Arc<dyn Handler>)>,
    ) -> Action {
        let local = mem::take(&mut self.local);
        let mut registry = self.lock();

        for (verb, route_path, endpoint_handler) in endpoints {
            let cors = registry.cors_for(&route_path);
            let chain: Vec<Arc<dyn Middleware>> = cors
                .into_iter()
                .chain(self.origin.iter().cloned())
                .chain(local.iter().cloned())
                .chain(self.trailing.iter().cloned())
                .collect();
            registry.insert(verb, &route_path, Endpoint::new(chain, endpoint_handler));
        }

        registry.table.insert(RouteInfo {
            method,
            path: path.to_string(),
            name: String::new(),
            handler,
        });
        drop(registry);

        Action::new(self.registry.clone(), method, path.to_string())
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.prefix)
            .field("origin", &self.origin.len())
            .field("local", &self.local.len())
            .finish()
    }
}

/// `prefix` + `path`, with `path` given a leading slash when non-empty.
fn join(prefix: &str, path: &str) -> String {
    if path.is_empty() {
        prefix.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", prefix, path)
    } else {
        format!("{}/{}", prefix, path)
    }
}

fn handler_name<T>() -> String {
    std::any::type_name::<T>().to_string()
}

fn action<C, F, Fut>(controller: &Arc<C>, f: F) -> Arc<dyn Handler>
where
    C: ResourceController,
    F: Fn(Arc<C>, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let controller = controller.clone();
    Arc::new(move |ctx: Context| f(controller.clone(), ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(ctx: Context, next: crate::routing::Next) -> crate::routing::BoxFuture<'static, Response> {
        next.run(ctx)
    }

    fn root() -> Group {
        Group::root(Arc::new(Mutex::new(Registry::default())), Vec::new())
    }

    fn chain_len(group: &Group, path: &str, verb: Verb) -> usize {
        group.lock().endpoints[path][&verb].len()
    }

    #[test]
    fn test_join_and_full_path() {
        assert_eq!(join("", ""), "");
        assert_eq!(join("", "users"), "/users");
        assert_eq!(join("/api", "/v1"), "/api/v1");

        let mut root = root();
        assert_eq!(root.full_path(""), "/");
        assert_eq!(root.prefix("api").prefix("v1").full_path("users"), "/api/v1/users");
        assert_eq!(root.prefix("api/v1").full_path("users"), "/api/v1/users");
    }

    #[test]
    fn test_local_middleware_applies_to_one_registration() {
        let mut root = root();
        root.middleware(noop).get("/a", |_ctx: Context| async { "a" });
        root.get("/b", |_ctx: Context| async { "b" });

        assert_eq!(chain_len(&root, "/a", Verb::Get), 1);
        assert_eq!(chain_len(&root, "/a", Verb::Head), 1);
        assert_eq!(chain_len(&root, "/b", Verb::Get), 0);
    }

    #[test]
    fn test_group_snapshots_middleware_into_origin() {
        let mut root = root();
        root.middleware(noop).group(|group| {
            group.middleware(noop).post("/x", |_ctx: Context| async { "x" });
            group.post("/y", |_ctx: Context| async { "y" });
        });
        root.post("/z", |_ctx: Context| async { "z" });

        assert_eq!(chain_len(&root, "/x", Verb::Post), 2);
        assert_eq!(chain_len(&root, "/y", Verb::Post), 1);
        assert_eq!(chain_len(&root, "/z", Verb::Post), 0);
    }

    #[test]
    fn test_cors_injected_by_full_path() {
        let registry = Arc::new(Mutex::new(Registry {
            cors: Some(CorsInjection {
                paths: AnyMatcher::from_patterns(&["api/*"]),
                middleware: Arc::new(noop),
            }),
            ..Registry::default()
        }));
        let mut root = Group::root(registry, Vec::new());
        root.prefix("api").get("/users", |_ctx: Context| async { "u" });
        root.get("/web", |_ctx: Context| async { "w" });

        assert_eq!(chain_len(&root, "/api/users", Verb::Get), 1);
        assert_eq!(chain_len(&root, "/web", Verb::Get), 0);
        assert!(root.lock().cors_paths.contains("/api/users"));
    }
}
