//! Registered route bookkeeping.
//!
//! # Responsibilities
//! - Record (method, path, name, handler) for every registration
//! - Produce the ordered listing used by the route lister
//! - Resolve routes by name
//!
//! # Design Decisions
//! - Ordered maps give the listing order for free: path ascending, then
//!   the canonical method order encoded by [`RouteMethod`]'s `Ord`
//! - Re-registering the same (path, method) replaces the earlier entry

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::routing::group::Registry;

/// Method label shown in the route listing, in canonical listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RouteMethod {
    #[serde(rename = "GET|HEAD")]
    GetHead,
    #[serde(rename = "HEAD")]
    Head,
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "OPTIONS")]
    Options,
    #[serde(rename = "ANY")]
    Any,
    #[serde(rename = "RESOURCE")]
    Resource,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::GetHead => "GET|HEAD",
            RouteMethod::Head => "HEAD",
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Any => "ANY",
            RouteMethod::Resource => "RESOURCE",
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the route listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: RouteMethod,
    pub path: String,
    pub name: String,
    pub handler: String,
}

/// Route metadata keyed by path, then method.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, BTreeMap<RouteMethod, RouteInfo>>,
}

impl RouteTable {
    pub fn insert(&mut self, info: RouteInfo) {
        self.routes
            .entry(info.path.clone())
            .or_default()
            .insert(info.method, info);
    }

    pub fn set_name(&mut self, method: RouteMethod, path: &str, name: &str) -> bool {
        match self.routes.get_mut(path).and_then(|m| m.get_mut(&method)) {
            Some(info) => {
                info.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Every route, ordered by path then canonical method order.
    pub fn list(&self) -> Vec<RouteInfo> {
        self.routes
            .values()
            .flat_map(|methods| methods.values().cloned())
            .collect()
    }

    /// First route in listing order carrying `name`.
    pub fn find(&self, name: &str) -> Option<RouteInfo> {
        self.routes
            .values()
            .flat_map(|methods| methods.values())
            .find(|info| info.name == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Handle returned by a registration, used to name the route.
pub struct Action {
    registry: Arc<Mutex<Registry>>,
    method: RouteMethod,
    path: String,
}

impl Action {
    pub(crate) fn new(registry: Arc<Mutex<Registry>>, method: RouteMethod, path: String) -> Self {
        Self { registry, method, path }
    }

    /// Attach a name, used by [`crate::Router::info`].
    pub fn name(self, name: &str) -> Self {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if !registry.table.set_name(self.method, &self.path, name) {
            tracing::warn!(method = %self.method, path = %self.path, "Cannot name an unknown route");
        }
        drop(registry);
        self
    }

    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish()
    }
}
