//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Application identity and debug switch.
    pub app: AppSection,

    /// Listener, timeout and size limits.
    pub http: HttpConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,
}

/// Application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSection {
    /// Name used in startup logs.
    pub name: String,

    /// Enables per-request trace logging and the startup route listing.
    pub debug: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "switchyard".to_string(),
            debug: false,
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host to bind (e.g., "127.0.0.1").
    pub host: String,

    /// Port to bind. Kept as a string so an empty value can be reported.
    pub port: String,

    /// Bound on handler execution under the global timeout guard, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum buffered request body, in KiB.
    pub body_limit_kb: usize,

    /// Maximum request header block, in KiB.
    pub header_limit_kb: usize,
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit_kb.saturating_mul(1024)
    }

    pub fn header_limit(&self) -> usize {
        self.header_limit_kb.saturating_mul(1024)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: "3000".to_string(),
            request_timeout_secs: 3,
            body_limit_kb: 4096,
            header_limit_kb: 4096,
        }
    }
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Route path patterns the policy applies to (`api/*`, `login`).
    pub paths: Vec<String>,

    /// Allowed methods; `["*"]` means the common set.
    pub allowed_methods: Vec<String>,

    /// Allowed origins; `"*"` allows any, one `*` wildcard per entry is supported.
    pub allowed_origins: Vec<String>,

    /// Allowed request headers; `"*"` allows any.
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to the client.
    pub exposed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds; 0 omits the header.
    pub max_age: u64,

    /// Sends `Access-Control-Allow-Credentials: true`.
    pub supports_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            allowed_methods: vec!["*".to_string()],
            allowed_origins: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            exposed_headers: Vec::new(),
            max_age: 0,
            supports_credentials: false,
        }
    }
}
