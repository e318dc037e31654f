//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::{DuplicateMode, RouterOptions};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, timeouts).
    pub listener: ListenerConfig,

    /// Dispatch behavior of the router.
    pub router: RouterConfig,

    /// Routes served by the router, in registration order.
    pub routes: Vec<RouteConfig>,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Router behavior.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Answer 405 + Allow when the path exists under another method.
    pub fire_method_not_allowed: bool,

    /// Serve paths with trailing or repeated slashes as they are.
    pub disable_path_correction: bool,

    /// Fix unclean paths in place instead of redirecting.
    pub disable_path_correction_redirection: bool,

    /// What to do with a route that conflicts with an earlier one.
    pub duplicate: DuplicateMode,

    /// Host the `*.` subdomain is relative to (e.g. "example.com:8080").
    pub vhost: Option<String>,

    /// Scheme used when building absolute URLs.
    pub scheme: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fire_method_not_allowed: false,
            disable_path_correction: false,
            disable_path_correction_redirection: false,
            duplicate: DuplicateMode::default(),
            vhost: None,
            scheme: "http".to_string(),
        }
    }
}

impl RouterConfig {
    pub fn options(&self) -> RouterOptions {
        RouterOptions {
            fire_method_not_allowed: self.fire_method_not_allowed,
            disable_path_correction: self.disable_path_correction,
            disable_path_correction_redirection: self.disable_path_correction_redirection,
            vhost: self.vhost.clone(),
            scheme: self.scheme.clone(),
        }
    }
}

/// A route answered with a fixed status and a body template.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteConfig {
    /// HTTP method, or "NONE" for an offline route.
    #[serde(default = "default_method")]
    pub method: String,

    /// Path template, optionally prefixed by a subdomain selector
    /// (e.g. "admin./users/{id:uint64}").
    pub path: String,

    /// Route name for reverse lookups; defaults to method + subdomain + path.
    #[serde(default)]
    pub name: Option<String>,

    /// Response status.
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response body. `{param}` is replaced by the captured parameter.
    #[serde(default)]
    pub body: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Extra response headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Register the route offline: reachable by name only.
    #[serde(default)]
    pub offline: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

impl RouteConfig {
    /// A GET route with defaults for everything but the path and body.
    pub fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            path: path.into(),
            name: None,
            status: default_status(),
            body: body.into(),
            content_type: default_content_type(),
            headers: BTreeMap::new(),
            offline: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
