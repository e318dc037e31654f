//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Parse every route template up front so a bad macro fails the load,
//!   not the first request
//! - Validate value ranges (timeouts > 0, statuses, addresses)
//! - Catch body placeholders that name no captured parameter
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Duplicate routes are left to the router's duplicate mode

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use thiserror::Error;

use crate::config::routes::BodyTemplate;
use crate::config::schema::{RouteConfig, ServerConfig};
use crate::routing::path::split_subdomain;
use crate::routing::{MacroRegistry, Route, RouteError};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.request_timeout_secs must be greater than 0")]
    ZeroTimeout,

    #[error("observability.log_level: unknown level '{0}'")]
    UnknownLogLevel(String),

    #[error("router.scheme must be http or https, got '{0}'")]
    UnknownScheme(String),

    #[error("router.vhost must not be empty")]
    EmptyVhost,

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyApiKey,

    #[error("routes[{index}]: invalid subdomain selector in '{path}'")]
    InvalidSubdomain { index: usize, path: String },

    #[error("routes[{index}]: {source}")]
    Route {
        index: usize,
        #[source]
        source: RouteError,
    },

    #[error("routes[{index}]: invalid status {status}")]
    InvalidStatus { index: usize, status: u16 },

    #[error("routes[{index}]: invalid header '{name}'")]
    InvalidHeader { index: usize, name: String },

    #[error("routes[{index}]: body placeholder '{{{placeholder}}}' is not a parameter of '{path}'")]
    UnknownPlaceholder {
        index: usize,
        path: String,
        placeholder: String,
    },

    #[error("routes[{index}]: name '{name}' is already used by routes[{first}]")]
    DuplicateName { index: usize, first: usize, name: String },
}

/// Checks `config` and returns every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if !matches!(config.router.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::UnknownScheme(config.router.scheme.clone()));
    }
    if config.router.vhost.as_deref().is_some_and(|v| v.trim().is_empty()) {
        errors.push(ValidationError::EmptyVhost);
    }

    if config.admin.enabled {
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    let registry = MacroRegistry::new();
    let mut names: Vec<(String, usize)> = Vec::new();
    for (index, route) in config.routes.iter().enumerate() {
        validate_route(&mut errors, &registry, index, route);
        if let Some(name) = &route.name {
            match names.iter().find(|(n, _)| n == name) {
                Some((_, first)) => errors.push(ValidationError::DuplicateName {
                    index,
                    first: *first,
                    name: name.clone(),
                }),
                None => names.push((name.clone(), index)),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn validate_route(errors: &mut Vec<ValidationError>, registry: &MacroRegistry, index: usize, cfg: &RouteConfig) {
    if StatusCode::from_u16(cfg.status).is_err() {
        errors.push(ValidationError::InvalidStatus { index, status: cfg.status });
    }
    let headers = std::iter::once(("content-type", cfg.content_type.as_str()))
        .chain(cfg.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for (name, value) in headers {
        if HeaderName::try_from(name).is_err() || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeader {
                index,
                name: name.to_string(),
            });
        }
    }

    let Some((subdomain, path)) = split_subdomain(&cfg.path) else {
        errors.push(ValidationError::InvalidSubdomain {
            index,
            path: cfg.path.clone(),
        });
        return;
    };
    let route = match Route::new(&cfg.method, &subdomain, &path, Vec::new(), registry) {
        Ok(route) => route,
        Err(source) => {
            errors.push(ValidationError::Route { index, source });
            return;
        }
    };

    let params: HashSet<&str> = route.template().params.iter().map(|p| p.name.as_str()).collect();
    for placeholder in BodyTemplate::parse(&cfg.body).placeholders() {
        if !params.contains(placeholder) {
            errors.push(ValidationError::UnknownPlaceholder {
                index,
                path: cfg.path.clone(),
                placeholder: placeholder.to_string(),
            });
        }
    }
}
