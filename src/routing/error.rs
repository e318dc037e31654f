//! Registration-time errors and the aggregate build report.

use std::fmt;

use thiserror::Error;

use crate::routing::macros::MacroError;

/// An error raised while registering or building a single route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The template could not be parsed by the macro system.
    #[error("route {method} {path}: {source}")]
    Macro {
        method: String,
        path: String,
        #[source]
        source: MacroError,
    },

    /// The path does not start with a slash after subdomain extraction.
    #[error("route {method} {path}: path must begin with '/'")]
    InvalidPath { method: String, path: String },

    /// The method is not one of the known HTTP methods (or the virtual NONE).
    #[error("route {path}: unknown method {method:?}")]
    UnknownMethod { method: String, path: String },

    /// A route with the same method, subdomain and template already exists.
    #[error("route {method} {subdomain}{path} is already registered as {existing:?}")]
    Duplicate {
        method: String,
        subdomain: String,
        path: String,
        existing: String,
    },

    /// Two different routes resolved to the same name.
    #[error("route name {0:?} is already taken")]
    DuplicateName(String),
}

/// All errors collected during registration and build.
///
/// An empty report means every route was accepted. The caller decides
/// whether a non-empty report is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    errors: Vec<RouteError>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: RouteError) {
        self.errors.push(err);
    }

    pub fn extend(&mut self, other: BuildReport) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[RouteError] {
        &self.errors
    }

    /// Converts the report into a `Result`, failing when any error was collected.
    pub fn into_result(self) -> Result<(), BuildReport> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} route error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildReport {}
