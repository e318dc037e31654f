//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! pathmux.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, route templates parsed once)
//!     → ServerConfig (validated, immutable)
//!     → routes.rs builds the ApiBuilder from [[routes]]
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new Router built and swapped in by the server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod routes;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use routes::build_api;
pub use schema::{AdminConfig, ListenerConfig, ObservabilityConfig, RouteConfig, RouterConfig, ServerConfig};
pub use validation::ValidationError;
