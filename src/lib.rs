//! pathmux: a trie-based HTTP routing engine.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing::Router ──▶ route handler chain
//!                      (request ID,     (host + method      (macro validation,
//!                       tracing)         trie, 404/405,      middleware, handler,
//!                                        path correction)    done handlers)
//!     Client Response
//!     ◀────────────── http::response ◀── Context (status, headers, body)
//!
//!     config ──▶ routes ──▶ ApiBuilder ──▶ Router::build / refresh ──▶ snapshot swap
//!     admin API, SIGHUP ──▶ Router::refresh
//! ```
//!
//! The routing engine in [`routing`] is usable on its own: register
//! routes on an [`ApiBuilder`], build a [`Router`] and call
//! [`Router::serve`] with a [`routing::Context`].

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{ApiBuilder, Registrar, Router, RouterOptions};
