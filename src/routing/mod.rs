//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (ApiBuilder / Party):
//!     "admin./users/{id:uint64 min(1) else 400}"
//!     → path.rs (subdomain selector split, cleaning)
//!     → macros (Template + validation handler)
//!     → route.rs (Route: compiled segments, handler chain)
//!
//! Build (Router::build / Router::refresh):
//!     Route[] → builder.rs (total order)
//!     → handler.rs (one Trie per method + subdomain)
//!     → atomic swap of the RouterHandler snapshot
//!
//! Request:
//!     Context (method, host, path)
//!     → handler.rs (path correction, host check, trie search)
//!     → matched chain | 405 + Allow | 404
//! ```
//!
//! # Design Decisions
//! - Tries are immutable after a build; requests never lock.
//! - Static segments beat named parameters, which beat wildcards; a dead
//!   end falls back to the nearest wildcard ancestor.
//! - Type checks and validator functions cost nothing unless declared.

pub mod builder;
pub mod context;
pub mod error;
pub mod handler;
pub mod macros;
pub mod path;
pub mod reverser;
pub mod route;
pub mod router;
pub mod trie;

pub use builder::{ApiBuilder, DuplicateMode, Party, Registrar};
pub use context::{handler, Context, Handler, ParamValue, Params};
pub use error::{BuildReport, RouteError};
pub use handler::{Dispatch, RouterHandler, RouterOptions};
pub use macros::{MacroError, MacroRegistry, ParamType};
pub use reverser::{PathArg, PathReverser};
pub use route::{Route, RouteInfo, ALL_METHODS, METHOD_NONE};
pub use router::Router;
