//! Admin API.
//!
//! ```text
//! GET  /admin/status                    version and route counts
//! GET  /admin/routes[?pending=true]     served (or registered) routes
//! GET  /admin/path/{name}?args=a,b      reverse lookup
//! POST /admin/refresh                   rebuild the tries
//! POST /admin/offline/{name}            take a route offline
//! POST /admin/online/{name}             bring it back
//! POST /admin/method/{method}/{name}    change its method
//! ```
//!
//! Route names may contain `/`, so they are matched as the rest of the
//! path. Route edits are served after the next refresh.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/path/{*name}", get(get_path))
        .route("/admin/refresh", post(post_refresh))
        .route("/admin/offline/{*name}", post(post_offline))
        .route("/admin/online/{*name}", post(post_online))
        .route("/admin/method/{method}/{*name}", post(post_method))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
