use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::routing::{PathArg, Route, RouteError, RouteInfo};

#[derive(Serialize, Deserialize, Debug)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub routes: usize,
    pub offline_routes: usize,
}

#[derive(Deserialize, Debug, Default)]
pub struct RoutesQuery {
    /// List the registered routes, edits not yet refreshed included.
    #[serde(default)]
    pub pending: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct PathQuery {
    /// Comma separated arguments.
    pub args: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PathResponse {
    pub name: String,
    pub path: String,
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub routes: usize,
    pub errors: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RouteState {
    pub name: String,
    pub method: String,
    pub offline: bool,
    /// Always true: the change is served after the next refresh.
    pub pending_refresh: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: error.into() }))
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let inner = state.inner.load();
    let routes = inner.router.routes();
    let offline_routes = routes.iter().filter(|r| r.offline).count();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        routes: routes.len(),
        offline_routes,
    })
}

pub async fn get_routes(
    State(state): State<AppState>,
    Query(query): Query<RoutesQuery>,
) -> Json<Vec<RouteInfo>> {
    let inner = state.inner.load();
    if query.pending {
        Json(inner.router.pending_routes())
    } else {
        Json(inner.router.routes())
    }
}

pub async fn get_path(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Json<PathResponse>, ApiError> {
    let args: Vec<PathArg> = query
        .args
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(PathArg::from)
        .collect();

    let inner = state.inner.load();
    let reverser = inner.router.reverser();
    match reverser.path(&name, &args) {
        Some(path) => Ok(Json(PathResponse {
            url: reverser.url(&name, &args),
            name,
            path,
        })),
        None if inner.router.handler().lookup(&name).is_none() => {
            Err(api_error(StatusCode::NOT_FOUND, format!("unknown route '{}'", name)))
        }
        None => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("arguments do not fit route '{}'", name),
        )),
    }
}

pub async fn post_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let inner = state.inner.load();
    let report = inner.router.refresh();
    Json(RefreshResponse {
        routes: inner.router.routes().len(),
        errors: report.errors().iter().map(ToString::to_string).collect(),
    })
}

pub async fn post_offline(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RouteState>, ApiError> {
    update(&state, &name, |route| {
        route.set_offline();
        Ok(())
    })
}

pub async fn post_online(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RouteState>, ApiError> {
    update(&state, &name, |route| {
        route.set_online();
        Ok(())
    })
}

pub async fn post_method(
    State(state): State<AppState>,
    Path((method, name)): Path<(String, String)>,
) -> Result<Json<RouteState>, ApiError> {
    update(&state, &name, |route| route.change_method(&method).map(|_| ()))
}

fn update(
    state: &AppState,
    name: &str,
    f: impl FnOnce(&mut Route) -> Result<(), RouteError>,
) -> Result<Json<RouteState>, ApiError> {
    let inner = state.inner.load();
    let mut outcome = None;
    inner.router.update_route(name, |route| {
        outcome = Some(f(route).map(|()| RouteState {
            name: route.name().to_string(),
            method: route.method().to_string(),
            offline: route.is_offline(),
            pending_refresh: true,
        }));
    });
    match outcome {
        Some(Ok(route_state)) => {
            tracing::info!(route = %name, method = %route_state.method, "Route updated by admin");
            Ok(Json(route_state))
        }
        Some(Err(e)) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
        None => Err(api_error(StatusCode::NOT_FOUND, format!("unknown route '{}'", name))),
    }
}
