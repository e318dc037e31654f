//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum router that sends every request through the routing
//!   engine
//! - Wire up middleware (tracing, timeout, request ID)
//! - Apply configuration updates by building a new runtime state and
//!   swapping it in
//! - Start the admin API next to the main listener when enabled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::{build_api, ServerConfig};
use crate::http::request::{dispatch_context, RequestIdExt, RequestIdLayer};
use crate::http::response::into_response;
use crate::observability::{metrics, tracing::make_request_span};
use crate::routing::{BuildReport, Dispatch, Router as RouteRouter};

/// Everything a request needs, replaced as a whole on config reload.
pub struct RuntimeState {
    pub config: ServerConfig,
    pub router: RouteRouter,
}

impl RuntimeState {
    /// Builds the router for `config`. Route errors do not fail the build;
    /// they are logged and returned in the report.
    pub fn build(config: ServerConfig) -> (Self, BuildReport) {
        let api = build_api(&config);
        let (router, report) = RouteRouter::build(api, config.router.options());
        for error in report.errors() {
            tracing::warn!(error = %error, "Route not served");
        }
        (Self { config, router }, report)
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<RuntimeState>>,
}

impl AppState {
    pub fn new(runtime: RuntimeState) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(runtime)),
        }
    }

    /// Swaps in a runtime built from `config`. Requests already running
    /// finish against the previous router.
    pub fn reload(&self, config: ServerConfig) -> BuildReport {
        let (runtime, report) = RuntimeState::build(config);
        tracing::info!(
            routes = runtime.router.routes().len(),
            errors = report.len(),
            "Configuration applied"
        );
        self.inner.store(Arc::new(runtime));
        report
    }
}

/// HTTP server serving configured routes.
pub struct HttpServer {
    state: AppState,
    request_timeout: Duration,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let request_timeout = Duration::from_secs(config.listener.request_timeout_secs);
        let (runtime, _) = RuntimeState::build(config);
        Self {
            state: AppState::new(runtime),
            request_timeout,
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// The axum app with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(RequestIdLayer)
    }

    /// Serves `listener` until `shutdown` fires, applying every config
    /// received on `config_updates`. Listener settings (bind address,
    /// timeout) only change on restart.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.reload(config);
            }
        });

        let admin = self.state.inner.load().config.admin.clone();
        if admin.enabled {
            let bound = TcpListener::bind(&admin.bind_address).await;
            match bound {
                Ok(admin_listener) => {
                    let app = setup_admin_router(self.state.clone());
                    let mut admin_shutdown = shutdown.resubscribe();
                    tokio::spawn(async move {
                        tracing::info!(address = %admin.bind_address, "Admin API starting");
                        let result = axum::serve(admin_listener, app)
                            .with_graceful_shutdown(async move {
                                let _ = admin_shutdown.recv().await;
                            })
                            .await;
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Admin API stopped");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(address = %admin.bind_address, error = %e, "Failed to bind admin API");
                }
            }
        }

        let app = self.app().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Runs one request through the routing engine.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().cloned().unwrap_or_default();
    let mut ctx = dispatch_context(&request);

    let runtime = state.inner.load();
    let dispatch = runtime.router.serve(&mut ctx);
    metrics::record_dispatch(ctx.method(), dispatch.outcome(), start);

    match &dispatch {
        Dispatch::Matched { route } => {
            tracing::trace!(request_id = %request_id, route = %route, status = %ctx.status(), "Route matched");
        }
        Dispatch::Redirect { location } => {
            tracing::debug!(request_id = %request_id, location = %location, "Path corrected");
        }
        Dispatch::NotFound => {
            tracing::debug!(request_id = %request_id, host = %ctx.host(), path = %ctx.path(), "No route matched");
        }
        Dispatch::MethodNotAllowed { allowed } => {
            tracing::debug!(request_id = %request_id, allowed = ?allowed, "Method not allowed");
        }
    }

    into_response(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut config = ServerConfig::default();
        config.routes.push(RouteConfig::new("/users/{id:uint64}", "user {id}"));
        config.router.fire_method_not_allowed = true;
        HttpServer::new(config)
    }

    async fn send(app: Router, method: &str, uri: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "localhost")
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_through_app() {
        let server = server();
        let response = send(server.app(), "GET", "/users/5").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"user 5");

        let response = send(server.app(), "DELETE", "/users/5").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "GET");

        let response = send(server.app(), "GET", "/users/5/").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()["location"], "/users/5");
    }

    #[tokio::test]
    async fn test_percent_encoded_path_is_decoded() {
        let mut config = ServerConfig::default();
        config.routes.push(RouteConfig::new("/users/{name:alphabetical}", "{name}"));
        let server = HttpServer::new(config);

        let response = send(server.app(), "GET", "/users/john%20doe").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"john doe");
    }

    #[tokio::test]
    async fn test_reload_swaps_routes() {
        let server = server();
        let state = server.state();

        let mut config = ServerConfig::default();
        config.routes.push(RouteConfig::new("/health", "ok"));
        let report = state.reload(config);
        assert!(report.is_empty());

        assert_eq!(send(server.app(), "GET", "/health").await.status(), StatusCode::OK);
        assert_eq!(send(server.app(), "GET", "/users/5").await.status(), StatusCode::NOT_FOUND);
    }
}
