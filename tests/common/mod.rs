//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pathmux::config::ServerConfig;
use pathmux::http::{AppState, HttpServer};
use pathmux::lifecycle::Shutdown;
use pathmux::routing::{handler, ApiBuilder, Context, Dispatch, Handler, Router, RouterOptions};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A handler writing `tag` as the body, so tests can tell routes apart.
pub fn tag(tag: &'static str) -> Vec<Handler> {
    vec![handler(move |ctx: &mut Context| ctx.write_str(tag))]
}

/// Outcome of one dispatch.
#[derive(Debug)]
pub struct Served {
    pub dispatch: Dispatch,
    pub status: u16,
    pub body: String,
    pub route: Option<String>,
    pub params: BTreeMap<String, String>,
    pub allow: Option<String>,
}

pub fn serve(router: &Router, method: &str, host: &str, path: &str) -> Served {
    let mut ctx = Context::new(method, host, path);
    let dispatch = router.serve(&mut ctx);
    let route = ctx.route_name().map(str::to_string);
    let params = ctx
        .params()
        .iter()
        .map(|e| (e.key.clone(), e.raw.clone()))
        .collect();
    let allow = ctx
        .headers()
        .get("allow")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let (status, _, body) = ctx.into_response_parts();
    Served {
        dispatch,
        status: status.as_u16(),
        body: String::from_utf8_lossy(&body).into_owned(),
        route,
        params,
        allow,
    }
}

pub fn get(router: &Router, path: &str) -> Served {
    serve(router, "GET", "", path)
}

/// Builds a router, failing the test on any registration or build error.
pub fn build(api: ApiBuilder, options: RouterOptions) -> Router {
    let (router, report) = Router::build(api, options);
    assert!(report.is_empty(), "unexpected build errors: {}", report);
    router
}

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Arc<Shutdown>,
    pub config_updates: mpsc::UnboundedSender<ServerConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_server(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config);
    let state = server.state();
    let shutdown = Arc::new(Shutdown::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        state,
        shutdown,
        config_updates: tx,
    }
}

/// Serves the admin API of `state` on an ephemeral local port.
pub async fn start_admin(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = pathmux::admin::setup_admin_router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}
