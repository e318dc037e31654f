//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pathmux_requests_total` (counter): dispatches by method and outcome
//!   (`matched`, `redirect`, `not_found`, `method_not_allowed`)
//! - `pathmux_dispatch_duration_seconds` (histogram): time spent in the
//!   router and the matched handler chain
//! - `pathmux_routes` (gauge): routes in the served snapshot, by state
//! - `pathmux_router_refresh_total` (counter): snapshot rebuilds by result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Histogram buckets tuned for in-process dispatch, not network latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const DISPATCH_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5,
];

/// Installs the Prometheus recorder and serves `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("pathmux_dispatch_duration_seconds".to_string()),
            DISPATCH_BUCKETS,
        )?
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Records one dispatch through the router.
pub fn record_dispatch(method: &str, outcome: &'static str, start: Instant) {
    counter!(
        "pathmux_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("pathmux_dispatch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Publishes the route counts of a freshly built snapshot.
pub fn record_routes(online: usize, offline: usize) {
    gauge!("pathmux_routes", "state" => "online").set(online as f64);
    gauge!("pathmux_routes", "state" => "offline").set(offline as f64);
}

pub fn record_refresh(errors: usize) {
    let result = if errors == 0 { "ok" } else { "errors" };
    counter!("pathmux_router_refresh_total", "result" => result).increment(1);
}
