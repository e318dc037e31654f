//! OS signal handling.
//!
//! - SIGTERM / SIGINT trigger graceful shutdown; a second one exits at once
//! - SIGHUP rebuilds the router from its registered routes

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Exit code used when a second termination signal forces the exit.
pub const FORCED_EXIT_CODE: i32 = 130;

fn on_terminate(shutdown: &Shutdown, signal: &str) {
    if shutdown.trigger() {
        tracing::info!(signal, "Graceful shutdown requested");
    } else {
        tracing::warn!(signal, "Second termination signal, exiting immediately");
        std::process::exit(FORCED_EXIT_CODE);
    }
}

/// Installs the handlers and returns the task listening for signals.
#[cfg(unix)]
pub fn spawn_signal_handler<F>(shutdown: Arc<Shutdown>, on_refresh: F) -> std::io::Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => on_terminate(&shutdown, "SIGTERM"),
                _ = sigint.recv() => on_terminate(&shutdown, "SIGINT"),
                _ = sighup.recv() => {
                    tracing::info!("SIGHUP received, refreshing routes");
                    on_refresh();
                }
            }
        }
    }))
}

/// Installs the handlers and returns the task listening for signals.
/// Only Ctrl+C is available; refresh is left to the admin API.
#[cfg(not(unix))]
pub fn spawn_signal_handler<F>(shutdown: Arc<Shutdown>, _on_refresh: F) -> std::io::Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            on_terminate(&shutdown, "Ctrl+C");
        }
    }))
}
