use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use pathmux::config::{load_config, watcher::ConfigWatcher};
use pathmux::http::{HttpServer, RuntimeState};
use pathmux::lifecycle::{signals::spawn_signal_handler, Shutdown};
use pathmux::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Parser)]
#[command(name = "pathmux")]
#[command(about = "HTTP server for trie-routed, config-declared routes", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "pathmux.toml")]
    config: PathBuf,

    /// Validate the configuration, print the route table and exit
    #[arg(long)]
    check: bool,

    /// Do not reload when the configuration file changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    if args.check {
        let (runtime, report) = RuntimeState::build(config);
        for route in runtime.router.routes() {
            let state = if route.offline { " (offline)" } else { "" };
            println!("{:<8} {}{}  {}{}", route.method, route.subdomain, route.path, route.name, state);
        }
        if !report.is_empty() {
            return Err(report.into());
        }
        return Ok(());
    }

    init_logging(&config.observability)?;
    tracing::info!("pathmux v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (watcher, config_updates) = ConfigWatcher::new(&args.config);
    let _watcher = if args.no_watch {
        None
    } else {
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!(error = %e, "Config watcher unavailable, hot reload disabled");
                None
            }
        }
    };

    let server = HttpServer::new(config);
    let shutdown = Arc::new(Shutdown::new());
    let state = server.state();
    spawn_signal_handler(shutdown.clone(), move || {
        state.inner.load().router.refresh();
    })?;

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
