//! Mobile view proxy.
//!
//! A front proxy that decides per request whether the mobile view of the
//! upstream platform is served.
//!
//! ```text
//!     Client Request
//!     ─────────────▶ request id / trace / timeout / body limit
//!                        │
//!                        ▼
//!                  mobile middleware ── toggle / auto redirect ──▶ 302
//!                        │  (resolve mode once, annotate request)
//!                        ▼
//!                  proxy handler ───────────────────────────────▶ Upstream
//!                        │
//!                        ▼
//!     ◀───────────── response post-processing
//!                    (Location, Vary, Link, X-Analytics, config blob)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mobile_view_proxy::config::{self, ProxyConfig};
use mobile_view_proxy::config::watcher::ConfigWatcher;
use mobile_view_proxy::http::HttpServer;
use mobile_view_proxy::lifecycle::{spawn_signal_handler, Shutdown};
use mobile_view_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mobile-view-proxy", version)]
#[command(about = "Front proxy serving the mobile or desktop view per request", long_about = None)]
struct Args {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("mobile-view-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        request_timeout_secs = config.timeouts.request_secs,
        mobile_enabled = config.mobile.enabled,
        url_template = ?config.mobile.url_template,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must stay alive for reloads to keep flowing.
    let (config_updates, _watcher) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::start(path)?;
            (updates, Some(watcher))
        }
        _ => (mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
