//! errorcast server
//!
//! Run with: cargo run --bin errorcast
//!
//! Configuration is read from `--config`, or the first of
//! `$CONFIG_DIR/errorcast/config.toml`, `/etc/errorcast/config.toml` and
//! `./config.toml`. `ERRORCAST_*` environment variables override file
//! values and `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use clap::Parser;
use errorcast::api::{serve, AppState};
use errorcast::config::{Config, LoggingConfig};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

#[derive(Parser)]
#[command(name = "errorcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time error streaming server")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Discovery is logged only once the subscriber exists
    let (mut config, report) = match &args.config {
        Some(path) => (Config::load_with_env(path)?, None),
        None => {
            let report = Config::discover();
            (report.config.clone(), Some(report))
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging)?;

    tracing::info!("Starting errorcast v{}", errorcast::SERVER_VERSION);
    match (&report, &args.config) {
        (Some(report), _) => report.log(),
        (None, Some(path)) => tracing::info!("Loaded config from {:?}", path),
        (None, None) => {}
    }
    tracing::info!(
        stats_interval_secs = config.streaming.stats_interval_secs,
        max_connections = config.streaming.max_connections,
        outbound_queue_capacity = config.streaming.outbound_queue_capacity,
        "Streaming configuration"
    );

    let state = AppState::from_config(&config);
    let hub = Arc::clone(&state.hub);
    let stats_task = Arc::clone(&hub).start_stats_broadcast();

    serve(state, &config.server).await?;

    // The hub is stopped by now, so the stats loop exits on its own
    if let Err(e) = stats_task.await {
        tracing::warn!(error = %e, "Stats broadcast task ended abnormally");
    }

    tracing::info!(total_errors = hub.stats().total_errors, "errorcast shutdown complete");
    Ok(())
}

/// Install the global subscriber described by `[logging]`
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("errorcast={},tower_http=info", logging.level))
    });

    let json = logging.format.eq_ignore_ascii_case("json");

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            let writer = Mutex::new(file);
            if json {
                fmt::layer().json().with_writer(writer).with_ansi(false).boxed()
            } else {
                fmt::layer().with_writer(writer).with_ansi(false).boxed()
            }
        }
        None if json => fmt::layer().json().boxed(),
        None => fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
