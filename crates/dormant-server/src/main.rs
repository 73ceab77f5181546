//! Dormant server - headless page suspension engine with an HTTP protocol surface.

use anyhow::Result;
use axum::Router;
use clap::Parser;
use dormant_server::{config, logging, routes, scheduler, state};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use config::Config;
use logging::{LogConfig, LogFormat};
use state::AppState;

/// Dormant server - suspends idle pages and reconciles their metadata.
#[derive(Parser, Debug)]
#[command(name = "dormant-server")]
#[command(about = "Headless page suspension engine")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the seed pages file from config
    #[arg(long, value_name = "FILE")]
    seed: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "reconcile=debug").
    /// Can be specified multiple times. Targets are prefixed with "dormant::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(seed) = cli.seed {
        config.seed_pages = Some(seed);
    }
    tracing::info!(
        target: "dormant::startup",
        "Loaded configuration (port: {}, db: {})",
        config.port,
        config.db_path.display()
    );

    let seed = config.load_seed_pages()?;
    let state = Arc::new(AppState::with_seed(config.clone(), &seed)?);
    tracing::info!(target: "dormant::startup", "Initialized application state ({} seed pages)", seed.len());

    scheduler::spawn_startup_reconcile(state.clone());
    scheduler::spawn_janitor(state.clone());
    tracing::info!(
        target: "dormant::startup",
        "Scheduled startup reconciliation in {:?}, janitor every {:?}",
        config.suspension.startup_delay(),
        config.suspension.janitor_interval()
    );

    let app = Router::new()
        .nest("/api", routes::api_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(target: "dormant::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
