//! satcast-server - HTTP triggers and scheduled posting
//!
//! Serves the trigger API and runs the cron schedule until SIGTERM or
//! SIGINT, then stops accepting connections and exits cleanly.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use libsatcast::app::build_orchestrator;
use libsatcast::images::LocalImageStore;
use libsatcast::logging::{LogFormat, LoggingConfig};
use libsatcast::schedule::{default_jobs, Scheduler};
use libsatcast::{Config, Result};
use satcast_server::{router, AppState};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "satcast-server")]
#[command(version)]
#[command(about = "HTTP triggers and scheduled posting for the Satcast bot")]
#[command(long_about = "\
satcast-server - HTTP triggers and scheduled posting

DESCRIPTION:
    Posts Bitcoin price, Fear & Greed and monthly returns updates to
    Twitter and Bluesky on a fixed UTC schedule, and exposes HTTP
    endpoints to run any task on demand.

ENDPOINTS:
    GET  /health             Liveness probe
    GET  /actions            List accepted action names
    POST /execute/{action}   Run one action
    POST /execute-all        Run every task in order
    GET  /images/...         Stored post images

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown

CONFIGURATION:
    Environment variables, optionally from a .env file in the working
    directory. COIN_ID, CURRENCY, COINGECKO_API_URL, BLUESKY_HANDLE and
    BLUESKY_APP_PASSWORD are required.

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Serve HTTP triggers only, without the cron schedule
    #[arg(long)]
    no_schedule: bool,

    /// Log output format: text, json or pretty
    #[arg(long, env = "SATCAST_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.init();

    if let Err(e) = run(cli).await {
        error!(error = %e, "satcast-server failed");
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let orchestrator = Arc::new(build_orchestrator(&config)?);
    info!(platforms = ?orchestrator.platforms(), "satcast-server starting");

    let images_dir: PathBuf =
        LocalImageStore::new(&config.images.dir, &config.images.public_base_url)?
            .dir()
            .to_path_buf();
    tokio::fs::create_dir_all(&images_dir).await?;

    // Set up graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let signals = setup_signal_handlers()?;

    let scheduler = if cli.no_schedule {
        info!("Cron schedule disabled");
        None
    } else {
        let scheduler = Scheduler::new(orchestrator.clone(), default_jobs(&config.donation)?);
        let flag = shutdown.clone();
        Some(tokio::spawn(async move { scheduler.run(flag).await }))
    };

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "Listening for HTTP triggers");

    let app = router(AppState::new(orchestrator), &images_dir);
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(signals, shutdown.clone()))
        .await?;

    shutdown.store(true, Ordering::Relaxed);
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }

    info!("satcast-server stopped");
    Ok(())
}

#[cfg(unix)]
type ShutdownSignals = signal_hook_tokio::Signals;

#[cfg(not(unix))]
type ShutdownSignals = ();

/// Register for SIGTERM and SIGINT
#[cfg(unix)]
fn setup_signal_handlers() -> Result<ShutdownSignals> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    Ok(signal_hook_tokio::Signals::new([SIGINT, SIGTERM])?)
}

#[cfg(not(unix))]
fn setup_signal_handlers() -> Result<ShutdownSignals> {
    Ok(())
}

/// Resolve on the first shutdown signal and raise the shutdown flag
#[cfg(unix)]
async fn wait_for_shutdown(mut signals: ShutdownSignals, shutdown: Arc<AtomicBool>) {
    use futures::StreamExt;

    if let Some(signal) = signals.next().await {
        info!(signal, "Received shutdown signal, stopping gracefully...");
    }
    shutdown.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_signals: ShutdownSignals, shutdown: Arc<AtomicBool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal, stopping gracefully...");
    }
    shutdown.store(true, Ordering::Relaxed);
}
