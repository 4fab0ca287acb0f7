//! satcast-run - Run one Satcast action and print the JSON result

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libsatcast::app::build_orchestrator;
use libsatcast::logging::{LogFormat, LoggingConfig};
use libsatcast::{Action, BatchRunner, Config, SatcastError};
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "satcast-run")]
#[command(version)]
#[command(about = "Run a single Satcast action once and print the result as JSON")]
#[command(long_about = "\
satcast-run - Run a single Satcast action once

USAGE:
    # Post the hourly price update everywhere
    satcast-run postBitcoin1hPriceUpdateToAll

    # Run every task in order
    satcast-run --all

    # List accepted action names
    satcast-run --list

EXIT CODES:
    0 - Action ran (individual platforms may still have failed)
    1 - Runtime error
    2 - Configuration error
    3 - Unknown action
")]
struct Cli {
    /// Action name, e.g. postFearGreedIndexToAll
    #[arg(required_unless_present_any = ["all", "list"])]
    action: Option<String>,

    /// Run every task (same as allUnifiedTasks)
    #[arg(long, conflicts_with = "action")]
    all: bool,

    /// Print the accepted action names and exit
    #[arg(long)]
    list: bool,

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
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<SatcastError>()
            .map(SatcastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.list {
        for name in Action::names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let action = if cli.all {
        Action::AllTasks
    } else {
        cli.action.as_deref().unwrap_or_default().parse::<Action>()?
    };

    let config = Config::from_env()?;
    let orchestrator = Arc::new(build_orchestrator(&config)?);

    let output = match action {
        Action::Task(task) => {
            info!(task = %task, "Running task once");
            let result = orchestrator.execute(task).await?;
            serde_json::to_value(result)?
        }
        Action::AllTasks => {
            info!("Running all tasks once");
            let batch = BatchRunner::new(orchestrator).run().await;
            json!({ "summary": batch.summary(), "results": batch })
        }
    };

    let rendered = serde_json::to_string_pretty(&output).context("Failed to render result")?;
    println!("{}", rendered);
    Ok(())
}
