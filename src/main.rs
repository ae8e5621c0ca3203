//! Application entry point for the `lineflow` ETL.
//!
//! This binary orchestrates a single batch run:
//! - Loading configuration from environment variables or `.env`, with
//!   command-line flags taking precedence
//! - Initializing structured logging/tracing
//! - Running the extract/transform/load pipeline, or the reporting queries
//!
//! # Environment Variables
//! - `SENSOR_CSV`, `QUALITY_CSV` – source files (or `--sensor-csv`, `--quality-csv`)
//! - `ETL_DB_PATH` (optional) – SQLite file (default: `production.db`)
//! - `ETL_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `ETL_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! All stage logic lives in the `lineflow` library; this file only wires the
//! CLI to it.
use std::env;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use lineflow::cli::{Cli, Command};
use lineflow::{config, pipeline, report};

// ---

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let cfg = config::load(args.into())?;
            cfg.log_config();

            let summary = pipeline::run(&cfg)
                .await
                .with_context(|| format!("ETL run into '{}' failed", cfg.db_path.display()))?;

            tracing::info!(
                sensor_rows = summary.sensor_rows,
                quality_rows = summary.quality_rows,
                hourly_rows = summary.hourly_rows,
                "ETL complete"
            );
        }
        Command::Report(args) => {
            report::write_report(&args.db, &args.out)
                .await
                .context("Report generation failed")?;
        }
    }

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `ETL_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `ETL_LOG_LEVEL` env var
///
/// Called once, before any stage runs, so every stage span is captured.
fn init_tracing() {
    // ---
    let span_events = match env::var("ETL_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("ETL_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
