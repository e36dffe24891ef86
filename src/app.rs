//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the stderr log subscriber
//! - runs the fill pipeline or the verifier
//! - prints summaries and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FillArgs, VerifyArgs};
use crate::domain::{Aggregation, DateRange, RunConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `gapfill` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is normal.
    dotenvy::dotenv().ok();

    let cli = crate::cli::Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Fill(args) => handle_fill(args),
        Command::Verify(args) => handle_verify(args),
    }
}

/// Logs go to stderr so stdout stays clean for summaries.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Ignore a second init (tests, embedding).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_fill(args: FillArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let run = pipeline::run_fill(&config)?;

    println!("{}", crate::report::format_run_summary(&run.report));

    if let Some(path) = &config.output {
        crate::io::write_dense_csv(path, &run.grid, &config.key_column, &config.value_column)?;
        info!(path = %path.display(), rows = run.grid.len(), "wrote dense grid");
    }
    if let Some(path) = &config.report {
        crate::io::write_report_json(path, &run.report)?;
        info!(path = %path.display(), "wrote run report");
    }

    Ok(())
}

fn handle_verify(args: VerifyArgs) -> Result<(), AppError> {
    let grid = &args.grid;
    let range = DateRange::new(grid.start, grid.end)?;
    let domain = crate::io::load_key_domain(&grid.keys, &grid.key_column)?;
    let rows = crate::io::load_dense_rows(&args.input, &grid.key_column, &grid.value_column)?;

    let coverage = crate::verify::verify_rows(&rows, &domain, range, &grid.value_column);
    println!("{}", crate::report::format_coverage(&coverage));

    if let Some(path) = &args.report {
        crate::io::write_report_json(path, &coverage)?;
    }

    if coverage.is_complete() {
        Ok(())
    } else {
        Err(AppError::new(
            1,
            format!("'{}' does not fully cover the key domain and date range", args.input.display()),
        ))
    }
}

pub fn run_config_from_args(args: &FillArgs) -> Result<RunConfig, AppError> {
    let grid = &args.grid;
    let aggregation = args.aggregate.unwrap_or(if args.spread_events {
        Aggregation::Sum
    } else {
        Aggregation::Mean
    });

    let config = RunConfig {
        keys_path: grid.keys.clone(),
        input_path: args.input.clone(),
        key_column: grid.key_column.clone(),
        value_column: grid.value_column.clone(),
        range: DateRange::new(grid.start, grid.end)?,
        policy: args.policy,
        offset_range: args.offset_range,
        aggregation,
        spread_events: args.spread_events,
        domain_coords: args.domain_coords,
        chunk_keys: args.chunk_keys,
        output: args.output.clone(),
        report: args.report.clone(),
    };
    config.validate()?;
    Ok(config)
}
