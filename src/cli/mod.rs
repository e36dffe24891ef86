//! Command-line parsing for the gap-filling tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fill engine. Every option can also come from a `GAPFILL_*` environment
//! variable (a `.env` file is loaded first).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{Aggregation, FillPolicy};
use crate::fill::DEFAULT_OFFSET_RANGE;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gapfill", version, about = "Dense daily time series from sparse per-location readings")]
pub struct Cli {
    /// Log level when `RUST_LOG` is not set (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info", env = "GAPFILL_LOG")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the dense grid, run the fallback chain, audit and export.
    Fill(FillArgs),
    /// Audit a dense CSV produced by `fill` without changing it.
    Verify(VerifyArgs),
}

/// Key domain, columns and date range shared by both commands.
#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// CSV listing every valid location key.
    #[arg(long, value_name = "CSV", env = "GAPFILL_KEYS")]
    pub keys: PathBuf,

    /// Name of the key column in every input file.
    #[arg(long, default_value = "fips", env = "GAPFILL_KEY_COLUMN")]
    pub key_column: String,

    /// Name of the value column (e.g. fmc, wind_speed, fire_size).
    #[arg(long = "value", value_name = "COLUMN", env = "GAPFILL_VALUE")]
    pub value_column: String,

    /// First day of the range (inclusive, YYYY-MM-DD).
    #[arg(long, default_value = "1992-01-01", env = "GAPFILL_START")]
    pub start: NaiveDate,

    /// Last day of the range (inclusive, YYYY-MM-DD).
    #[arg(long, default_value = "2020-12-31", env = "GAPFILL_END")]
    pub end: NaiveDate,
}

/// Options for `gapfill fill`.
#[derive(Debug, Args, Clone)]
pub struct FillArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    /// Sparse observation CSV (`<key>,date,<value>[,lon,lat][,end_date]`).
    #[arg(long, value_name = "CSV", env = "GAPFILL_INPUT")]
    pub input: PathBuf,

    /// How absent cells are filled.
    #[arg(long, value_enum, default_value_t = FillPolicy::Interpolate, env = "GAPFILL_POLICY")]
    pub policy: FillPolicy,

    /// Neighbor key offsets `[-R, R]` tried by the spatial fallback (at most 1000).
    #[arg(long, default_value_t = DEFAULT_OFFSET_RANGE, env = "GAPFILL_OFFSET_RANGE")]
    pub offset_range: u32,

    /// Duplicate (key, date) handling. Defaults to `sum` with --spread-events, else `mean`.
    #[arg(long, value_enum, env = "GAPFILL_AGGREGATE")]
    pub aggregate: Option<Aggregation>,

    /// Spread each row's value evenly over `[date, end_date]`.
    #[arg(long, env = "GAPFILL_SPREAD_EVENTS")]
    pub spread_events: bool,

    /// Use key-domain lat/lon for keys whose observations carry no coordinates.
    #[arg(long, env = "GAPFILL_DOMAIN_COORDS")]
    pub domain_coords: bool,

    /// Process the key domain in chunks of this many keys.
    #[arg(long, env = "GAPFILL_CHUNK_KEYS")]
    pub chunk_keys: Option<usize>,

    /// Write the dense grid to this CSV.
    #[arg(long, short = 'o', value_name = "CSV", env = "GAPFILL_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Write the coverage report to this JSON file.
    #[arg(long, value_name = "JSON", env = "GAPFILL_REPORT")]
    pub report: Option<PathBuf>,
}

/// Options for `gapfill verify`.
#[derive(Debug, Args, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    /// Dense CSV to audit.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// Write the coverage report to this JSON file.
    #[arg(long, value_name = "JSON")]
    pub report: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_defaults() {
        let cli = Cli::try_parse_from([
            "gapfill", "fill", "--keys", "all_fips_code.csv", "--input", "fuel.csv", "--value", "fmc",
        ])
        .unwrap();
        let Command::Fill(args) = cli.command else {
            panic!("expected fill");
        };
        assert_eq!(args.policy, FillPolicy::Interpolate);
        assert_eq!(args.offset_range, 10);
        assert_eq!(args.aggregate, None);
        assert_eq!(args.grid.key_column, "fips");
        assert_eq!(args.grid.start, NaiveDate::from_ymd_opt(1992, 1, 1).unwrap());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn zero_policy_with_events() {
        let cli = Cli::try_parse_from([
            "gapfill", "fill", "--keys", "k.csv", "--input", "fires.csv", "--value", "fire_size",
            "--policy", "zero", "--spread-events", "--start", "2020-01-01", "--end", "2020-12-31",
            "--log-level", "debug",
        ])
        .unwrap();
        let Command::Fill(args) = cli.command else {
            panic!("expected fill");
        };
        assert_eq!(args.policy, FillPolicy::Zero);
        assert!(args.spread_events);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn bad_date_is_rejected() {
        let res = Cli::try_parse_from([
            "gapfill", "verify", "--keys", "k.csv", "--input", "x.csv", "--value", "fmc", "--start", "1992-13-01",
        ]);
        assert!(res.is_err());
    }
}
