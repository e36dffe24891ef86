//! Shared "fill pipeline" logic.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load domain -> load observations -> aggregate -> fill chain -> verify -> report
//!
//! The CLI only decides what to print and where to write.

use tracing::{info, warn};

use crate::domain::{FillPolicy, KeyDomain, RunConfig};
use crate::error::FillError;
use crate::fill::{ChainOptions, run_chain};
use crate::grid::{DenseGrid, aggregate};
use crate::io::ingest::{IngestedObservations, ObservationSchema, load_key_domain, load_observations};
use crate::report::{IngestSummary, RunReport, ZeroFillStats, residual_warning};
use crate::verify::verify_rows;

/// All computed outputs of a single `gapfill fill` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub grid: DenseGrid,
    pub report: RunReport,
}

/// Execute the full pipeline from the files named in `config`.
pub fn run_fill(config: &RunConfig) -> Result<RunOutput, FillError> {
    config.validate()?;

    // Schema problems in either input abort before any grid is built.
    let domain = load_key_domain(&config.keys_path, &config.key_column)?;
    let ingested = load_observations(&config.input_path, &ObservationSchema::from(config))?;

    run_fill_with_inputs(config, &domain, ingested)
}

/// Execute the pipeline on already-loaded inputs.
pub fn run_fill_with_inputs(
    config: &RunConfig,
    domain: &KeyDomain,
    ingested: IngestedObservations,
) -> Result<RunOutput, FillError> {
    config.validate()?;

    let ingest = IngestSummary {
        rows_read: ingested.rows_read,
        records: ingested.records.len(),
        blank_keys: ingested.blank_keys,
        dropped_values: ingested.row_issues.len(),
    };

    let (records, aggregation) = aggregate(&ingested.records, config.aggregation);
    let chain = run_chain(&records, domain, &ChainOptions::from(config))?;

    // Streamed straight off the grid; no row copy is materialized.
    let coverage = verify_rows(chain.grid.rows(), domain, config.range, &config.value_column);

    let mut warnings = chain.warnings;
    if let Some(w) = residual_warning(&coverage) {
        warn!("{w}");
        warnings.push(w);
    }
    if !coverage.incomplete_keys.is_empty() || !coverage.missing_keys.is_empty() {
        warn!(
            incomplete = coverage.incomplete_keys.len(),
            missing = coverage.missing_keys.len(),
            "output does not cover every key and date"
        );
    }
    info!(
        rows = coverage.total_rows,
        keys = coverage.output_keys,
        complete = coverage.is_complete(),
        "verified output"
    );

    let zero_fill = (config.policy == FillPolicy::Zero)
        .then(|| ZeroFillStats::from_grid(&chain.grid, chain.unobserved_cells));

    let report = RunReport {
        tool: "gapfill".to_string(),
        config: config.clone(),
        ingest,
        aggregation,
        placement: chain.placement,
        stages: chain.stages,
        zero_fill,
        coverage,
        warnings,
    };

    Ok(RunOutput {
        grid: chain.grid,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Aggregation, DateRange};
    use crate::io::ingest::load_dense_rows;
    use crate::io::write_dense_csv;
    use chrono::NaiveDate;
    use std::path::{Path, PathBuf};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn config(dir: &Path, value: &str, days: u32, policy: FillPolicy) -> RunConfig {
        RunConfig {
            keys_path: dir.join("keys.csv"),
            input_path: dir.join("obs.csv"),
            key_column: "fips".to_string(),
            value_column: value.to_string(),
            range: DateRange::new(d(1), d(days)).unwrap(),
            policy,
            offset_range: 2,
            aggregation: Aggregation::Mean,
            spread_events: false,
            domain_coords: false,
            chunk_keys: None,
            output: None,
            report: None,
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn interpolate_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keys.csv", "fips\n100\n101\n102\n");
        write(
            dir.path(),
            "obs.csv",
            "fips,date,fmc,lon,lat\n100,2020-01-01,4.0,-1,1\n100,2020-01-01,6.0,-1,1\n102,2020-01-02,7.0,-3,3\n",
        );

        let cfg = config(dir.path(), "fmc", 3, FillPolicy::Interpolate);
        let out = run_fill(&cfg).unwrap();

        assert_eq!(out.grid.len(), 9);
        assert_eq!(out.grid.row(0), &[Some(5.0); 3]);
        assert!(out.report.coverage.is_complete());
        assert_eq!(out.report.aggregation.duplicate_groups, 1);
        assert_eq!(out.report.stages.len(), 3);
        // Key 101 has no observation, so no coordinates.
        assert!(out.report.warnings.iter().any(|w| w.to_string().contains("101")));

        let csv_path = dir.path().join("filled.csv");
        write_dense_csv(&csv_path, &out.grid, "fips", "fmc").unwrap();
        let rows = load_dense_rows(&csv_path, "fips", "fmc").unwrap();
        assert_eq!(rows.len(), 9);
        assert!(rows.iter().all(|r| r.value.is_some()));
    }

    #[test]
    fn zero_run_reports_zero_split() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keys.csv", "fips\n200\n");
        write(dir.path(), "obs.csv", "fips,date,fire_size,lon,lat\n200,2020-01-05,42.0,-120,38\n");

        let cfg = config(dir.path(), "fire_size", 10, FillPolicy::Zero);
        let out = run_fill(&cfg).unwrap();

        let z = out.report.zero_fill.unwrap();
        assert_eq!(z.zero_filled, 9);
        assert_eq!(z.non_zero_cells, 1);
        assert_eq!(out.grid.get(200, d(5)), Some(Some(42.0)));
        assert_eq!(out.grid.get(200, d(6)), Some(Some(0.0)));
        assert!(out.report.stages.is_empty());
        assert!(out.report.warnings.is_empty());
    }

    #[test]
    fn unaggregated_duplicates_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keys.csv", "fips\n1\n");
        write(dir.path(), "obs.csv", "fips,date,fmc\n1,2020-01-01,1\n1,2020-01-01,2\n");

        let mut cfg = config(dir.path(), "fmc", 2, FillPolicy::Interpolate);
        cfg.aggregation = Aggregation::None;
        assert!(matches!(run_fill(&cfg), Err(FillError::DuplicateKey { key: 1, .. })));
    }

    #[test]
    fn schema_error_fails_before_grid_construction() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keys.csv", "fips\n1\nnot-a-key\n");
        write(dir.path(), "obs.csv", "fips,date,fmc\n1,2020-01-01,1\n");

        let cfg = config(dir.path(), "fmc", 2, FillPolicy::Interpolate);
        assert!(matches!(run_fill(&cfg), Err(FillError::Schema(_))));
    }

    #[test]
    fn same_inputs_give_the_same_grid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keys.csv", "fips\n1\n2\n3\n40\n");
        write(
            dir.path(),
            "obs.csv",
            "fips,date,fmc\n1,2020-01-02,1\n3,2020-01-01,3\n3,2020-01-04,5\n2,2020-01-03,2\n",
        );

        let cfg = config(dir.path(), "fmc", 5, FillPolicy::Interpolate);
        let a = run_fill(&cfg).unwrap();
        let b = run_fill(&cfg).unwrap();
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.grid.null_count(), 0);
    }
}
