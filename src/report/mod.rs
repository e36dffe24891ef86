//! Run reporting: the coverage report artifact and its terminal rendering.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::RunConfig;
use crate::error::FillWarning;
use crate::fill::StageOutcome;
use crate::grid::{AggregationStats, DenseGrid, PlacementStats};
use crate::verify::CoverageReport;

/// What ingest read and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub records: usize,
    pub blank_keys: usize,
    pub dropped_values: usize,
}

/// Zero/non-zero split of a zero-policy grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZeroFillStats {
    /// Cells set to zero because nothing was observed.
    pub zero_filled: usize,
    pub zero_cells: usize,
    pub non_zero_cells: usize,
    pub zero_pct: f64,
    pub non_zero_pct: f64,
}

impl ZeroFillStats {
    pub fn from_grid(grid: &DenseGrid, zero_filled: usize) -> Self {
        let total = grid.len();
        let zero_cells = grid.values().iter().filter(|v| **v == Some(0.0)).count();
        let non_zero_cells = total - zero_cells;
        let pct = |n: usize| if total == 0 { 0.0 } else { n as f64 * 100.0 / total as f64 };
        Self {
            zero_filled,
            zero_cells,
            non_zero_cells,
            zero_pct: pct(zero_cells),
            non_zero_pct: pct(non_zero_cells),
        }
    }
}

/// The diagnostic artifact of one `fill` run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub tool: String,
    pub config: RunConfig,
    pub ingest: IngestSummary,
    pub aggregation: AggregationStats,
    pub placement: PlacementStats,
    pub stages: Vec<StageOutcome>,
    pub zero_fill: Option<ZeroFillStats>,
    pub coverage: CoverageReport,
    pub warnings: Vec<FillWarning>,
}

/// Warning for value cells still empty after every fill stage ran.
pub fn residual_warning(coverage: &CoverageReport) -> Option<FillWarning> {
    let cells = coverage.residual_value_nulls();
    (cells > 0).then(|| FillWarning::ResidualMissing {
        column: coverage.value_column().to_string(),
        cells,
    })
}
