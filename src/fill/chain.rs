//! The fallback chain: materialize, then temporal, spatial and global-mean fills.
//!
//! Every stage is a pure `&DenseGrid -> DenseGrid` transform that only writes
//! cells still empty when it runs. With a key chunk size set, the first
//! three steps run per key chunk against one shared neighbor index, and the
//! global-mean stage runs once on the merged grid (it needs every key).

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{DateRange, FillPolicy, KeyDomain, LocationKey, ObservationRecord, RunConfig};
use crate::error::{FillError, FillWarning};
use crate::fill::global_mean::fill_with_daily_mean;
use crate::fill::spatial::{NeighborIndex, resolve_from_neighbors};
use crate::fill::temporal::interpolate_nearest;
use crate::grid::{DenseGrid, PlacementStats, materialize, placement_stats};

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Temporal,
    Spatial,
    GlobalMean,
}

impl Stage {
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Temporal => "temporal nearest",
            Stage::Spatial => "spatial neighbor",
            Stage::GlobalMean => "daily global mean",
        }
    }
}

/// Cell counts around one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub empty_before: usize,
    pub filled: usize,
}

/// Chain settings, independent of where inputs come from.
#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub range: DateRange,
    pub policy: FillPolicy,
    pub offset_range: u32,
    pub chunk_keys: Option<usize>,
    pub domain_coords: bool,
}

impl From<&RunConfig> for ChainOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            range: config.range,
            policy: config.policy,
            offset_range: config.offset_range,
            chunk_keys: config.chunk_keys,
            domain_coords: config.domain_coords,
        }
    }
}

/// Everything the chain produced.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub grid: DenseGrid,
    pub stages: Vec<StageOutcome>,
    pub placement: PlacementStats,
    /// Cells with no observation right after materialization.
    pub unobserved_cells: usize,
    pub warnings: Vec<FillWarning>,
}

/// Run the fill chain over `observations` (already aggregated) for every domain key.
pub fn run_chain(
    observations: &[ObservationRecord],
    domain: &KeyDomain,
    options: &ChainOptions,
) -> Result<ChainOutput, FillError> {
    if domain.is_empty() {
        return Err(FillError::Schema("key domain is empty".to_string()));
    }
    if options.chunk_keys == Some(0) {
        return Err(FillError::Config("key chunk size must be > 0".to_string()));
    }

    let range = options.range;
    let placement = placement_stats(observations, domain, range);
    info!(
        in_grid = placement.in_grid,
        unknown_key = placement.unknown_key,
        out_of_range = placement.out_of_range,
        "placed observations"
    );

    let fallback_coords = options.domain_coords.then_some(&domain.coords);
    let interpolate = options.policy == FillPolicy::Interpolate;

    let index = if interpolate {
        let targets: HashSet<LocationKey> = domain.keys.iter().copied().collect();
        let index = NeighborIndex::build(observations, options.offset_range, Some(&targets));
        debug!(keys = index.key_count(), offset_range = options.offset_range, "built neighbor index");
        Some(index)
    } else {
        None
    };

    let chunk_size = options.chunk_keys.unwrap_or(domain.len());
    let sorted = observations.is_sorted_by_key(|r| r.key);

    let mut parts = Vec::new();
    let mut unobserved_cells = 0usize;
    let mut temporal = StageOutcome {
        stage: Stage::Temporal,
        empty_before: 0,
        filled: 0,
    };
    let mut spatial = StageOutcome {
        stage: Stage::Spatial,
        empty_before: 0,
        filled: 0,
    };
    let mut warnings = Vec::new();

    for (i, keys) in domain.keys.chunks(chunk_size).enumerate() {
        let records = records_for_keys(observations, keys, sorted);
        let materialized = materialize(&records, keys, range, options.policy, fallback_coords)?;

        for key in &materialized.missing_coords {
            let w = FillWarning::CoordinateMissing { key: *key };
            warn!("{w}");
            warnings.push(w);
        }

        let mut grid = materialized.grid;
        let empty = match options.policy {
            FillPolicy::Interpolate => grid.null_count(),
            FillPolicy::Zero => records_in_grid_complement(&records, keys, range),
        };
        unobserved_cells += empty;

        if let Some(index) = &index {
            let before = grid.null_count();
            grid = interpolate_nearest(&grid);
            let after = grid.null_count();
            temporal.empty_before += before;
            temporal.filled += before - after;

            grid = resolve_from_neighbors(&grid, index);
            spatial.empty_before += after;
            spatial.filled += after - grid.null_count();
        }

        debug!(chunk = i, keys = keys.len(), "chunk done");
        parts.push(grid);
    }

    let mut grid = DenseGrid::concat(parts, range)?;
    let mut stages = Vec::new();

    if interpolate {
        stages.push(temporal);
        stages.push(spatial);

        let before = grid.null_count();
        grid = fill_with_daily_mean(&grid);
        stages.push(StageOutcome {
            stage: Stage::GlobalMean,
            empty_before: before,
            filled: before - grid.null_count(),
        });

        for s in &stages {
            info!(
                stage = s.stage.display_name(),
                empty_before = s.empty_before,
                filled = s.filled,
                "fill stage finished"
            );
        }
    } else {
        info!(zero_filled = unobserved_cells, "zero policy: absent cells set to 0");
    }

    Ok(ChainOutput {
        grid,
        stages,
        placement,
        unobserved_cells,
        warnings,
    })
}

fn records_for_keys(
    observations: &[ObservationRecord],
    keys: &[LocationKey],
    sorted: bool,
) -> Vec<ObservationRecord> {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return Vec::new();
    };
    if sorted {
        let lo = observations.partition_point(|r| r.key < *first);
        let hi = observations.partition_point(|r| r.key <= *last);
        observations[lo..hi].to_vec()
    } else {
        observations
            .iter()
            .filter(|r| keys.binary_search(&r.key).is_ok())
            .cloned()
            .collect()
    }
}

fn records_in_grid_complement(records: &[ObservationRecord], keys: &[LocationKey], range: DateRange) -> usize {
    let observed = records
        .iter()
        .filter(|r| keys.binary_search(&r.key).is_ok() && range.contains(r.date))
        .count();
    keys.len() * range.days() - observed
}
