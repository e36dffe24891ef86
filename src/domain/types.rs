//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - passed between pipeline stages without hidden state
//! - embedded in the coverage report JSON
//! - rebuilt from a dense CSV for the `verify` command

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FillError;

/// Integer identifier of a geographic unit (e.g. a county FIPS code).
pub type LocationKey = i64;

/// Fixed coordinates of a location key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

/// One sparse input reading. Never mutated after ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub key: LocationKey,
    pub date: NaiveDate,
    pub value: f64,
    pub coord: Option<Coord>,
}

/// How absent `(key, date)` cells of a signal are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FillPolicy {
    /// Temporal, then spatial, then global-mean fallback.
    Interpolate,
    /// Absence means zero (event signals such as wildfire extent).
    Zero,
}

/// How same-`(key, date)` observations are collapsed before materializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Sum,
    /// Pass records through; duplicates make the materializer fail.
    None,
}

/// Inclusive, day-granular date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FillError> {
        if end < start {
            return Err(FillError::Config(format!(
                "date range end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of days in the range (both ends included).
    pub fn days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Position of `date` along the range, if inside it.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if date < self.start || date > self.end {
            return None;
        }
        Some((date - self.start).num_days() as usize)
    }

    pub fn date_at(&self, idx: usize) -> NaiveDate {
        self.start + Days::new(idx as u64)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.index_of(date).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.days()).map(|i| self.date_at(i))
    }
}

/// The authoritative, deduplicated set of valid keys.
#[derive(Debug, Clone, Default)]
pub struct KeyDomain {
    /// Sorted ascending, unique.
    pub keys: Vec<LocationKey>,
    /// Reference coordinates from the domain file, when it carries them.
    pub coords: BTreeMap<LocationKey, Coord>,
    /// Rows dropped because their key was already seen.
    pub duplicates_dropped: usize,
}

impl KeyDomain {
    /// Build a domain from raw keys, deduplicating and sorting.
    pub fn from_keys(keys: impl IntoIterator<Item = LocationKey>) -> Self {
        let mut out: Vec<LocationKey> = keys.into_iter().collect();
        let before = out.len();
        out.sort_unstable();
        out.dedup();
        let duplicates_dropped = before - out.len();
        Self {
            keys: out,
            coords: BTreeMap::new(),
            duplicates_dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: LocationKey) -> bool {
        self.keys.binary_search(&key).is_ok()
    }
}

/// One row of the dense output (and of a dense CSV read back for auditing).
#[derive(Debug, Clone, PartialEq)]
pub struct DenseRow {
    pub key: LocationKey,
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub coord: Option<Coord>,
}

/// Largest accepted neighbor offset range. The neighbor index stores `2R`
/// copies of every observation.
pub const MAX_OFFSET_RANGE: u32 = 1_000;

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags and `GAPFILL_*` environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub keys_path: PathBuf,
    pub input_path: PathBuf,
    pub key_column: String,
    pub value_column: String,
    pub range: DateRange,
    pub policy: FillPolicy,

    /// Neighbor offsets `[-R, R]` (excluding 0) used by the spatial fallback.
    pub offset_range: u32,
    pub aggregation: Aggregation,
    /// Expand `[date, end_date]` spans into per-day records.
    pub spread_events: bool,
    /// Use key-domain coordinates for keys that have no observation coordinates.
    pub domain_coords: bool,
    /// Process the domain in key chunks of this size.
    pub chunk_keys: Option<usize>,

    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), FillError> {
        if self.value_column.trim().is_empty() {
            return Err(FillError::Config("value column name is empty".to_string()));
        }
        if self.key_column.trim().is_empty() {
            return Err(FillError::Config("key column name is empty".to_string()));
        }
        if self.chunk_keys == Some(0) {
            return Err(FillError::Config("key chunk size must be > 0".to_string()));
        }
        if self.offset_range > MAX_OFFSET_RANGE {
            return Err(FillError::Config(format!(
                "offset range {} exceeds the maximum of {MAX_OFFSET_RANGE}",
                self.offset_range
            )));
        }
        if self.range.end < self.range.start {
            return Err(FillError::Config(format!(
                "date range end {} is before start {}",
                self.range.end, self.range.start
            )));
        }
        Ok(())
    }
}
