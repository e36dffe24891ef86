//! Spatial fallback: borrow the nearest-date reading of a nearby key.
//!
//! Keys are assumed to be spatially ordered codes, so `key ± i` for small `i`
//! is a nearby location. The neighbor index replicates every original
//! observation under each shifted key `key + i`, `i ∈ [-R, R] \ {0}`, and
//! keeps one date-sorted array per shifted key. A lookup binary-searches
//! that array for the date closest to the target.
//!
//! Tie-breaks, in order:
//! 1. smaller date distance
//! 2. earlier date
//! 3. smaller `|offset|` (closer source key)
//! 4. smaller source key
//!
//! The index is always built from the complete observation set, including
//! keys outside the domain and dates outside the range. Chunked runs share
//! one index so a chunk boundary never hides a neighbor.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::domain::{LocationKey, ObservationRecord};
use crate::grid::DenseGrid;

/// Default neighbor offset range `R`.
pub const DEFAULT_OFFSET_RANGE: u32 = 10;

/// One original observation seen from a shifted key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEntry {
    pub date: NaiveDate,
    pub source_key: LocationKey,
    pub offset: i64,
    pub value: f64,
}

impl NeighborEntry {
    fn rank(&self) -> (NaiveDate, u64, LocationKey) {
        (self.date, self.offset.unsigned_abs(), self.source_key)
    }
}

/// Per-shifted-key, date-sorted neighbor arrays.
#[derive(Debug, Clone, Default)]
pub struct NeighborIndex {
    offset_range: u32,
    by_key: HashMap<LocationKey, Vec<NeighborEntry>>,
}

impl NeighborIndex {
    /// Build the index from original observations.
    ///
    /// With `targets` set, only shifted keys in that set are stored. Pass the
    /// full key domain here, never a chunk of it.
    pub fn build(
        observations: &[ObservationRecord],
        offset_range: u32,
        targets: Option<&HashSet<LocationKey>>,
    ) -> Self {
        let r = i64::from(offset_range);
        let mut by_key: HashMap<LocationKey, Vec<NeighborEntry>> = HashMap::new();

        for obs in observations {
            for offset in (-r..=r).filter(|i| *i != 0) {
                let Some(shifted) = obs.key.checked_add(offset) else {
                    continue;
                };
                if targets.is_some_and(|t| !t.contains(&shifted)) {
                    continue;
                }
                by_key.entry(shifted).or_default().push(NeighborEntry {
                    date: obs.date,
                    source_key: obs.key,
                    offset,
                    value: obs.value,
                });
            }
        }

        for entries in by_key.values_mut() {
            entries.sort_by_key(NeighborEntry::rank);
        }

        Self { offset_range, by_key }
    }

    pub fn offset_range(&self) -> u32 {
        self.offset_range
    }

    /// Number of shifted keys with at least one candidate.
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    /// The best candidate for `key` at `date`, if `key` has any neighbor at all.
    pub fn nearest(&self, key: LocationKey, date: NaiveDate) -> Option<&NeighborEntry> {
        let entries = self.by_key.get(&key)?;

        // First entry on or after `date`; it is the best-ranked of its date group.
        let idx = entries.partition_point(|e| e.date < date);
        let after = entries.get(idx);

        // Best-ranked entry of the latest date group before `date`.
        let before = idx.checked_sub(1).map(|j| {
            let group_date = entries[j].date;
            &entries[entries[..=j].partition_point(|e| e.date < group_date)]
        });

        match (before, after) {
            (Some(b), Some(a)) => {
                let db = (date - b.date).num_days();
                let da = (a.date - date).num_days();
                Some(if db <= da { b } else { a })
            }
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }
}

/// Fill empty cells from the neighbor index.
pub fn resolve_from_neighbors(grid: &DenseGrid, index: &NeighborIndex) -> DenseGrid {
    let mut values = grid.values().to_vec();
    let n = grid.n_days();
    if n == 0 {
        return grid.with_values(values);
    }
    let range = grid.range();
    let keys = grid.keys();

    values
        .par_chunks_mut(n)
        .zip(keys.par_iter())
        .for_each(|(row, key)| {
            if row.iter().all(Option::is_some) {
                return;
            }
            for (d, cell) in row.iter_mut().enumerate() {
                if cell.is_none() {
                    *cell = index.nearest(*key, range.date_at(d)).map(|e| e.value);
                }
            }
        });

    grid.with_values(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DateRange;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 3, day).unwrap()
    }

    fn rec(key: i64, day: u32, value: f64) -> ObservationRecord {
        ObservationRecord {
            key,
            date: d(day),
            value,
            coord: None,
        }
    }

    fn empty_grid(keys: Vec<i64>, days: u32) -> DenseGrid {
        let n = keys.len() * days as usize;
        let coords = vec![None; keys.len()];
        DenseGrid::from_parts(DateRange::new(d(1), d(days)).unwrap(), keys, coords, vec![None; n]).unwrap()
    }

    #[test]
    fn index_replicates_under_every_nonzero_offset() {
        let index = NeighborIndex::build(&[rec(50, 1, 1.0)], 2, None);
        assert_eq!(index.key_count(), 4);
        assert!(index.nearest(50, d(1)).is_none());
        for key in [48, 49, 51, 52] {
            assert_eq!(index.nearest(key, d(1)).map(|e| e.source_key), Some(50));
        }
        assert!(index.nearest(53, d(1)).is_none());
    }

    #[test]
    fn nearest_date_prefers_earlier_on_equal_distance() {
        let obs = vec![rec(11, 2, 2.0), rec(11, 6, 6.0)];
        let index = NeighborIndex::build(&obs, 1, None);
        assert_eq!(index.nearest(10, d(4)).map(|e| e.value), Some(2.0));
        assert_eq!(index.nearest(10, d(5)).map(|e| e.value), Some(6.0));
        assert_eq!(index.nearest(10, d(1)).map(|e| e.value), Some(2.0));
        assert_eq!(index.nearest(10, d(30)).map(|e| e.value), Some(6.0));
    }

    #[test]
    fn same_date_prefers_closer_source_key() {
        let obs = vec![rec(13, 3, 13.0), rec(9, 3, 9.0), rec(11, 3, 11.0)];
        let index = NeighborIndex::build(&obs, 3, None);
        // 9 and 11 are both one away from 10; the smaller key wins the tie.
        assert_eq!(index.nearest(10, d(3)).map(|e| e.source_key), Some(9));
        // Exact date beats a closer key on a farther date.
        let obs = vec![rec(11, 1, 1.0), rec(13, 3, 3.0)];
        let index = NeighborIndex::build(&obs, 3, None);
        assert_eq!(index.nearest(10, d(3)).map(|e| e.source_key), Some(13));
    }

    #[test]
    fn targets_limit_stored_keys() {
        let targets: HashSet<i64> = [101].into_iter().collect();
        let index = NeighborIndex::build(&[rec(100, 1, 1.0)], 10, Some(&targets));
        assert_eq!(index.key_count(), 1);
        assert!(index.nearest(101, d(1)).is_some());
    }

    #[test]
    fn keys_without_observations_borrow_from_neighbors() {
        let obs = vec![rec(100, 1, 5.0), rec(102, 2, 7.0)];
        let index = NeighborIndex::build(&obs, 2, None);
        let out = resolve_from_neighbors(&empty_grid(vec![101], 3), &index);
        assert_eq!(out.null_count(), 0);
        for v in out.row(0).iter().flatten() {
            assert!(*v == 5.0 || *v == 7.0);
        }
        // Day 1: 100 is exact. Day 3: 102 (one day away) beats 100 (two days away).
        assert_eq!(out.row(0), &[Some(5.0), Some(7.0), Some(7.0)]);
    }

    #[test]
    fn keys_beyond_the_offset_range_stay_empty() {
        let index = NeighborIndex::build(&[rec(100, 1, 5.0)], 10, None);
        let out = resolve_from_neighbors(&empty_grid(vec![111], 2), &index);
        assert_eq!(out.null_count(), 2);
    }

    #[test]
    fn known_cells_are_not_overwritten() {
        let index = NeighborIndex::build(&[rec(2, 1, 9.0)], 1, None);
        let g = empty_grid(vec![1], 2).with_values(vec![Some(1.0), None]);
        let out = resolve_from_neighbors(&g, &index);
        assert_eq!(out.row(0), &[Some(1.0), Some(9.0)]);
    }
}
