//! Build the full key×date grid and left-merge observations onto it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Coord, DateRange, FillPolicy, KeyDomain, LocationKey, ObservationRecord};
use crate::error::FillError;
use crate::grid::DenseGrid;

/// Materializer output: the grid plus keys whose coordinates could not be resolved.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub grid: DenseGrid,
    pub missing_coords: Vec<LocationKey>,
}

/// Where the input observations landed relative to the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlacementStats {
    pub in_grid: usize,
    pub unknown_key: usize,
    pub out_of_range: usize,
}

/// Materialize `keys × range` and merge `records` onto it.
///
/// `keys` must be strictly ascending. Records for other keys or dates are
/// ignored. Under [`FillPolicy::Zero`] every unmatched cell is set to `0.0`;
/// otherwise it stays empty.
///
/// Coordinates for a key come from its earliest-dated record that carries
/// them (records outside the range count too). When none does, the key is
/// looked up in `fallback_coords`; if still unresolved it is listed in
/// [`Materialized::missing_coords`].
pub fn materialize(
    records: &[ObservationRecord],
    keys: &[LocationKey],
    range: DateRange,
    policy: FillPolicy,
    fallback_coords: Option<&BTreeMap<LocationKey, Coord>>,
) -> Result<Materialized, FillError> {
    ensure_unique_pairs(records)?;

    let n_days = range.days();
    let mut values: Vec<Option<f64>> = vec![None; keys.len() * n_days];
    let mut first_coord: Vec<Option<(NaiveDate, Coord)>> = vec![None; keys.len()];

    for r in records {
        let Ok(k) = keys.binary_search(&r.key) else {
            continue;
        };
        if let Some(c) = r.coord {
            match first_coord[k] {
                Some((date, _)) if date <= r.date => {}
                _ => first_coord[k] = Some((r.date, c)),
            }
        }
        if let Some(d) = range.index_of(r.date) {
            values[k * n_days + d] = Some(r.value);
        }
    }

    if policy == FillPolicy::Zero {
        for v in values.iter_mut().filter(|v| v.is_none()) {
            *v = Some(0.0);
        }
    }

    let mut coords = Vec::with_capacity(keys.len());
    let mut missing_coords = Vec::new();
    for (k, key) in keys.iter().enumerate() {
        let coord = first_coord[k]
            .map(|(_, c)| c)
            .or_else(|| fallback_coords.and_then(|m| m.get(key).copied()));
        if coord.is_none() {
            missing_coords.push(*key);
        }
        coords.push(coord);
    }

    Ok(Materialized {
        grid: DenseGrid::from_parts(range, keys.to_vec(), coords, values)?,
        missing_coords,
    })
}

/// Count how many records fall on the grid, off the key domain, or outside the range.
pub fn placement_stats(records: &[ObservationRecord], domain: &KeyDomain, range: DateRange) -> PlacementStats {
    let mut stats = PlacementStats::default();
    for r in records {
        if !domain.contains(r.key) {
            stats.unknown_key += 1;
        } else if !range.contains(r.date) {
            stats.out_of_range += 1;
        } else {
            stats.in_grid += 1;
        }
    }
    stats
}

fn ensure_unique_pairs(records: &[ObservationRecord]) -> Result<(), FillError> {
    let mut pairs: Vec<(LocationKey, NaiveDate)> = records.iter().map(|r| (r.key, r.date)).collect();
    pairs.sort_unstable();

    let mut first = None;
    let mut dup_pairs = 0usize;
    let mut i = 0usize;
    while i < pairs.len() {
        let run = pairs[i..].iter().take_while(|p| **p == pairs[i]).count();
        if run > 1 {
            dup_pairs += 1;
            first.get_or_insert(pairs[i]);
        }
        i += run;
    }

    match first {
        Some((key, date)) => Err(FillError::DuplicateKey {
            key,
            date,
            pairs: dup_pairs,
        }),
        None => Ok(()),
    }
}
