//! Completeness audit of a dense output.
//!
//! Read-only: the verifier looks at output rows and reports. It never
//! touches the grid. It works on plain rows (not on `DenseGrid`) so the same
//! checks apply to a freshly filled grid and to a dense CSV read back from disk.
//!
//! Rows are consumed as a stream. Duplicate detection keeps one bit per
//! in-range `(key, date)` cell, so auditing a grid costs far less memory than
//! the grid itself.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{DateRange, DenseRow, KeyDomain, LocationKey};

/// Coverage of one key in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCoverage {
    pub key: LocationKey,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub rows: usize,
    pub empty_values: usize,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub range: DateRange,
    pub expected_days: usize,
    pub domain_keys: usize,
    pub output_keys: usize,
    pub total_rows: usize,
    pub keys: Vec<KeyCoverage>,
    /// Keys whose first/last date or row count is off.
    pub incomplete_keys: Vec<LocationKey>,
    /// Domain keys with no row at all.
    pub missing_keys: Vec<LocationKey>,
    /// Output keys that are not in the domain.
    pub unexpected_keys: Vec<LocationKey>,
    /// Rows repeating a `(key, date)` already seen.
    pub duplicate_rows: usize,
    /// Whether rows are in ascending `(key, date)` order.
    pub sorted: bool,
    /// Empty cells per column: the value column, `lon` and `lat`.
    pub residual_nulls: BTreeMap<String, usize>,
    value_column: String,
}

impl CoverageReport {
    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn residual_value_nulls(&self) -> usize {
        self.residual_nulls.get(&self.value_column).copied().unwrap_or(0)
    }

    /// True when every domain key has exactly one non-empty value per date.
    pub fn is_complete(&self) -> bool {
        self.incomplete_keys.is_empty()
            && self.missing_keys.is_empty()
            && self.duplicate_rows == 0
            && self.residual_value_nulls() == 0
    }
}

/// Audit `rows` against the key domain and date range.
///
/// Accepts owned rows (e.g. `grid.rows()`) or borrowed ones (`&Vec<DenseRow>`).
pub fn verify_rows<I>(rows: I, domain: &KeyDomain, range: DateRange, value_column: &str) -> CoverageReport
where
    I: IntoIterator,
    I::Item: Borrow<DenseRow>,
{
    let expected_days = range.days();

    let mut per_key: BTreeMap<LocationKey, KeyCoverage> = BTreeMap::new();
    let mut seen = SeenCells::new(expected_days);
    let mut total_rows = 0usize;
    let mut duplicate_rows = 0usize;
    let mut sorted = true;
    let mut prev: Option<(LocationKey, NaiveDate)> = None;
    let mut null_values = 0usize;
    let mut null_lon = 0usize;
    let mut null_lat = 0usize;

    for row in rows {
        let row = row.borrow();
        total_rows += 1;

        let pair = (row.key, row.date);
        if prev.is_some_and(|p| p > pair) {
            sorted = false;
        }
        prev = Some(pair);

        if !seen.insert(row.key, row.date, range) {
            duplicate_rows += 1;
        }
        if row.value.is_none() {
            null_values += 1;
        }
        match row.coord {
            Some(c) => {
                null_lon += usize::from(!c.lon.is_finite());
                null_lat += usize::from(!c.lat.is_finite());
            }
            None => {
                null_lon += 1;
                null_lat += 1;
            }
        }

        let entry = per_key.entry(row.key).or_insert(KeyCoverage {
            key: row.key,
            first_date: row.date,
            last_date: row.date,
            rows: 0,
            empty_values: 0,
            complete: false,
        });
        entry.first_date = entry.first_date.min(row.date);
        entry.last_date = entry.last_date.max(row.date);
        entry.rows += 1;
        entry.empty_values += usize::from(row.value.is_none());
    }

    let mut incomplete_keys = Vec::new();
    for cov in per_key.values_mut() {
        cov.complete = cov.first_date == range.start && cov.last_date == range.end && cov.rows == expected_days;
        if !cov.complete {
            incomplete_keys.push(cov.key);
        }
    }

    let missing_keys: Vec<LocationKey> = domain
        .keys
        .iter()
        .copied()
        .filter(|k| !per_key.contains_key(k))
        .collect();
    let unexpected_keys: Vec<LocationKey> = per_key.keys().copied().filter(|k| !domain.contains(*k)).collect();

    let mut residual_nulls = BTreeMap::new();
    residual_nulls.insert(value_column.to_string(), null_values);
    residual_nulls.insert("lon".to_string(), null_lon);
    residual_nulls.insert("lat".to_string(), null_lat);

    CoverageReport {
        range,
        expected_days,
        domain_keys: domain.len(),
        output_keys: per_key.len(),
        total_rows,
        keys: per_key.into_values().collect(),
        incomplete_keys,
        missing_keys,
        unexpected_keys,
        duplicate_rows,
        sorted,
        residual_nulls,
        value_column: value_column.to_string(),
    }
}

/// `(key, date)` cells already seen: a day bitset per key, plus a set for
/// dates outside the range.
struct SeenCells {
    words_per_key: usize,
    in_range: BTreeMap<LocationKey, Vec<u64>>,
    out_of_range: HashSet<(LocationKey, NaiveDate)>,
}

impl SeenCells {
    fn new(days: usize) -> Self {
        Self {
            words_per_key: days.div_ceil(64),
            in_range: BTreeMap::new(),
            out_of_range: HashSet::new(),
        }
    }

    /// `false` when the cell was already present.
    fn insert(&mut self, key: LocationKey, date: NaiveDate, range: DateRange) -> bool {
        let Some(d) = range.index_of(date) else {
            return self.out_of_range.insert((key, date));
        };
        let n = self.words_per_key;
        let words = self.in_range.entry(key).or_insert_with(|| vec![0; n]);
        let (word, bit) = (d / 64, 1u64 << (d % 64));
        let fresh = (words[word] & bit) == 0;
        words[word] |= bit;
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coord;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 5, day).unwrap()
    }

    fn row(key: i64, day: u32, value: Option<f64>) -> DenseRow {
        DenseRow {
            key,
            date: d(day),
            value,
            coord: Some(Coord { lon: -80.0, lat: 30.0 }),
        }
    }

    fn full(keys: &[i64], days: u32) -> Vec<DenseRow> {
        keys.iter()
            .flat_map(|k| (1..=days).map(move |day| row(*k, day, Some(1.0))))
            .collect()
    }

    #[test]
    fn complete_output_passes() {
        let domain = KeyDomain::from_keys([1, 2]);
        let range = DateRange::new(d(1), d(3)).unwrap();
        let report = verify_rows(&full(&[1, 2], 3), &domain, range, "fmc");

        assert!(report.is_complete());
        assert!(report.sorted);
        assert_eq!(report.total_rows, 6);
        assert_eq!(report.residual_nulls["lon"], 0);
        assert!(report.keys.iter().all(|k| k.complete));
    }

    #[test]
    fn gaps_duplicates_and_missing_keys_are_reported() {
        let domain = KeyDomain::from_keys([1, 2, 3]);
        let range = DateRange::new(d(1), d(3)).unwrap();

        let mut rows = full(&[1, 2], 3);
        rows.remove(2); // key 1 loses its last day
        rows.push(row(2, 2, None)); // duplicate, empty
        rows.push(row(9, 1, Some(1.0)));

        let report = verify_rows(&rows, &domain, range, "fmc");
        assert!(!report.is_complete());
        assert_eq!(report.incomplete_keys, vec![1, 2, 9]);
        assert_eq!(report.missing_keys, vec![3]);
        assert_eq!(report.unexpected_keys, vec![9]);
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.residual_value_nulls(), 1);
        assert!(!report.sorted);
    }

    #[test]
    fn missing_coordinates_count_as_residual_nulls() {
        let domain = KeyDomain::from_keys([1]);
        let range = DateRange::new(d(1), d(2)).unwrap();
        let mut rows = full(&[1], 2);
        rows[0].coord = None;
        let report = verify_rows(&rows, &domain, range, "wind_speed");
        assert_eq!(report.residual_nulls["lat"], 1);
        assert_eq!(report.residual_nulls["wind_speed"], 0);
        assert!(report.is_complete());
    }

    #[test]
    fn streamed_grid_rows_match_collected_rows() {
        use crate::grid::DenseGrid;

        let range = DateRange::new(d(1), d(70)).unwrap();
        let mut values = vec![Some(2.0); 3 * 70];
        values[5] = None;
        values[139] = None;
        let coords = vec![Some(Coord { lon: -80.0, lat: 30.0 }), None, Some(Coord { lon: -81.0, lat: 31.0 })];
        let grid = DenseGrid::from_parts(range, vec![4, 6, 8], coords, values).unwrap();
        let domain = KeyDomain::from_keys([4, 5, 6, 8]);

        let collected: Vec<DenseRow> = grid.rows().collect();
        let from_slice = verify_rows(&collected, &domain, range, "fmc");
        let streamed = verify_rows(grid.rows(), &domain, range, "fmc");

        assert_eq!(streamed, from_slice);
        assert_eq!(streamed.total_rows, 210);
        assert_eq!(streamed.missing_keys, vec![5]);
        assert_eq!(streamed.residual_value_nulls(), 2);
        assert_eq!(streamed.duplicate_rows, 0);
    }

    #[test]
    fn duplicates_are_found_in_unsorted_input() {
        let domain = KeyDomain::from_keys([1, 2]);
        let range = DateRange::new(d(1), d(2)).unwrap();
        let rows = vec![
            row(2, 1, Some(1.0)),
            row(1, 2, Some(1.0)),
            row(2, 1, Some(1.0)),
            row(1, 1, Some(1.0)),
            row(2, 2, Some(1.0)),
            row(1, 2, Some(1.0)),
            row(1, 9, Some(1.0)),
            row(1, 9, Some(1.0)),
        ];
        let report = verify_rows(rows, &domain, range, "fmc");
        // Two in-range repeats and one repeat of a date past the range end.
        assert_eq!(report.duplicate_rows, 3);
        assert!(!report.sorted);
    }
}
