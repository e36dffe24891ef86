//! The dense key×date grid.
//!
//! Storage is key-major: the row of key `k` occupies
//! `values[k * n_days .. (k + 1) * n_days]`, ordered by date. Keys are
//! strictly ascending, so iterating the storage front to back yields cells
//! in `(key, date)` order.
//!
//! A grid is never edited in place by the fill stages. Each stage reads a
//! snapshot and returns a new grid via [`DenseGrid::with_values`].

use chrono::NaiveDate;

use crate::domain::{Coord, DateRange, DenseRow, LocationKey};
use crate::error::FillError;

#[derive(Debug, Clone, PartialEq)]
pub struct DenseGrid {
    range: DateRange,
    keys: Vec<LocationKey>,
    coords: Vec<Option<Coord>>,
    values: Vec<Option<f64>>,
}

impl DenseGrid {
    /// Assemble a grid from parts.
    ///
    /// `keys` must be strictly ascending; `coords` holds one entry per key and
    /// `values` holds `keys.len() * range.days()` cells.
    pub fn from_parts(
        range: DateRange,
        keys: Vec<LocationKey>,
        coords: Vec<Option<Coord>>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, FillError> {
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FillError::Schema(
                "grid keys must be strictly ascending".to_string(),
            ));
        }
        if coords.len() != keys.len() {
            return Err(FillError::Schema(format!(
                "grid has {} keys but {} coordinate entries",
                keys.len(),
                coords.len()
            )));
        }
        let expected = keys.len() * range.days();
        if values.len() != expected {
            return Err(FillError::Schema(format!(
                "grid expects {expected} cells, got {}",
                values.len()
            )));
        }
        Ok(Self {
            range,
            keys,
            coords,
            values,
        })
    }

    /// A copy of this grid's axes carrying a new set of cell values.
    ///
    /// Panics if `values` has a different length than the current storage.
    pub fn with_values(&self, values: Vec<Option<f64>>) -> Self {
        assert_eq!(values.len(), self.values.len(), "grid shape changed");
        Self {
            range: self.range,
            keys: self.keys.clone(),
            coords: self.coords.clone(),
            values,
        }
    }

    /// Concatenate key-chunk grids (in ascending key order) into one grid.
    pub fn concat(parts: Vec<DenseGrid>, range: DateRange) -> Result<Self, FillError> {
        let total_keys: usize = parts.iter().map(|p| p.keys.len()).sum();
        let mut keys = Vec::with_capacity(total_keys);
        let mut coords = Vec::with_capacity(total_keys);
        let mut values = Vec::with_capacity(total_keys * range.days());

        for part in parts {
            if part.range != range {
                return Err(FillError::Schema(
                    "cannot merge grid chunks with different date ranges".to_string(),
                ));
            }
            keys.extend(part.keys);
            coords.extend(part.coords);
            values.extend(part.values);
        }

        Self::from_parts(range, keys, coords, values)
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn keys(&self) -> &[LocationKey] {
        &self.keys
    }

    pub fn coords(&self) -> &[Option<Coord>] {
        &self.coords
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn n_days(&self) -> usize {
        self.range.days()
    }

    /// Total number of cells (`|keys| × |dates|`).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The date-ordered row of the key at position `idx`.
    pub fn row(&self, idx: usize) -> &[Option<f64>] {
        let n = self.n_days();
        &self.values[idx * n..(idx + 1) * n]
    }

    /// Look up one cell. `None` when the key or date is not on the grid.
    pub fn get(&self, key: LocationKey, date: NaiveDate) -> Option<Option<f64>> {
        let k = self.keys.binary_search(&key).ok()?;
        let d = self.range.index_of(date)?;
        Some(self.values[k * self.n_days() + d])
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Cells in `(key, date)` order.
    pub fn rows(&self) -> impl Iterator<Item = DenseRow> + '_ {
        let n = self.n_days();
        self.values.iter().enumerate().map(move |(i, value)| {
            let k = i / n;
            DenseRow {
                key: self.keys[k],
                date: self.range.date_at(i % n),
                value: *value,
                coord: self.coords[k],
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(days: u32) -> DateRange {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2020, 1, days).unwrap();
        DateRange::new(start, end).unwrap()
    }

    #[test]
    fn rows_come_out_in_key_then_date_order() {
        let grid = DenseGrid::from_parts(
            range(2),
            vec![7, 9],
            vec![None, Some(Coord { lon: -120.0, lat: 38.0 })],
            vec![Some(1.0), None, Some(3.0), Some(4.0)],
        )
        .unwrap();

        let rows: Vec<DenseRow> = grid.rows().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!((rows[1].key, rows[1].value), (7, None));
        assert_eq!(rows[2].key, 9);
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(rows[3].coord.map(|c| c.lat), Some(38.0));
        assert_eq!(grid.null_count(), 1);
        assert_eq!(grid.get(9, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()), Some(Some(4.0)));
        assert_eq!(grid.get(8, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()), None);
    }

    #[test]
    fn from_parts_rejects_bad_shapes() {
        assert!(DenseGrid::from_parts(range(2), vec![2, 1], vec![None, None], vec![None; 4]).is_err());
        assert!(DenseGrid::from_parts(range(2), vec![1, 2], vec![None, None], vec![None; 3]).is_err());
    }

    #[test]
    fn concat_preserves_chunk_order() {
        let a = DenseGrid::from_parts(range(2), vec![1], vec![None], vec![Some(1.0), Some(2.0)]).unwrap();
        let b = DenseGrid::from_parts(range(2), vec![5], vec![None], vec![None, Some(6.0)]).unwrap();
        let merged = DenseGrid::concat(vec![a, b], range(2)).unwrap();
        assert_eq!(merged.keys(), &[1, 5]);
        assert_eq!(merged.row(1), &[None, Some(6.0)]);
    }
}
