//! Same-key nearest-value substitution along the date axis.
//!
//! For every empty cell the closest non-empty cell of the same key is
//! copied in. Leading and trailing gaps borrow the first/last known value.
//! When two known values are equally far away the earlier date wins.
//! A key with no known value at all is left untouched.

use rayon::prelude::*;

use crate::grid::DenseGrid;

/// Fill empty cells from the nearest known date of the same key.
pub fn interpolate_nearest(grid: &DenseGrid) -> DenseGrid {
    let mut values = grid.values().to_vec();
    let n = grid.n_days();
    if n > 0 {
        values.par_chunks_mut(n).for_each(fill_row_nearest);
    }
    grid.with_values(values)
}

fn fill_row_nearest(row: &mut [Option<f64>]) {
    let known: Vec<usize> = row
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();
    if known.is_empty() || known.len() == row.len() {
        return;
    }

    // Only empty cells are written, so `known` stays valid during the sweep.
    let mut next = 0usize;
    for i in 0..row.len() {
        if row[i].is_some() {
            continue;
        }
        while next < known.len() && known[next] < i {
            next += 1;
        }
        let before = next.checked_sub(1).map(|j| known[j]);
        let after = known.get(next).copied();

        let src = match (before, after) {
            (Some(b), Some(a)) => {
                if i - b <= a - i {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => continue,
        };
        row[i] = row[src];
    }
}
