//! Last-resort fallback: the cross-key mean for that date.

use rayon::prelude::*;

use crate::grid::DenseGrid;

/// Mean of the non-empty cells of every date, across all keys.
///
/// `None` for dates where every key is empty.
pub fn daily_means(grid: &DenseGrid) -> Vec<Option<f64>> {
    let n = grid.n_days();
    if n == 0 {
        return Vec::new();
    }

    let (sums, counts) = grid
        .values()
        .par_chunks(n)
        .fold(
            || (vec![0.0_f64; n], vec![0usize; n]),
            |(mut sums, mut counts), row| {
                for (d, v) in row.iter().enumerate() {
                    if let Some(v) = v {
                        sums[d] += v;
                        counts[d] += 1;
                    }
                }
                (sums, counts)
            },
        )
        .reduce(
            || (vec![0.0_f64; n], vec![0usize; n]),
            |(mut sa, mut ca), (sb, cb)| {
                for d in 0..n {
                    sa[d] += sb[d];
                    ca[d] += cb[d];
                }
                (sa, ca)
            },
        );

    sums.into_iter()
        .zip(counts)
        .map(|(s, c)| (c > 0).then(|| s / c as f64))
        .collect()
}

/// Fill empty cells with the cross-key mean of their date.
///
/// Means are computed from the grid as it stands when this stage starts.
/// A date with no known value anywhere stays empty.
pub fn fill_with_daily_mean(grid: &DenseGrid) -> DenseGrid {
    let means = daily_means(grid);
    let mut values = grid.values().to_vec();
    let n = grid.n_days();
    if n > 0 {
        values.par_chunks_mut(n).for_each(|row| {
            for (cell, mean) in row.iter_mut().zip(&means) {
                if cell.is_none() {
                    *cell = *mean;
                }
            }
        });
    }
    grid.with_values(values)
}
