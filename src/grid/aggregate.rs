//! Collapse same-`(key, date)` observations so the grid sees one value per cell.

use serde::Serialize;
use tracing::info;

use crate::domain::{Aggregation, ObservationRecord};

/// What aggregation did to the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub input_records: usize,
    pub output_records: usize,
    /// Number of `(key, date)` pairs that had more than one record.
    pub duplicate_groups: usize,
    /// Records removed by collapsing duplicate groups.
    pub rows_collapsed: usize,
}

/// Aggregate records per `(key, date)`.
///
/// The output is sorted by `(key, date)`. Within a group the first record (in
/// input order) that carries coordinates supplies them. With
/// [`Aggregation::None`] duplicates are kept, sorted next to each other.
pub fn aggregate(records: &[ObservationRecord], how: Aggregation) -> (Vec<ObservationRecord>, AggregationStats) {
    let mut sorted = records.to_vec();
    // Stable: keeps input order inside each group.
    sorted.sort_by_key(|r| (r.key, r.date));

    let mut out = Vec::with_capacity(sorted.len());
    let mut duplicate_groups = 0usize;

    let mut start = 0usize;
    while start < sorted.len() {
        let head = &sorted[start];
        let end = start
            + sorted[start..]
                .iter()
                .take_while(|r| r.key == head.key && r.date == head.date)
                .count();
        let group = &sorted[start..end];
        if group.len() > 1 {
            duplicate_groups += 1;
        }

        match how {
            Aggregation::None => out.extend_from_slice(group),
            Aggregation::Mean | Aggregation::Sum => {
                let sum: f64 = group.iter().map(|r| r.value).sum();
                let value = if how == Aggregation::Mean {
                    sum / group.len() as f64
                } else {
                    sum
                };
                out.push(ObservationRecord {
                    key: head.key,
                    date: head.date,
                    value,
                    coord: group.iter().find_map(|r| r.coord),
                });
            }
        }

        start = end;
    }

    let stats = AggregationStats {
        input_records: records.len(),
        output_records: out.len(),
        duplicate_groups,
        rows_collapsed: records.len() - out.len(),
    };

    if duplicate_groups > 0 {
        info!(
            groups = duplicate_groups,
            collapsed = stats.rows_collapsed,
            how = ?how,
            "aggregated duplicate (key, date) observations"
        );
    }

    (out, stats)
}
