//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fill code stays clean and testable
//! - output changes are localized

use crate::report::RunReport;
use crate::verify::CoverageReport;

/// How many keys to list inline before eliding.
const MAX_LISTED_KEYS: usize = 20;

/// Format the full run summary (inputs, stages, coverage).
pub fn format_run_summary(report: &RunReport) -> String {
    let config = &report.config;
    let mut out = String::new();

    out.push_str("=== gapfill - dense daily grid ===\n");
    out.push_str(&format!(
        "Signal: {} ({:?} policy)\n",
        config.value_column, config.policy
    ));
    out.push_str(&format!(
        "Range: {} .. {} ({} days)\n",
        config.range.start,
        config.range.end,
        config.range.days()
    ));
    out.push_str(&format!(
        "Input: rows={} records={} | dropped: blank key={} no value={}\n",
        report.ingest.rows_read,
        report.ingest.records,
        report.ingest.blank_keys,
        report.ingest.dropped_values,
    ));
    out.push_str(&format!(
        "Aggregation: {:?} | duplicate groups={} collapsed={}\n",
        config.aggregation, report.aggregation.duplicate_groups, report.aggregation.rows_collapsed,
    ));
    out.push_str(&format!(
        "Placement: on grid={} unknown key={} out of range={}\n",
        report.placement.in_grid, report.placement.unknown_key, report.placement.out_of_range,
    ));

    if !report.stages.is_empty() {
        out.push_str(&format!("\nFill stages (offset range ±{}):\n", config.offset_range));
        for s in &report.stages {
            out.push_str(&format!(
                "- {:<18} empty before={:>10} filled={:>10}\n",
                s.stage.display_name(),
                s.empty_before,
                s.filled
            ));
        }
    }

    if let Some(z) = &report.zero_fill {
        out.push_str(&format!(
            "\nZero fill: filled={} | zero={} ({:.2}%) non-zero={} ({:.2}%)\n",
            z.zero_filled, z.zero_cells, z.zero_pct, z.non_zero_cells, z.non_zero_pct
        ));
    }

    out.push('\n');
    out.push_str(&format_coverage(&report.coverage));

    if !report.warnings.is_empty() {
        out.push_str(&format!("\nWarnings: {}\n", report.warnings.len()));
        for w in report.warnings.iter().take(MAX_LISTED_KEYS) {
            out.push_str(&format!("- {w}\n"));
        }
        if report.warnings.len() > MAX_LISTED_KEYS {
            out.push_str(&format!("  ... and {} more\n", report.warnings.len() - MAX_LISTED_KEYS));
        }
    }

    out
}

/// Format the coverage audit.
pub fn format_coverage(coverage: &CoverageReport) -> String {
    let mut out = String::new();

    out.push_str("Coverage:\n");
    out.push_str(&format!(
        "- keys: domain={} output={} | days per key={} | rows={}\n",
        coverage.domain_keys, coverage.output_keys, coverage.expected_days, coverage.total_rows
    ));
    out.push_str(&format!(
        "- incomplete keys: {}{}\n",
        coverage.incomplete_keys.len(),
        fmt_keys(&coverage.incomplete_keys)
    ));
    out.push_str(&format!(
        "- missing keys: {}{}\n",
        coverage.missing_keys.len(),
        fmt_keys(&coverage.missing_keys)
    ));
    if !coverage.unexpected_keys.is_empty() {
        out.push_str(&format!(
            "- keys outside domain: {}{}\n",
            coverage.unexpected_keys.len(),
            fmt_keys(&coverage.unexpected_keys)
        ));
    }
    out.push_str(&format!("- duplicate rows: {}\n", coverage.duplicate_rows));
    if !coverage.sorted {
        out.push_str("- rows are not sorted by (key, date)\n");
    }
    for (column, n) in &coverage.residual_nulls {
        out.push_str(&format!("- empty `{column}`: {n}\n"));
    }
    out.push_str(&format!(
        "Status: {}\n",
        if coverage.is_complete() { "COMPLETE" } else { "INCOMPLETE" }
    ));

    out
}

fn fmt_keys(keys: &[i64]) -> String {
    if keys.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = keys.iter().take(MAX_LISTED_KEYS).map(i64::to_string).collect();
    let more = if keys.len() > MAX_LISTED_KEYS { ", ..." } else { "" };
    format!(" [{}{more}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DateRange, DenseRow, KeyDomain};
    use crate::verify::verify_rows;
    use chrono::NaiveDate;

    #[test]
    fn coverage_lists_missing_keys() {
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let range = DateRange::new(day, day).unwrap();
        let rows = vec![DenseRow {
            key: 1,
            date: day,
            value: Some(1.0),
            coord: None,
        }];
        let coverage = verify_rows(&rows, &KeyDomain::from_keys([1, 2]), range, "fmc");

        let text = format_coverage(&coverage);
        assert!(text.contains("- missing keys: 1 [2]"));
        assert!(text.contains("- empty `lat`: 1"));
        assert!(text.ends_with("Status: INCOMPLETE\n"));
    }

    #[test]
    fn long_key_lists_are_elided() {
        let keys: Vec<i64> = (0..25).collect();
        let s = fmt_keys(&keys);
        assert!(s.ends_with("19, ...]"));
    }
}
