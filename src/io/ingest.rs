//! CSV ingest and normalization.
//!
//! This module turns the three CSV inputs into typed records:
//!
//! - the key domain (`load_key_domain`)
//! - sparse observations (`load_observations`)
//! - a dense output read back for auditing (`load_dense_rows`)
//!
//! Design goals:
//! - **Strict schema**: missing columns, non-numeric keys and bad dates are fatal
//! - **Row-level tolerance** for values: rows without a usable value are dropped and reported
//! - **No fill logic here**

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use chrono::{Days, NaiveDate};
use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{Coord, DenseRow, KeyDomain, LocationKey, ObservationRecord, RunConfig};
use crate::error::FillError;

/// Column layout of the observation file.
#[derive(Debug, Clone)]
pub struct ObservationSchema {
    pub key_column: String,
    pub value_column: String,
    /// Expand `[date, end_date]` spans into per-day records.
    pub spread_events: bool,
}

impl From<&RunConfig> for ObservationSchema {
    fn from(config: &RunConfig) -> Self {
        Self {
            key_column: config.key_column.clone(),
            value_column: config.value_column.clone(),
            spread_events: config.spread_events,
        }
    }
}

/// A dropped input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub line: usize,
    pub message: String,
}

/// Ingest output: records plus what was dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct IngestedObservations {
    pub records: Vec<ObservationRecord>,
    pub row_issues: Vec<RowIssue>,
    pub rows_read: usize,
    /// Rows dropped because the key cell was blank.
    pub blank_keys: usize,
}

/// Load the key domain: canonical integer keys, deduplicated and sorted.
///
/// Optional `lat`/`lon` columns are kept as reference coordinates (first row wins).
pub fn load_key_domain(path: &Path, key_column: &str) -> Result<KeyDomain, FillError> {
    let (headers, mut reader) = open_csv(path)?;
    let key_col = normalize_header_name(key_column);
    let header_map = build_header_map(&headers);
    let key_idx = require_column(&header_map, &key_col, path)?;

    let mut keys = Vec::new();
    let mut coords = BTreeMap::new();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result?;
        let raw = record.get(key_idx).map(str::trim).unwrap_or_default();
        let key = parse_key(raw)
            .map_err(|e| FillError::Schema(format!("{}:{line}: {e}", path.display())))?;
        keys.push(key);
        if let Some(c) = parse_coord(&record, &header_map) {
            coords.entry(key).or_insert(c);
        }
    }

    let mut domain = KeyDomain::from_keys(keys);
    if domain.is_empty() {
        return Err(FillError::Schema(format!("key domain '{}' has no keys", path.display())));
    }
    domain.coords = coords;

    info!(
        keys = domain.len(),
        duplicates_dropped = domain.duplicates_dropped,
        with_coords = domain.coords.len(),
        "loaded key domain"
    );
    Ok(domain)
}

/// Load sparse observations.
pub fn load_observations(path: &Path, schema: &ObservationSchema) -> Result<IngestedObservations, FillError> {
    let (headers, mut reader) = open_csv(path)?;
    let header_map = build_header_map(&headers);

    let key_idx = require_column(&header_map, &normalize_header_name(&schema.key_column), path)?;
    let date_idx = require_column(&header_map, "date", path)?;
    let value_idx = require_column(&header_map, &normalize_header_name(&schema.value_column), path)?;
    let end_idx = if schema.spread_events {
        Some(require_column(&header_map, "end_date", path)?)
    } else {
        None
    };

    let mut out = IngestedObservations::default();

    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines and the header row.
        let line = idx + 2;
        out.rows_read += 1;
        let record = result?;
        let schema_err = |msg: String| FillError::Schema(format!("{}:{line}: {msg}", path.display()));

        let raw_key = cell(&record, key_idx);
        if raw_key.is_empty() {
            out.blank_keys += 1;
            continue;
        }
        let key = parse_key(raw_key).map_err(schema_err)?;
        let date = parse_date(cell(&record, date_idx)).map_err(schema_err)?;

        let value = match parse_value(cell(&record, value_idx)) {
            Ok(v) => v,
            Err(message) => {
                out.row_issues.push(RowIssue { line, message });
                continue;
            }
        };
        let coord = parse_coord(&record, &header_map);

        match end_idx {
            None => out.records.push(ObservationRecord {
                key,
                date,
                value,
                coord,
            }),
            Some(end_idx) => {
                let raw_end = cell(&record, end_idx);
                let end = if raw_end.is_empty() {
                    date
                } else {
                    parse_date(raw_end).map_err(schema_err)?
                };
                let daily = spread_event(key, date, end, value, coord).map_err(schema_err)?;
                out.records.extend(daily);
            }
        }
    }

    if out.blank_keys > 0 {
        info!(rows = out.blank_keys, "dropped rows with a blank key");
    }
    if !out.row_issues.is_empty() {
        warn!(
            rows = out.row_issues.len(),
            first_line = out.row_issues[0].line,
            "dropped rows without a usable value"
        );
    }
    info!(
        rows_read = out.rows_read,
        records = out.records.len(),
        "loaded observations"
    );

    Ok(out)
}

/// Read a dense CSV written by the exporter.
pub fn load_dense_rows(path: &Path, key_column: &str, value_column: &str) -> Result<Vec<DenseRow>, FillError> {
    let (headers, mut reader) = open_csv(path)?;
    let header_map = build_header_map(&headers);

    let key_idx = require_column(&header_map, &normalize_header_name(key_column), path)?;
    let date_idx = require_column(&header_map, "date", path)?;
    let value_idx = require_column(&header_map, &normalize_header_name(value_column), path)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result?;
        let schema_err = |msg: String| FillError::Schema(format!("{}:{line}: {msg}", path.display()));

        rows.push(DenseRow {
            key: parse_key(cell(&record, key_idx)).map_err(schema_err)?,
            date: parse_date(cell(&record, date_idx)).map_err(schema_err)?,
            value: parse_value(cell(&record, value_idx)).ok(),
            coord: parse_coord(&record, &header_map),
        });
    }

    info!(rows = rows.len(), "loaded dense rows");
    Ok(rows)
}

/// Longest event span accepted by [`spread_event`], in days.
pub const MAX_EVENT_DAYS: u64 = 366;

/// Divide `value` evenly over the days of `[start, end]`.
///
/// Spans longer than [`MAX_EVENT_DAYS`] are rejected as a likely typo.
pub fn spread_event(
    key: LocationKey,
    start: NaiveDate,
    end: NaiveDate,
    value: f64,
    coord: Option<Coord>,
) -> Result<Vec<ObservationRecord>, String> {
    if end < start {
        return Err(format!("end_date {end} is before date {start}"));
    }
    let days = (end - start).num_days() as u64 + 1;
    if days > MAX_EVENT_DAYS {
        return Err(format!(
            "event from {start} to {end} spans {days} days (max {MAX_EVENT_DAYS})"
        ));
    }
    let daily = value / days as f64;
    Ok((0..days)
        .map(|i| ObservationRecord {
            key,
            date: start + Days::new(i),
            value: daily,
            coord,
        })
        .collect())
}

/// Canonical integer form of a key cell.
///
/// Accepts plain integers (leading zeros allowed) and integral floats such as
/// `1001.0`, which is how many tools re-export integer columns.
pub fn parse_key(s: &str) -> Result<LocationKey, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("missing key".to_string());
    }
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 => Ok(v as i64),
        _ => Err(format!("non-numeric key '{s}'")),
    }
}

/// Parse a calendar date, ignoring any time-of-day suffix.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

    let s = s.trim();
    let day_part = match s.find(['T', ' ']) {
        Some(pos) => &s[..pos],
        None => s,
    };
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(day_part, fmt) {
            return Ok(d);
        }
    }
    Err(format!("invalid date '{s}'. Expected YYYY-MM-DD or YYYY/MM/DD."))
}

fn parse_value(s: &str) -> Result<f64, String> {
    if s.is_empty() {
        return Err("missing value".to_string());
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("non-numeric value '{s}'")),
    }
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

fn parse_coord(record: &StringRecord, header_map: &HashMap<String, usize>) -> Option<Coord> {
    let lon = parse_opt_f64(get_optional(record, header_map, "lon"))?;
    let lat = parse_opt_f64(get_optional(record, header_map, "lat"))?;
    Some(Coord { lon, lat })
}

fn open_csv(path: &Path) -> Result<(StringRecord, csv::Reader<File>), FillError> {
    let file = File::open(path).map_err(|e| FillError::io(format!("failed to open '{}'", path.display()), e))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let headers = reader.headers()?.clone();
    Ok((headers, reader))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str, path: &Path) -> Result<usize, FillError> {
    header_map.get(name).copied().ok_or_else(|| {
        FillError::Schema(format!("missing required column `{name}` in '{}'", path.display()))
    })
}

fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or_default()
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}
