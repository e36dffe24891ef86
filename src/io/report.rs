//! Write the coverage report JSON.
//!
//! The report is the only audit trail of a run's non-fatal conditions, so it
//! is written pretty-printed for humans to diff.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::FillError;

/// Write any report value (`RunReport`, or a bare `CoverageReport` from `verify`).
pub fn write_report_json<T: Serialize>(path: &Path, report: &T) -> Result<(), FillError> {
    let file = File::create(path)
        .map_err(|e| FillError::io(format!("failed to create report JSON '{}'", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer
        .flush()
        .map_err(|e| FillError::io(format!("failed to flush report JSON '{}'", path.display()), e))?;
    Ok(())
}
