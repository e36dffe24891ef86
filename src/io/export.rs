//! Export the dense grid to CSV.
//!
//! Layout: `<key column>,date,<value column>,lon,lat`, one row per key per date,
//! sorted by `(key, date)`. Empty cells are written as blanks.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::FillError;
use crate::grid::DenseGrid;

/// Write the grid to a CSV file.
pub fn write_dense_csv(path: &Path, grid: &DenseGrid, key_column: &str, value_column: &str) -> Result<(), FillError> {
    let file = File::create(path)
        .map_err(|e| FillError::io(format!("failed to create output CSV '{}'", path.display()), e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    writer.write_record([key_column, "date", value_column, "lon", "lat"])?;

    for row in grid.rows() {
        let value = row.value.map(|v| v.to_string()).unwrap_or_default();
        let (lon, lat) = match row.coord {
            Some(c) => (c.lon.to_string(), c.lat.to_string()),
            None => (String::new(), String::new()),
        };
        writer.write_record([
            row.key.to_string(),
            row.date.format("%Y-%m-%d").to_string(),
            value,
            lon,
            lat,
        ])?;
    }

    writer
        .flush()
        .map_err(|e| FillError::io(format!("failed to flush output CSV '{}'", path.display()), e))?;
    Ok(())
}
