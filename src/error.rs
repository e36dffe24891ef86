use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::domain::LocationKey;

/// Fatal errors raised by the gap-filling library.
#[derive(Debug, Error)]
pub enum FillError {
    /// A required column is missing or a key/date cell cannot be parsed.
    #[error("schema error: {0}")]
    Schema(String),

    /// Un-aggregated `(key, date)` duplicates reached the grid materializer.
    #[error("duplicate (key, date) rows reached the grid: {pairs} pair(s), first at key {key} on {date}")]
    DuplicateKey {
        key: LocationKey,
        date: NaiveDate,
        pairs: usize,
    },

    #[error("invalid run configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FillError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Non-fatal conditions. Logged and accumulated into the coverage report.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillWarning {
    #[error("key {key} has no observations; coordinates left empty")]
    CoordinateMissing { key: LocationKey },

    #[error("{cells} cell(s) of `{column}` still empty after all fill stages")]
    ResidualMissing { column: String, cells: usize },
}

/// Application-level error carried out to `main` with a process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FillError> for AppError {
    fn from(err: FillError) -> Self {
        let exit_code = match &err {
            FillError::Schema(_) | FillError::Config(_) | FillError::Io { .. } => 2,
            FillError::DuplicateKey { .. } => 3,
            FillError::Csv(_) | FillError::Json(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_errors_map_to_exit_codes() {
        let schema: AppError = FillError::Schema("missing `date`".to_string()).into();
        assert_eq!(schema.exit_code(), 2);
        assert!(schema.to_string().contains("missing `date`"));

        let dup: AppError = FillError::DuplicateKey {
            key: 1001,
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            pairs: 3,
        }
        .into();
        assert_eq!(dup.exit_code(), 3);
        assert!(dup.to_string().contains("3 pair(s)"));
    }

    #[test]
    fn warnings_render_for_logs() {
        let w = FillWarning::ResidualMissing {
            column: "fmc".to_string(),
            cells: 4,
        };
        assert_eq!(w.to_string(), "4 cell(s) of `fmc` still empty after all fill stages");
    }
}
