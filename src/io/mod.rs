//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - dense grid CSV export (`export`)
//! - coverage report JSON (`report`)

pub mod export;
pub mod ingest;
pub mod report;

pub use export::*;
pub use ingest::*;
pub use report::*;
