//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - location keys, coordinates and sparse observations (`ObservationRecord`)
//! - run configuration enums (`FillPolicy`, `Aggregation`) and `RunConfig`
//! - the date axis (`DateRange`) and the key domain (`KeyDomain`)

pub mod types;

pub use types::*;
