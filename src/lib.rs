//! `daily-gapfill` library crate.
//!
//! Turns sparse per-location readings into a dense `(key, date)` daily grid.
//! The binary (`gapfill`) is a thin wrapper around this library so that:
//!
//! - the fill chain is testable without spawning processes
//! - each stage (temporal, spatial, daily mean) can be used on its own
//! - ingest and export stay separate from the grid algorithms

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fill;
pub mod grid;
pub mod io;
pub mod report;
pub mod verify;
