//! Gap filling.
//!
//! Responsibilities:
//!
//! - same-key nearest-date substitution (`temporal`)
//! - shifted-key neighbor lookup (`spatial`)
//! - cross-key daily mean (`global_mean`)
//! - stage ordering, chunking and per-stage accounting (`chain`)

pub mod chain;
pub mod global_mean;
pub mod spatial;
pub mod temporal;

pub use chain::*;
pub use global_mean::*;
pub use spatial::*;
pub use temporal::*;
