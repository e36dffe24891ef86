//! Dense grid construction.
//!
//! - duplicate aggregation ahead of the merge (`aggregate`)
//! - the key-major grid container (`dense`)
//! - key×date cross product + left merge (`materialize`)

pub mod aggregate;
pub mod dense;
pub mod materialize;

pub use aggregate::*;
pub use dense::*;
pub use materialize::*;
