//! Wire records for physical plans.
//!
//! These are the prost representations written to the plan log and exchanged with the
//! transport layer. Domain types are built from these in `crate::plan::codec`.

mod plan;

pub use plan::*;
