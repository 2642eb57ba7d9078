// crates/sp_algo/src/lib.rs
#![forbid(unsafe_code)]

//! Stochastic pairing primitives.
//!
//! - [`donor_pool`]: unconsumed secondary records bucketed by (group key, geography key)
//! - [`executor`]: one (round, geography level) pass pairing pending primaries with donors
//!
//! Neither module performs I/O; both are driven by `sp_pipeline`.

pub mod donor_pool;
pub mod executor;

pub use donor_pool::{BucketKey, DonorPool, DonorState};
pub use executor::{run_pass, PassOutcome, PassSpec};
