//! Per-symbol qfq/hfq adjustment factors.
//!
//! `compute` is pure and single-symbol; fan-out across symbols lives in
//! the runner's factor engine.

pub mod compute;
pub mod index;

pub use compute::{compute_factors, FactorError};
pub use index::ActionIndex;
