//! Tier resolution: archival, staging and finalized layers merged into one
//! authoritative row per `(symbol, timestamp)`.
//!
//! The same rule exists twice: [`resolve`] works on rows in memory and
//! [`view`] renders it as store view definitions.

pub mod resolve;
pub mod view;

pub use resolve::{resolve, Tier, TierResolver};
pub use view::{catalog, FactorColumn, ViewBody, ViewDefinition, ViewError};
