//! tdxsync runner: everything that touches the store.
//!
//! This crate builds on `tdxsync-core` to provide:
//! - `DuckStore`, the DuckDB implementation of the store contract
//! - The per-kind synchronizer (download, transcode, decode, import)
//! - The concurrent factor engine with a single artifact writer
//! - Table bootstrap and view establishment
//! - Full cycle orchestration

pub mod cycle;
pub mod duck;
pub mod engine;
pub mod sync;
pub mod views;

pub use cycle::{
    init_from_directory, recompute_factors, run_cycle, stage, Collaborators, CycleError,
    CycleReport,
};
pub use duck::DuckStore;
pub use engine::{EngineError, FactorEngine, FactorSummary, SymbolFault};
pub use sync::{DateOutcome, SyncError, SyncReport, SyncStatus, Synchronizer};
pub use views::{establish_views, ViewSetupError};
