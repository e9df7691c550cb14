//! tdxsync core: domain types, gap planning, adjustment factors, tier resolution.
//!
//! This crate holds everything that does not need a live database:
//! - Domain types (symbols, price points, corporate actions, factors)
//! - Date gap planning for incremental syncs
//! - Per-symbol qfq/hfq factor computation
//! - Tier resolution, both in memory and as typed store view definitions
//! - Table schemas and the `Store` contract
//! - Collaborators: HTTP download, zip extraction, vendor file decoding,
//!   external transcoding
//! - Sync configuration

pub mod adjust;
pub mod config;
pub mod data;
pub mod domain;
pub mod planner;
pub mod schema;
pub mod store;
pub mod tier;

pub use config::{ConfigError, SyncConfig};
pub use domain::{
    AdjustmentFactor, CorporateAction, DailyPoint, DataKind, MinutePoint, MinuteStream,
    PricePoint, Symbol,
};
pub use store::{DateRange, ReplaceScope, Store, StoreError};
