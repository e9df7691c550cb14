use super::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-date adjustment factors for one daily price row.
///
/// Field order matches the `factors` table, so the struct serializes
/// directly into the import artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentFactor {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub close: f64,
    pub pre_close: f64,
    pub qfq_factor: f64,
    pub hfq_factor: f64,
}
