//! The analytical store contract.
//!
//! Implementations persist rows, import CSV artifacts and maintain views.
//! The DuckDB implementation lives in the runner crate; tests use an
//! in-memory fake.

use crate::domain::{CorporateAction, DailyPoint, Symbol};
use crate::schema::TableSchema;
use crate::tier::ViewDefinition;
use chrono::NaiveDate;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store {operation} failed on '{target}': {source}")]
    Backend {
        operation: &'static str,
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("table '{0}' has no date or timestamp column")]
    NoTimeColumn(String),

    #[error("table '{0}' has no symbol column to scope a replacement by")]
    NoSymbolColumn(String),

    #[error("malformed row in '{table}': {detail}")]
    MalformedRow { table: String, detail: String },
}

impl StoreError {
    pub fn backend(
        operation: &'static str,
        target: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Backend {
            operation,
            target: target.into(),
            source: Box::new(source),
        }
    }
}

/// Inclusive date bounds; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Which existing rows a replacing import deletes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceScope {
    All,
    Symbols(Vec<Symbol>),
}

pub trait Store: Send + Sync {
    fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError>;

    fn drop_table(&self, schema: &TableSchema) -> Result<(), StoreError>;

    /// Delete every row, keeping the table.
    fn clear_table(&self, schema: &TableSchema) -> Result<(), StoreError>;

    /// Append every row of a CSV artifact (header row, table column order).
    /// Returns the number of rows imported.
    fn bulk_import(&self, schema: &TableSchema, csv: &Path) -> Result<u64, StoreError>;

    /// Delete rows in `scope`, then import the artifact, atomically.
    fn replace_import(
        &self,
        schema: &TableSchema,
        scope: &ReplaceScope,
        csv: &Path,
    ) -> Result<u64, StoreError>;

    fn create_or_replace_view(&self, view: &ViewDefinition) -> Result<(), StoreError>;

    /// Most recent date in the table's time column; `None` when empty or
    /// missing.
    fn latest_date(&self, schema: &TableSchema) -> Result<Option<NaiveDate>, StoreError>;

    /// Finalized daily rows for one symbol, ascending by date.
    fn query_price_points(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<Vec<DailyPoint>, StoreError>;

    /// Distinct symbols with finalized daily rows, sorted.
    fn query_all_symbols(&self) -> Result<Vec<Symbol>, StoreError>;

    fn query_all_corporate_actions(&self) -> Result<Vec<CorporateAction>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_bounds_are_inclusive() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let r = DateRange::between(a, b);
        assert!(r.contains(a));
        assert!(r.contains(b));
        assert!(!r.contains(b.succ_opt().unwrap()));
        assert!(DateRange::all().contains(a));
    }
}
