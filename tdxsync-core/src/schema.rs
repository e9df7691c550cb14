//! Typed table schemas.
//!
//! Every identifier that reaches generated SQL passes through [`Ident`],
//! which only admits `[A-Za-z_][A-Za-z0-9_]*`. Table and view SQL is
//! rendered from these types; nothing concatenates caller strings into
//! statements.

use crate::domain::MinuteStream;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid identifier '{0}'")]
    InvalidIdent(String),

    #[error("table '{0}' has no columns")]
    NoColumns(String),

    #[error("table '{table}' declares column '{column}' twice")]
    DuplicateColumn { table: String, column: String },
}

/// A validated SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    pub fn new(raw: &str) -> Result<Self, SchemaError> {
        if is_valid_ident(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(SchemaError::InvalidIdent(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier with a suffix appended; the result stays valid.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, SchemaError> {
        Self::new(&format!("{}{suffix}", self.0))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_ident(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Varchar,
    Double,
    BigInt,
    Integer,
    Date,
    Timestamp,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Double => "DOUBLE",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Timestamp)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: Ident,
    pub ty: ColumnType,
}

/// A table definition, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: Ident,
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(name: &str, columns: &[(&str, ColumnType)]) -> Result<Self, SchemaError> {
        let name = Ident::new(name)?;
        if columns.is_empty() {
            return Err(SchemaError::NoColumns(name.0));
        }
        let mut built: Vec<Column> = Vec::with_capacity(columns.len());
        for (col, ty) in columns {
            let col = Ident::new(col)?;
            if built.iter().any(|c| c.name == col) {
                return Err(SchemaError::DuplicateColumn {
                    table: name.0,
                    column: col.0,
                });
            }
            built.push(Column { name: col, ty: *ty });
        }
        Ok(Self {
            name,
            columns: built,
        })
    }

    pub fn name(&self) -> &Ident {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The same-shape staging table, `<name>_temp`.
    pub fn staging(&self) -> Self {
        Self {
            name: Ident(format!("{}_temp", self.name.0)),
            columns: self.columns.clone(),
        }
    }

    /// The first date or timestamp column, used for latest-date queries
    /// and tier resolution keys.
    pub fn time_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.ty.is_temporal())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.as_str() == name)
    }

    /// `a, b, c`
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_sql(&self) -> String {
        let cols = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.ty))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({cols})", self.name)
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }

    pub fn clear_sql(&self) -> String {
        format!("DELETE FROM {}", self.name)
    }

    /// Column spec for DuckDB's `read_csv(columns = {...})`.
    pub fn csv_columns(&self) -> String {
        let cols = self
            .columns
            .iter()
            .map(|c| format!("'{}': '{}'", c.name, c.ty))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{cols}}}")
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

// Built-in tables. Names and columns are fixed literals, so construction
// goes through a path that cannot fail.

fn fixed(name: &'static str, columns: &[(&'static str, ColumnType)]) -> TableSchema {
    debug_assert!(is_valid_ident(name));
    TableSchema {
        name: Ident(name.to_string()),
        columns: columns
            .iter()
            .map(|(n, ty)| {
                debug_assert!(is_valid_ident(n));
                Column {
                    name: Ident(n.to_string()),
                    ty: *ty,
                }
            })
            .collect(),
    }
}

fn price_columns(time: (&'static str, ColumnType)) -> [(&'static str, ColumnType); 8] {
    use ColumnType::*;
    [
        ("symbol", Varchar),
        ("open", Double),
        ("high", Double),
        ("low", Double),
        ("close", Double),
        ("amount", Double),
        ("volume", BigInt),
        time,
    ]
}

pub const DAILY_TABLE: &str = "raw_stocks_daily";
pub const FACTORS_TABLE: &str = "factors";
pub const GBBQ_TABLE: &str = "raw_gbbq";

/// Finalized daily bars.
pub fn daily() -> TableSchema {
    fixed(DAILY_TABLE, &price_columns(("date", ColumnType::Date)))
}

/// Finalized bars for one minute stream.
pub fn minute(stream: MinuteStream) -> TableSchema {
    fixed(
        stream.table(),
        &price_columns(("datetime", ColumnType::Timestamp)),
    )
}

pub fn factors() -> TableSchema {
    use ColumnType::*;
    fixed(
        FACTORS_TABLE,
        &[
            ("symbol", Varchar),
            ("date", Date),
            ("close", Double),
            ("pre_close", Double),
            ("qfq_factor", Double),
            ("hfq_factor", Double),
        ],
    )
}

/// Corporate-action snapshot, replaced wholesale on import.
pub fn gbbq() -> TableSchema {
    use ColumnType::*;
    fixed(
        GBBQ_TABLE,
        &[
            ("market", Integer),
            ("code", Varchar),
            ("date", Date),
            ("category", Integer),
            ("c1", Double),
            ("c2", Double),
            ("c3", Double),
            ("c4", Double),
        ],
    )
}

/// Every price table with a staging counterpart.
pub fn price_tables() -> Vec<TableSchema> {
    let mut tables = vec![daily()];
    tables.extend(MinuteStream::ALL.into_iter().map(minute));
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_rejects_injection() {
        assert!(Ident::new("raw_stocks_daily").is_ok());
        assert!(Ident::new("_x1").is_ok());
        assert!(Ident::new("1abc").is_err());
        assert!(Ident::new("t; DROP TABLE x").is_err());
        assert!(Ident::new("").is_err());
    }

    #[test]
    fn new_rejects_duplicate_and_empty() {
        assert!(matches!(
            TableSchema::new("t", &[]),
            Err(SchemaError::NoColumns(_))
        ));
        assert!(matches!(
            TableSchema::new("t", &[("a", ColumnType::Double), ("a", ColumnType::Date)]),
            Err(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn builtins_render_expected_sql() {
        let daily = daily();
        assert_eq!(daily.time_column().unwrap().name.as_str(), "date");
        assert_eq!(daily.staging().name().as_str(), "raw_stocks_daily_temp");
        assert_eq!(
            daily.create_sql(),
            "CREATE TABLE IF NOT EXISTS raw_stocks_daily (symbol VARCHAR, open DOUBLE, \
             high DOUBLE, low DOUBLE, close DOUBLE, amount DOUBLE, volume BIGINT, date DATE)"
        );
        assert_eq!(
            minute(MinuteStream::Five).time_column().unwrap().ty,
            ColumnType::Timestamp
        );
        assert!(gbbq().csv_columns().starts_with("{'market': 'INTEGER', 'code': 'VARCHAR'"));
    }

    #[test]
    fn builtins_pass_validation() {
        for t in price_tables().into_iter().chain([factors(), gbbq()]) {
            let cols: Vec<(&str, ColumnType)> =
                t.columns().iter().map(|c| (c.name.as_str(), c.ty)).collect();
            assert_eq!(TableSchema::new(t.name().as_str(), &cols).unwrap(), t);
        }
    }
}
