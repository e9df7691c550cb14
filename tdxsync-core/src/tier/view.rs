//! Store view definitions rendered from typed parts.

use super::resolve::Tier;
use crate::domain::action::{EX_RIGHTS_CATEGORY, SHARE_CHANGE_CATEGORIES};
use crate::domain::MinuteStream;
use crate::schema::{self, Ident, SchemaError, TableSchema};
use thiserror::Error;

pub const DAILY_VIEW: &str = "v_stocks_daily";
pub const XDXR_VIEW: &str = "v_xdxr";
pub const TURNOVER_VIEW: &str = "v_turnover";
pub const QFQ_VIEW: &str = "v_qfq_stocks";
pub const HFQ_VIEW: &str = "v_hfq_stocks";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("table '{0}' has no date or timestamp column to resolve on")]
    NoTimeColumn(String),
}

/// Which factor column an adjusted view multiplies by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorColumn {
    Qfq,
    Hfq,
}

impl FactorColumn {
    fn column(self) -> &'static str {
        match self {
            FactorColumn::Qfq => "qfq_factor",
            FactorColumn::Hfq => "hfq_factor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewBody {
    /// Archival, staging and finalized layers; one row per key, highest
    /// tier wins. `archive` is `None` when no archive files exist.
    TierUnion {
        table: TableSchema,
        archive: Option<Ident>,
    },
    /// Hive-partitioned Parquet files projected onto a table's columns.
    Parquet { table: TableSchema, glob: String },
    /// Category-1 corporate actions with named ratio columns.
    ExRights { gbbq: Ident },
    /// Daily volume over the float share count in force on each date.
    Turnover { daily: Ident, gbbq: Ident },
    /// Resolved daily prices scaled by a factor column.
    Adjusted {
        daily: Ident,
        factors: Ident,
        turnover: Ident,
        factor: FactorColumn,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: Ident,
    pub body: ViewBody,
}

impl ViewDefinition {
    pub fn tier_union(
        name: &str,
        table: TableSchema,
        archive: Option<Ident>,
    ) -> Result<Self, ViewError> {
        if table.time_column().is_none() {
            return Err(ViewError::NoTimeColumn(table.name().to_string()));
        }
        Ok(Self {
            name: Ident::new(name)?,
            body: ViewBody::TierUnion { table, archive },
        })
    }

    pub fn parquet(name: &str, table: TableSchema, glob: impl Into<String>) -> Result<Self, ViewError> {
        Ok(Self {
            name: Ident::new(name)?,
            body: ViewBody::Parquet {
                table,
                glob: glob.into(),
            },
        })
    }

    pub fn new(name: &str, body: ViewBody) -> Result<Self, ViewError> {
        if let ViewBody::TierUnion { table, .. } = &body {
            if table.time_column().is_none() {
                return Err(ViewError::NoTimeColumn(table.name().to_string()));
            }
        }
        Ok(Self {
            name: Ident::new(name)?,
            body,
        })
    }

    /// `CREATE OR REPLACE VIEW <name> AS <body>`
    pub fn to_sql(&self) -> String {
        format!("CREATE OR REPLACE VIEW {} AS {}", self.name, self.body_sql())
    }

    pub fn body_sql(&self) -> String {
        match &self.body {
            ViewBody::TierUnion { table, archive } => tier_union_sql(table, archive.as_ref()),
            ViewBody::Parquet { table, glob } => format!(
                "SELECT {} FROM read_parquet({}, hive_partitioning = true)",
                table.column_list(),
                quote_literal(glob)
            ),
            ViewBody::ExRights { gbbq } => format!(
                "SELECT code, date, c1 AS cash_dividend, c2 AS rights_price, \
                 c3 AS bonus_shares, c4 AS rights_shares \
                 FROM {gbbq} WHERE category = {EX_RIGHTS_CATEGORY}"
            ),
            ViewBody::Turnover { daily, gbbq } => format!(
                "SELECT d.symbol, d.date, d.volume, s.post_float AS float_shares, \
                 CASE WHEN s.post_float > 0 \
                 THEN d.volume / (s.post_float * 10000) * 100 END AS turnover \
                 FROM {daily} d \
                 ASOF LEFT JOIN (SELECT code, date, c3 AS post_float FROM {gbbq} \
                 WHERE category IN ({})) s \
                 ON substr(d.symbol, 3) = s.code AND d.date >= s.date",
                share_change_list()
            ),
            ViewBody::Adjusted {
                daily,
                factors,
                turnover,
                factor,
            } => {
                let f = factor.column();
                let prices = ["open", "high", "low", "close"]
                    .iter()
                    .map(|p| format!("ROUND(d.{p} * f.{f}, 2) AS {p}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "SELECT d.symbol, d.date, {prices}, d.amount, d.volume, t.turnover \
                     FROM {daily} d \
                     JOIN {factors} f ON d.symbol = f.symbol AND d.date = f.date \
                     LEFT JOIN {turnover} t ON d.symbol = t.symbol AND d.date = t.date"
                )
            }
        }
    }
}

fn tier_union_sql(table: &TableSchema, archive: Option<&Ident>) -> String {
    let cols = table.column_list();
    let staging = table.staging();
    let mut layers: Vec<(Tier, String)> = Vec::with_capacity(3);
    if let Some(view) = archive {
        layers.push((Tier::Archival, view.to_string()));
    }
    layers.push((Tier::Staging, staging.name().to_string()));
    layers.push((Tier::Finalized, table.name().to_string()));

    let union = layers
        .iter()
        .map(|(tier, source)| {
            format!("SELECT {cols}, {} AS _priority FROM {source}", tier.priority())
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    // time_column is checked when the definition is built
    let time = table
        .time_column()
        .map(|c| c.name.as_str())
        .unwrap_or("date");
    format!(
        "SELECT {cols} FROM ({union}) AS tiers \
         QUALIFY ROW_NUMBER() OVER (PARTITION BY symbol, {time} ORDER BY _priority DESC) = 1"
    )
}

fn share_change_list() -> String {
    SHARE_CHANGE_CATEGORIES
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// SQL string literal with embedded quotes doubled.
pub fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Every view the store serves, in dependency order.
///
/// `archives` names, per configured minute stream, the Parquet glob of its
/// archive when archive files exist.
pub fn catalog(
    archives: &[(MinuteStream, Option<String>)],
) -> Result<Vec<ViewDefinition>, ViewError> {
    let daily_view = Ident::new(DAILY_VIEW)?;
    let gbbq = schema::gbbq().name().clone();
    let turnover = Ident::new(TURNOVER_VIEW)?;
    let factors = schema::factors().name().clone();

    let mut views = vec![
        ViewDefinition::tier_union(DAILY_VIEW, schema::daily(), None)?,
        ViewDefinition::new(XDXR_VIEW, ViewBody::ExRights { gbbq: gbbq.clone() })?,
        ViewDefinition::new(
            TURNOVER_VIEW,
            ViewBody::Turnover {
                daily: daily_view.clone(),
                gbbq,
            },
        )?,
    ];
    for (name, factor) in [(QFQ_VIEW, FactorColumn::Qfq), (HFQ_VIEW, FactorColumn::Hfq)] {
        views.push(ViewDefinition::new(
            name,
            ViewBody::Adjusted {
                daily: daily_view.clone(),
                factors: factors.clone(),
                turnover: turnover.clone(),
                factor,
            },
        )?);
    }

    for (stream, glob) in archives {
        let table = schema::minute(*stream);
        let archive = match glob {
            Some(glob) => {
                let cold = ViewDefinition::parquet(stream.cold_view(), table.clone(), glob.as_str())?;
                let name = cold.name.clone();
                views.push(cold);
                Some(name)
            }
            None => None,
        };
        views.push(ViewDefinition::tier_union(stream.view(), table, archive)?);
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_union_without_archive_has_two_layers() {
        let v = ViewDefinition::tier_union(DAILY_VIEW, schema::daily(), None).unwrap();
        let sql = v.to_sql();
        assert!(sql.starts_with("CREATE OR REPLACE VIEW v_stocks_daily AS SELECT symbol,"));
        assert!(sql.contains("2 AS _priority FROM raw_stocks_daily_temp"));
        assert!(sql.contains("3 AS _priority FROM raw_stocks_daily"));
        assert!(!sql.contains("1 AS _priority"));
        assert!(sql.contains("PARTITION BY symbol, date ORDER BY _priority DESC"));
    }

    #[test]
    fn tier_union_with_archive_reads_cold_view() {
        let views = catalog(&[(
            MinuteStream::One,
            Some("/data/parquet_1/*/*.parquet".into()),
        )])
        .unwrap();
        let union = views
            .iter()
            .find(|v| v.name.as_str() == "v_stocks_1min")
            .unwrap();
        let sql = union.body_sql();
        assert!(sql.contains("1 AS _priority FROM v_cold_stocks_1min"));
        assert!(sql.contains("PARTITION BY symbol, datetime"));

        let cold_pos = views
            .iter()
            .position(|v| v.name.as_str() == "v_cold_stocks_1min")
            .unwrap();
        let union_pos = views
            .iter()
            .position(|v| v.name.as_str() == "v_stocks_1min")
            .unwrap();
        assert!(cold_pos < union_pos);
    }

    #[test]
    fn parquet_glob_is_quoted() {
        let v = ViewDefinition::parquet("v_cold", schema::minute(MinuteStream::Five), "/it's/*.parquet")
            .unwrap();
        assert!(v.body_sql().contains("read_parquet('/it''s/*.parquet'"));
    }

    #[test]
    fn tier_union_requires_time_column() {
        let t = TableSchema::new("t", &[("symbol", schema::ColumnType::Varchar)]).unwrap();
        assert!(matches!(
            ViewDefinition::tier_union("v", t, None),
            Err(ViewError::NoTimeColumn(_))
        ));
    }

    #[test]
    fn view_name_must_be_identifier() {
        assert!(ViewDefinition::new("v x", ViewBody::ExRights {
            gbbq: Ident::new("raw_gbbq").unwrap()
        })
        .is_err());
    }

    #[test]
    fn catalog_without_streams_has_daily_views() {
        let names: Vec<String> = catalog(&[])
            .unwrap()
            .into_iter()
            .map(|v| v.name.to_string())
            .collect();
        assert_eq!(
            names,
            vec![DAILY_VIEW, XDXR_VIEW, TURNOVER_VIEW, QFQ_VIEW, HFQ_VIEW]
        );
    }
}
