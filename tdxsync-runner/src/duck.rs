//! DuckDB-backed [`Store`].
//!
//! Connections come from a fixed-size pool of clones of one database
//! handle, picked round-robin. Pool size is independent of the factor
//! worker count: workers only read, and the artifact is imported once.

use chrono::NaiveDate;
use duckdb::{params_from_iter, Connection};
use parking_lot::{Mutex, MutexGuard};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tdxsync_core::domain::{
    CorporateAction, DailyPoint, GbbqRecord, MinuteStream, PricePoint, Stamp, Symbol,
};
use tdxsync_core::schema::{self, Ident, TableSchema};
use tdxsync_core::store::{DateRange, ReplaceScope, Store, StoreError};
use tdxsync_core::tier::view::quote_literal;
use tdxsync_core::tier::ViewDefinition;
use tracing::{debug, info, warn};

pub struct DuckStore {
    pool: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

fn backend(operation: &'static str, target: impl Into<String>) -> impl FnOnce(duckdb::Error) -> StoreError {
    let target = target.into();
    move |e| StoreError::backend(operation, target, e)
}

impl DuckStore {
    /// Open (or create) a database file with `connections` pooled handles.
    pub fn open(path: &Path, connections: usize) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(backend("open", path.display().to_string()))?;
        Self::with_pool(conn, connections)
    }

    pub fn open_in_memory(connections: usize) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend("open", ":memory:"))?;
        Self::with_pool(conn, connections)
    }

    fn with_pool(first: Connection, connections: usize) -> Result<Self, StoreError> {
        let mut pool = Vec::with_capacity(connections.max(1));
        for _ in 1..connections.max(1) {
            let clone = first.try_clone().map_err(backend("clone connection", "pool"))?;
            pool.push(Mutex::new(clone));
        }
        pool.push(Mutex::new(first));
        debug!(connections = pool.len(), "store pool ready");
        Ok(Self {
            pool,
            next: AtomicUsize::new(0),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        self.pool[i].lock()
    }

    pub fn table_exists(&self, name: &Ident) -> Result<bool, StoreError> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                [name.as_str()],
                |row| row.get(0),
            )
            .map_err(backend("inspect", name.as_str()))?;
        Ok(count > 0)
    }

    /// Raw row count of a table or view, duplicates included.
    pub fn row_count(&self, relation: &Ident) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM {relation}"), [], |row| row.get(0))
            .map_err(backend("count", relation.as_str()))?;
        Ok(count as u64)
    }

    /// Rows of any price relation (table or view) for one symbol, ordered
    /// by stamp. Exact duplicate rows collapse.
    pub fn query_points<S: Stamp>(
        &self,
        relation: &Ident,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<Vec<PricePoint<S>>, StoreError> {
        let mut sql = format!(
            "SELECT DISTINCT symbol, open, high, low, close, amount, volume, \
             strftime({col}, {fmt}) AS stamp FROM {relation} WHERE symbol = ?",
            col = S::COLUMN,
            fmt = quote_literal(S::FORMAT),
        );
        let mut params = vec![symbol.to_string()];
        if let Some(start) = range.start {
            sql.push_str(&format!(" AND CAST({} AS DATE) >= CAST(? AS DATE)", S::COLUMN));
            params.push(start.to_string());
        }
        if let Some(end) = range.end {
            sql.push_str(&format!(" AND CAST({} AS DATE) <= CAST(? AS DATE)", S::COLUMN));
            params.push(end.to_string());
        }
        sql.push_str(" ORDER BY stamp");

        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(backend("query", relation.as_str()))?;
        let raw = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(backend("query", relation.as_str()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend("read rows", relation.as_str()))?;

        raw.into_iter()
            .map(|(open, high, low, close, amount, volume, stamp)| {
                let stamp = S::from_text(&stamp).ok_or_else(|| StoreError::MalformedRow {
                    table: relation.to_string(),
                    detail: format!("unparseable {} '{stamp}'", S::COLUMN),
                })?;
                Ok(PricePoint {
                    symbol: symbol.clone(),
                    stamp,
                    open,
                    high,
                    low,
                    close,
                    amount,
                    volume,
                })
            })
            .collect()
    }

    /// Move finalized minute rows before `before` into the year-partitioned
    /// Parquet archive under `dir`, then drop them from the raw table.
    /// Returns the number of rows archived.
    pub fn export_archive(
        &self,
        stream: MinuteStream,
        before: NaiveDate,
        dir: &Path,
    ) -> Result<u64, StoreError> {
        let table = schema::minute(stream);
        let time = table
            .time_column()
            .map(|c| c.name.to_string())
            .ok_or_else(|| StoreError::NoTimeColumn(table.name().to_string()))?;
        if !self.table_exists(table.name())? {
            return Ok(0);
        }
        let cutoff = format!("{time} < CAST({} AS TIMESTAMP)", quote_literal(&before.to_string()));

        let target = table.name().as_str();
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(backend("begin", target))?;
        let count: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM {target} WHERE {cutoff}"),
                [],
                |row| row.get(0),
            )
            .map_err(backend("count", target))?;
        if count == 0 {
            info!(%stream, %before, "nothing to archive");
            return Ok(0);
        }

        std::fs::create_dir_all(dir).map_err(|e| {
            StoreError::backend("create archive dir", dir.display().to_string(), e)
        })?;
        // Every run writes fresh files so earlier runs into the same year survive.
        let copy = format!(
            "COPY (SELECT {cols}, year({time}) AS year FROM {target} WHERE {cutoff}) \
             TO {dest} (FORMAT PARQUET, PARTITION_BY (year), \
             FILENAME_PATTERN 'data_{{uuid}}', OVERWRITE_OR_IGNORE true)",
            cols = table.column_list(),
            dest = quote_literal(&dir.to_string_lossy()),
        );
        tx.execute_batch(&copy).map_err(backend("export", target))?;
        tx.execute(&format!("DELETE FROM {target} WHERE {cutoff}"), [])
            .map_err(backend("delete archived", target))?;
        tx.commit().map_err(backend("commit", target))?;
        info!(%stream, %before, rows = count, dir = %dir.display(), "archived");
        Ok(count as u64)
    }
}

fn import_sql(schema: &TableSchema, csv: &Path) -> String {
    format!(
        "INSERT INTO {name} ({cols}) SELECT {cols} FROM read_csv({path}, header = true, \
         columns = {spec}, dateformat = '%Y-%m-%d', timestampformat = '%Y-%m-%d %H:%M:%S')",
        name = schema.name(),
        cols = schema.column_list(),
        path = quote_literal(&csv.to_string_lossy()),
        spec = schema.csv_columns(),
    )
}

impl Store for DuckStore {
    fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        self.conn()
            .execute_batch(&schema.create_sql())
            .map_err(backend("create table", schema.name().as_str()))
    }

    fn drop_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        self.conn()
            .execute_batch(&schema.drop_sql())
            .map_err(backend("drop table", schema.name().as_str()))
    }

    fn clear_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        self.conn()
            .execute_batch(&schema.clear_sql())
            .map_err(backend("clear table", schema.name().as_str()))
    }

    fn bulk_import(&self, schema: &TableSchema, csv: &Path) -> Result<u64, StoreError> {
        self.create_table(schema)?;
        let rows = self
            .conn()
            .execute(&import_sql(schema, csv), [])
            .map_err(backend("import", schema.name().as_str()))?;
        info!(table = %schema, rows, "imported");
        Ok(rows as u64)
    }

    fn replace_import(
        &self,
        schema: &TableSchema,
        scope: &ReplaceScope,
        csv: &Path,
    ) -> Result<u64, StoreError> {
        let target = schema.name().as_str();
        if matches!(scope, ReplaceScope::Symbols(_)) && !schema.has_column("symbol") {
            return Err(StoreError::NoSymbolColumn(target.to_string()));
        }
        self.create_table(schema)?;

        let mut conn = self.conn();
        let tx = conn.transaction().map_err(backend("begin", target))?;
        let deleted = match scope {
            ReplaceScope::All => tx.execute(&schema.clear_sql(), []),
            ReplaceScope::Symbols(symbols) if symbols.is_empty() => Ok(0),
            ReplaceScope::Symbols(symbols) => {
                let marks = vec!["?"; symbols.len()].join(", ");
                tx.execute(
                    &format!("{} WHERE symbol IN ({marks})", schema.clear_sql()),
                    params_from_iter(symbols.iter().map(Symbol::as_str)),
                )
            }
        }
        .map_err(backend("delete", target))?;
        let rows = tx
            .execute(&import_sql(schema, csv), [])
            .map_err(backend("import", target))?;
        tx.commit().map_err(backend("commit", target))?;
        info!(table = target, deleted, rows, "replaced");
        Ok(rows as u64)
    }

    fn create_or_replace_view(&self, view: &ViewDefinition) -> Result<(), StoreError> {
        debug!(view = %view.name, "establishing view");
        self.conn()
            .execute_batch(&view.to_sql())
            .map_err(backend("create view", view.name.as_str()))
    }

    fn latest_date(&self, schema: &TableSchema) -> Result<Option<NaiveDate>, StoreError> {
        let time = schema
            .time_column()
            .ok_or_else(|| StoreError::NoTimeColumn(schema.name().to_string()))?;
        if !self.table_exists(schema.name())? {
            return Ok(None);
        }
        let sql = format!(
            "SELECT strftime(MAX(CAST({} AS DATE)), '%Y-%m-%d') FROM {}",
            time.name,
            schema.name()
        );
        let latest: Option<String> = self
            .conn()
            .query_row(&sql, [], |row| row.get(0))
            .map_err(backend("latest date", schema.name().as_str()))?;
        latest
            .map(|text| {
                NaiveDate::from_text(&text).ok_or_else(|| StoreError::MalformedRow {
                    table: schema.name().to_string(),
                    detail: format!("unparseable date '{text}'"),
                })
            })
            .transpose()
    }

    fn query_price_points(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<Vec<DailyPoint>, StoreError> {
        self.query_points::<NaiveDate>(schema::daily().name(), symbol, range)
    }

    fn query_all_symbols(&self) -> Result<Vec<Symbol>, StoreError> {
        let daily = schema::daily();
        if !self.table_exists(daily.name())? {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT DISTINCT symbol FROM {} ORDER BY symbol", daily.name()))
            .map_err(backend("query", daily.name().as_str()))?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(backend("query", daily.name().as_str()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend("read rows", daily.name().as_str()))?;
        Ok(raw
            .into_iter()
            .filter_map(|s| match Symbol::parse(&s) {
                Ok(sym) => Some(sym),
                Err(e) => {
                    warn!(symbol = %s, error = %e, "skipping stored symbol");
                    None
                }
            })
            .collect())
    }

    fn query_all_corporate_actions(&self) -> Result<Vec<CorporateAction>, StoreError> {
        let gbbq = schema::gbbq();
        if !self.table_exists(gbbq.name())? {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT market, code, strftime(date, '%Y-%m-%d'), category, c1, c2, c3, c4 \
                 FROM {} ORDER BY code, date",
                gbbq.name()
            ))
            .map_err(backend("query", gbbq.name().as_str()))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    [
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, f64>(6)?,
                        row.get::<_, f64>(7)?,
                    ],
                ))
            })
            .map_err(backend("query", gbbq.name().as_str()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend("read rows", gbbq.name().as_str()))?;

        raw.into_iter()
            .map(|(market, code, date, category, c)| {
                let date = NaiveDate::from_text(&date).ok_or_else(|| StoreError::MalformedRow {
                    table: gbbq.name().to_string(),
                    detail: format!("unparseable date '{date}'"),
                })?;
                Ok(CorporateAction::from_record(&GbbqRecord {
                    market,
                    code,
                    date,
                    category,
                    c1: c[0],
                    c2: c[1],
                    c3: c[2],
                    c4: c[3],
                }))
            })
            .collect()
    }
}
