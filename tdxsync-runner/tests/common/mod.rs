//! Shared fakes for runner integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tdxsync_core::config::SyncConfig;
use tdxsync_core::data::{
    DecodeError, DecodeRequest, Decoder, DownloadError, Downloader, TranscodeError,
    TranscodeKind, Transcoder,
};
use tdxsync_core::domain::{CorporateAction, DailyPoint, GbbqRecord, Stamp, Symbol};
use tdxsync_core::schema::TableSchema;
use tdxsync_core::store::{DateRange, ReplaceScope, Store, StoreError};
use tdxsync_core::tier::ViewDefinition;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn config(data_dir: &Path, today: NaiveDate) -> SyncConfig {
    SyncConfig {
        data_dir: data_dir.to_path_buf(),
        database: Some(data_dir.join("test.duckdb")),
        max_concurrency: 4,
        store_connections: 2,
        today: Some(today),
        ..SyncConfig::default()
    }
}

pub fn daily_csv(rows: &[(&str, NaiveDate, f64)]) -> String {
    let mut out = String::from("symbol,open,high,low,close,amount,volume,date\n");
    for (sym, date, close) in rows {
        out.push_str(&format!("{sym},{close},{close},{close},{close},1000,100,{date}\n"));
    }
    out
}

pub fn minute_csv(rows: &[(&str, &str, f64)]) -> String {
    let mut out = String::from("symbol,open,high,low,close,amount,volume,datetime\n");
    for (sym, ts, close) in rows {
        out.push_str(&format!("{sym},{close},{close},{close},{close},1000,100,{ts}\n"));
    }
    out
}

pub fn gbbq_csv(rows: &[(&str, NaiveDate, i32, [f64; 4])]) -> String {
    let mut out = String::from("market,code,date,category,c1,c2,c3,c4\n");
    for (code, date, cat, c) in rows {
        out.push_str(&format!(
            "1,{code},{date},{cat},{},{},{},{}\n",
            c[0], c[1], c[2], c[3]
        ));
    }
    out
}

// ── MemoryStore ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Store fake keeping every table as string rows.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Table>>,
    views: Mutex<Vec<String>>,
}

fn fail(operation: &'static str, target: &str, msg: String) -> StoreError {
    StoreError::backend(operation, target, std::io::Error::other(msg))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, |t| t.rows.len())
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn views(&self) -> Vec<String> {
        self.views.lock().clone()
    }

    pub fn load_csv(&self, schema: &TableSchema, text: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("load.csv");
        fs::write(&path, text).unwrap();
        self.bulk_import(schema, &path).unwrap();
    }

    fn read_csv(schema: &TableSchema, path: &Path) -> Result<Vec<Vec<String>>, StoreError> {
        let target = schema.name().as_str();
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| fail("import", target, e.to_string()))?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| fail("import", target, e.to_string()))?;
            if record.len() != schema.columns().len() {
                return Err(fail("import", target, format!("width {}", record.len())));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }
}

impl Store for MemoryStore {
    fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        self.tables
            .lock()
            .entry(schema.name().to_string())
            .or_insert_with(|| Table {
                columns: schema.columns().iter().map(|c| c.name.to_string()).collect(),
                rows: Vec::new(),
            });
        Ok(())
    }

    fn drop_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        self.tables.lock().remove(schema.name().as_str());
        Ok(())
    }

    fn clear_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        if let Some(t) = self.tables.lock().get_mut(schema.name().as_str()) {
            t.rows.clear();
        }
        Ok(())
    }

    fn bulk_import(&self, schema: &TableSchema, csv: &Path) -> Result<u64, StoreError> {
        let rows = Self::read_csv(schema, csv)?;
        self.create_table(schema)?;
        let n = rows.len() as u64;
        if let Some(t) = self.tables.lock().get_mut(schema.name().as_str()) {
            t.rows.extend(rows);
        }
        Ok(n)
    }

    fn replace_import(
        &self,
        schema: &TableSchema,
        scope: &ReplaceScope,
        csv: &Path,
    ) -> Result<u64, StoreError> {
        let rows = Self::read_csv(schema, csv)?;
        self.create_table(schema)?;
        let mut tables = self.tables.lock();
        let table = tables
            .get_mut(schema.name().as_str())
            .ok_or_else(|| fail("replace", schema.name().as_str(), "missing".into()))?;
        match scope {
            ReplaceScope::All => table.rows.clear(),
            ReplaceScope::Symbols(list) => {
                let col = table
                    .columns
                    .iter()
                    .position(|c| c == "symbol")
                    .ok_or_else(|| StoreError::NoSymbolColumn(schema.name().to_string()))?;
                table
                    .rows
                    .retain(|r| !list.iter().any(|s| s.as_str() == r[col]));
            }
        }
        let n = rows.len() as u64;
        table.rows.extend(rows);
        Ok(n)
    }

    fn create_or_replace_view(&self, view: &ViewDefinition) -> Result<(), StoreError> {
        let mut views = self.views.lock();
        let name = view.name.to_string();
        if !views.contains(&name) {
            views.push(name);
        }
        Ok(())
    }

    fn latest_date(&self, schema: &TableSchema) -> Result<Option<NaiveDate>, StoreError> {
        let time = schema
            .time_column()
            .ok_or_else(|| StoreError::NoTimeColumn(schema.name().to_string()))?;
        let tables = self.tables.lock();
        let Some(table) = tables.get(schema.name().as_str()) else {
            return Ok(None);
        };
        let col = table
            .columns
            .iter()
            .position(|c| c == time.name.as_str())
            .unwrap_or(0);
        Ok(table
            .rows
            .iter()
            .filter_map(|r| r[col].get(..10).and_then(NaiveDate::from_text))
            .max())
    }

    fn query_price_points(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<Vec<DailyPoint>, StoreError> {
        let rows = self.rows("raw_stocks_daily");
        let mut points: Vec<DailyPoint> = rows
            .iter()
            .filter(|r| r[0] == symbol.as_str())
            .map(|r| DailyPoint {
                symbol: symbol.clone(),
                stamp: NaiveDate::from_text(&r[7]).unwrap(),
                open: r[1].parse().unwrap(),
                high: r[2].parse().unwrap(),
                low: r[3].parse().unwrap(),
                close: r[4].parse().unwrap(),
                amount: r[5].parse().unwrap(),
                volume: r[6].parse().unwrap(),
            })
            .filter(|p| range.contains(p.stamp))
            .collect();
        points.sort_by(|a, b| a.stamp.cmp(&b.stamp));
        points.dedup();
        Ok(points)
    }

    fn query_all_symbols(&self) -> Result<Vec<Symbol>, StoreError> {
        let mut symbols: Vec<Symbol> = self
            .rows("raw_stocks_daily")
            .iter()
            .filter_map(|r| Symbol::parse(&r[0]).ok())
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn query_all_corporate_actions(&self) -> Result<Vec<CorporateAction>, StoreError> {
        Ok(self
            .rows("raw_gbbq")
            .iter()
            .map(|r| {
                CorporateAction::from_record(&GbbqRecord {
                    market: r[0].parse().unwrap(),
                    code: r[1].clone(),
                    date: NaiveDate::from_text(&r[2]).unwrap(),
                    category: r[3].parse().unwrap(),
                    c1: r[4].parse().unwrap(),
                    c2: r[5].parse().unwrap(),
                    c3: r[6].parse().unwrap(),
                    c4: r[7].parse().unwrap(),
                })
            })
            .collect())
    }
}

// ── Scripted collaborators ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16),
    TransportError,
    /// 200, but the archive fails to extract.
    Corrupt,
}

/// Downloader answering from a URL → reply script. Unscripted URLs 404.
#[derive(Default)]
pub struct ScriptedDownloader {
    replies: HashMap<String, Reply>,
    pub fetched: Mutex<Vec<String>>,
}

impl ScriptedDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, url: impl Into<String>, reply: Reply) -> Self {
        self.replies.insert(url.into(), reply);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

impl Downloader for ScriptedDownloader {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u16, DownloadError> {
        self.fetched.lock().push(url.to_string());
        match self.replies.get(url).cloned().unwrap_or(Reply::Status(404)) {
            Reply::Status(200) => {
                fs::write(dest, b"ok").map_err(|source| DownloadError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;
                Ok(200)
            }
            Reply::Corrupt => {
                fs::write(dest, b"corrupt").map_err(|source| DownloadError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;
                Ok(200)
            }
            Reply::Status(code) => Ok(code),
            Reply::TransportError => Err(DownloadError::Transport {
                url: url.to_string(),
                source: "connection reset".into(),
            }),
        }
    }

    fn extract(&self, archive: &Path, _dest_dir: &Path) -> Result<(), DownloadError> {
        let body = fs::read(archive).map_err(|source| DownloadError::Io {
            path: archive.to_path_buf(),
            source,
        })?;
        if body == b"corrupt" {
            return Err(DownloadError::Io {
                path: archive.to_path_buf(),
                source: std::io::Error::other("bad zip"),
            });
        }
        Ok(())
    }
}

/// Decoder writing canned CSV text per file suffix.
#[derive(Default)]
pub struct CannedDecoder {
    outputs: HashMap<String, String>,
    gbbq: Option<String>,
    fail: bool,
    pub requests: Mutex<Vec<(String, Option<NaiveDate>)>>,
}

impl CannedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, suffix: &str, csv: String) -> Self {
        self.outputs.insert(suffix.to_string(), csv);
        self
    }

    pub fn with_gbbq(mut self, csv: String) -> Self {
        self.gbbq = Some(csv);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl Decoder for CannedDecoder {
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<u64, DecodeError> {
        self.requests
            .lock()
            .push((request.suffix.to_string(), request.since));
        if self.fail {
            return Err(DecodeError::UnsupportedSuffix(request.suffix.to_string()));
        }
        let text = self
            .outputs
            .get(request.suffix)
            .cloned()
            .unwrap_or_default();
        fs::write(request.output, &text).map_err(|source| DecodeError::Io {
            path: request.output.to_path_buf(),
            source,
        })?;
        Ok(text.lines().count().saturating_sub(1) as u64)
    }

    fn decode_corporate_actions(
        &self,
        source: &Path,
        output: &Path,
    ) -> Result<PathBuf, DecodeError> {
        match (&self.gbbq, self.fail) {
            (Some(text), false) => {
                fs::write(output, text).map_err(|source| DecodeError::Io {
                    path: output.to_path_buf(),
                    source,
                })?;
                Ok(output.to_path_buf())
            }
            _ => Err(DecodeError::MissingSource(source.to_path_buf())),
        }
    }
}

/// Transcoder recording its calls; optionally failing.
#[derive(Default)]
pub struct RecordingTranscoder {
    pub fail: bool,
    pub calls: Mutex<Vec<(TranscodeKind, NaiveDate)>>,
}

impl RecordingTranscoder {
    pub fn calls(&self) -> Vec<(TranscodeKind, NaiveDate)> {
        self.calls.lock().clone()
    }
}

impl Transcoder for RecordingTranscoder {
    fn transcode(
        &self,
        _data_root: &Path,
        kind: TranscodeKind,
        as_of: NaiveDate,
    ) -> Result<(), TranscodeError> {
        self.calls.lock().push((kind, as_of));
        if self.fail {
            return Err(TranscodeError::Failed {
                kind,
                code: Some(2),
                stderr: "datatool crashed".into(),
            });
        }
        Ok(())
    }
}
