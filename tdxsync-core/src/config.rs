//! Sync configuration, built once at process start.
//!
//! Loaded from TOML (every field optional), then overridden by the
//! `DATA_PATH` environment variable and command-line flags.

use crate::domain::MinuteStream;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the data directory.
pub const DATA_PATH_ENV: &str = "DATA_PATH";

/// Boards and indices kept by default when decoding vendor files.
pub const DEFAULT_PREFIXES: [&str; 15] = [
    "sz30",     // ChiNext
    "sz00",     // Shenzhen main board
    "sh60",     // Shanghai main board
    "sh68",     // STAR market
    "bj920",    // Beijing exchange
    "sh000300", // CSI 300
    "sh000905", // CSI 500
    "sh000852", // CSI 1000
    "sh000001", // SSE composite
    "sz399001", // SZSE component
    "sz399006", // ChiNext index
    "sh000680", // STAR composite
    "bj899050", // BSE 50
    "sh880",    // vendor concept/style boards
    "sh881",    // vendor industry boards
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no database path configured")]
    MissingDatabase,

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("store_connections must be at least 1")]
    ZeroConnections,

    #[error("symbol prefix filter is empty")]
    EmptyPrefixFilter,
}

/// Download locations. `{date}` is replaced with `YYYYMMDD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub day_url: String,
    pub tick_url: String,
    pub gbbq_url: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            day_url: "https://www.tdx.com.cn/products/data/data/g4day/{date}.zip".into(),
            tick_url: "https://www.tdx.com.cn/products/data/data/g4tic/{date}.zip".into(),
            gbbq_url: "http://www.tdx.com.cn/products/data/data/dbf/gbbq.zip".into(),
            timeout_secs: 60,
        }
    }
}

impl SourceConfig {
    pub fn day_url_for(&self, date: NaiveDate) -> String {
        fill_date(&self.day_url, date)
    }

    pub fn tick_url_for(&self, date: NaiveDate) -> String {
        fill_date(&self.tick_url, date)
    }
}

fn fill_date(template: &str, date: NaiveDate) -> String {
    template.replace("{date}", &date.format("%Y%m%d").to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Working directory for downloads, vendor files and CSV artifacts.
    pub data_dir: PathBuf,
    pub database: Option<PathBuf>,
    /// Factor worker count.
    pub max_concurrency: usize,
    /// Size of the store's connection pool.
    pub store_connections: usize,
    pub minute_streams: Vec<MinuteStream>,
    pub symbol_prefixes: Vec<String>,
    pub sources: SourceConfig,
    /// Vendor conversion tool; transcoding is skipped when unset.
    pub transcoder: Option<PathBuf>,
    /// Pinned "today"; the local date when unset.
    pub today: Option<NaiveDate>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: None,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            store_connections: 10,
            minute_streams: Vec::new(),
            symbol_prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            sources: SourceConfig::default(),
            transcoder: None,
            today: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tdxsync")
}

impl SyncConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `DATA_PATH` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(DATA_PATH_ENV).filter(|p| !p.is_empty()) {
            self.data_dir = PathBuf::from(path);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.is_none() {
            return Err(ConfigError::MissingDatabase);
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.store_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        if self.symbol_prefixes.is_empty() {
            return Err(ConfigError::EmptyPrefixFilter);
        }
        Ok(())
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn database_path(&self) -> Result<&Path, ConfigError> {
        self.database.as_deref().ok_or(ConfigError::MissingDatabase)
    }

    // ── Derived paths ───────────────────────────────────────────────

    /// Root of vendor files; the decoder walks it recursively.
    pub fn vipdoc_dir(&self) -> PathBuf {
        self.data_dir.join("vipdoc")
    }

    pub fn daily_download_dir(&self) -> PathBuf {
        self.vipdoc_dir().join("refmhq")
    }

    pub fn tick_download_dir(&self) -> PathBuf {
        self.vipdoc_dir().join("newdatetick")
    }

    pub fn gbbq_download_dir(&self) -> PathBuf {
        self.data_dir.join("gbbq-temp")
    }

    pub fn daily_csv(&self) -> PathBuf {
        self.data_dir.join("stock.csv")
    }

    pub fn minute_csv(&self, stream: MinuteStream) -> PathBuf {
        self.data_dir.join(stream.csv_name())
    }

    pub fn gbbq_csv(&self) -> PathBuf {
        self.data_dir.join("gbbq.csv")
    }

    pub fn factors_csv(&self) -> PathBuf {
        self.data_dir.join("factors.csv")
    }

    pub fn archive_dir(&self, stream: MinuteStream) -> PathBuf {
        self.data_dir.join(stream.archive_dir())
    }

    /// Glob over the year-partitioned archive of a stream.
    pub fn archive_glob(&self, stream: MinuteStream) -> String {
        self.archive_dir(stream)
            .join("*")
            .join("*.parquet")
            .to_string_lossy()
            .into_owned()
    }
}
