//! Per-kind synchronization: plan → download → transcode → decode → import.

use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tdxsync_core::config::SyncConfig;
use tdxsync_core::data::{DecodeRequest, Decoder, Downloader, TranscodeKind, Transcoder};
use tdxsync_core::domain::{DataKind, MinuteStream};
use tdxsync_core::planner::plan;
use tdxsync_core::schema::{self, TableSchema};
use tdxsync_core::store::{ReplaceScope, Store, StoreError};
use thiserror::Error;
use tracing::{info, warn};

/// Extracted share-capital export, relative to the gbbq download dir.
pub const GBBQ_EXPORT: &str = "gbbq.txt";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How one candidate date was classified by the download source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DateOutcome {
    /// Downloaded (200) and extracted.
    Resolved,
    /// 404: not a trading day, or not published yet.
    NotApplicable,
    /// Anything else. The date is skipped this cycle.
    TransientFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    /// The plan was empty; nothing was attempted.
    UpToDate,
    /// Dates were attempted but none resolved.
    NothingToImport,
    Imported { rows: u64 },
    /// Transcoding or decoding failed; nothing was imported for this kind.
    DecodeAbandoned { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub kind: DataKind,
    pub outcomes: Vec<(NaiveDate, DateOutcome)>,
    pub valid_dates: Vec<NaiveDate>,
    /// Rows imported per table.
    pub imported: Vec<(String, u64)>,
    pub status: SyncStatus,
}

impl SyncReport {
    fn new(kind: DataKind) -> Self {
        Self {
            kind,
            outcomes: Vec::new(),
            valid_dates: Vec::new(),
            imported: Vec::new(),
            status: SyncStatus::UpToDate,
        }
    }

    pub fn not_applicable(&self) -> usize {
        self.count(|o| matches!(o, DateOutcome::NotApplicable))
    }

    pub fn transient_failures(&self) -> usize {
        self.count(|o| matches!(o, DateOutcome::TransientFailure(_)))
    }

    pub fn rows_imported(&self) -> u64 {
        self.imported.iter().map(|(_, n)| n).sum()
    }

    /// Whether this run put new rows in the store.
    pub fn changed_data(&self) -> bool {
        matches!(self.status, SyncStatus::Imported { rows } if rows > 0)
    }

    fn count(&self, pred: impl Fn(&DateOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Drives one data kind through a sync attempt.
pub struct Synchronizer<'a> {
    config: &'a SyncConfig,
    store: &'a dyn Store,
    downloader: &'a dyn Downloader,
    decoder: &'a dyn Decoder,
    transcoder: &'a dyn Transcoder,
}

/// Result of the transcode/decode stage: artifacts ready to import, or
/// the reason the kind was abandoned.
type Prepared = Result<Vec<(TableSchema, PathBuf)>, String>;

impl<'a> Synchronizer<'a> {
    pub fn new(
        config: &'a SyncConfig,
        store: &'a dyn Store,
        downloader: &'a dyn Downloader,
        decoder: &'a dyn Decoder,
        transcoder: &'a dyn Transcoder,
    ) -> Self {
        Self {
            config,
            store,
            downloader,
            decoder,
            transcoder,
        }
    }

    pub fn sync(&self, kind: DataKind, last_synced: NaiveDate) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(kind);
        let today = self.config.today();
        let dates = plan(last_synced, today);
        if dates.is_empty() {
            info!(%kind, %last_synced, "up to date");
            return Ok(report);
        }
        if kind == DataKind::Tick && self.config.minute_streams.is_empty() {
            info!(%kind, "no minute streams configured");
            report.status = SyncStatus::NothingToImport;
            return Ok(report);
        }

        info!(%kind, from = %dates[0], to = %today, candidates = dates.len(), "syncing");
        if kind.is_snapshot() {
            let outcome = self.acquire_snapshot()?;
            report.outcomes.push((today, outcome));
        } else {
            for date in dates {
                let outcome = self.acquire_date(kind, date)?;
                report.outcomes.push((date, outcome));
            }
        }
        report.valid_dates = report
            .outcomes
            .iter()
            .filter(|(_, o)| *o == DateOutcome::Resolved)
            .map(|(d, _)| *d)
            .collect();

        let Some(&as_of) = report.valid_dates.last() else {
            info!(
                %kind,
                not_applicable = report.not_applicable(),
                transient = report.transient_failures(),
                "nothing to import"
            );
            report.status = SyncStatus::NothingToImport;
            return Ok(report);
        };

        let prepared = match kind {
            DataKind::Daily => self.prepare_daily(as_of, last_synced),
            DataKind::Tick => self.prepare_minutes(as_of, last_synced),
            DataKind::CorporateActions => self.prepare_actions(as_of),
        };
        let artifacts = match prepared {
            Ok(artifacts) => artifacts,
            Err(reason) => {
                warn!(%kind, %reason, "import abandoned");
                report.status = SyncStatus::DecodeAbandoned { reason };
                return Ok(report);
            }
        };

        for (table, csv) in artifacts {
            let rows = if kind.is_snapshot() {
                self.store.replace_import(&table, &ReplaceScope::All, &csv)?
            } else {
                self.store.bulk_import(&table, &csv)?
            };
            report.imported.push((table.name().to_string(), rows));
        }
        report.status = SyncStatus::Imported {
            rows: report.rows_imported(),
        };
        info!(%kind, rows = report.rows_imported(), dates = report.valid_dates.len(), "imported");
        Ok(report)
    }

    fn acquire_date(&self, kind: DataKind, date: NaiveDate) -> Result<DateOutcome, SyncError> {
        let stamp = date.format("%Y%m%d");
        let (dir, url, file) = match kind {
            DataKind::Tick => (
                self.config.tick_download_dir(),
                self.config.sources.tick_url_for(date),
                format!("{stamp}tic.zip"),
            ),
            _ => (
                self.config.daily_download_dir(),
                self.config.sources.day_url_for(date),
                format!("{stamp}day.zip"),
            ),
        };
        ensure_dir(&dir)?;
        Ok(self.acquire(&url, &dir.join(file), &dir, date))
    }

    fn acquire_snapshot(&self) -> Result<DateOutcome, SyncError> {
        let dir = self.config.gbbq_download_dir();
        ensure_dir(&dir)?;
        let today = self.config.today();
        Ok(self.acquire(&self.config.sources.gbbq_url, &dir.join("gbbq.zip"), &dir, today))
    }

    fn acquire(&self, url: &str, archive: &Path, dest: &Path, date: NaiveDate) -> DateOutcome {
        match self.downloader.fetch(url, archive) {
            Ok(200) => match self.downloader.extract(archive, dest) {
                Ok(()) => {
                    info!(%date, "downloaded");
                    DateOutcome::Resolved
                }
                Err(e) => {
                    warn!(%date, error = %e, "extract failed, skipping date");
                    DateOutcome::TransientFailure(e.to_string())
                }
            },
            Ok(404) => {
                info!(%date, "not a trading day or not yet published");
                DateOutcome::NotApplicable
            }
            Ok(status) => {
                warn!(%date, status, "unexpected status, skipping date");
                DateOutcome::TransientFailure(format!("HTTP {status}"))
            }
            Err(e) => {
                warn!(%date, error = %e, "download failed, skipping date");
                DateOutcome::TransientFailure(e.to_string())
            }
        }
    }

    fn transcode(&self, kind: TranscodeKind, as_of: NaiveDate) -> Result<(), String> {
        self.transcoder
            .transcode(&self.config.data_dir, kind, as_of)
            .map_err(|e| e.to_string())
    }

    fn decode(&self, output: &Path, suffix: &str, since: NaiveDate) -> Result<(), String> {
        let vipdoc = self.config.vipdoc_dir();
        self.decoder
            .decode(&DecodeRequest {
                source_dir: &vipdoc,
                prefixes: &self.config.symbol_prefixes,
                output,
                suffix,
                since: Some(since),
            })
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn prepare_daily(&self, as_of: NaiveDate, since: NaiveDate) -> Prepared {
        self.transcode(TranscodeKind::Day, as_of)?;
        let csv = self.config.daily_csv();
        self.decode(&csv, ".day", since)?;
        Ok(vec![(schema::daily(), csv)])
    }

    /// Every configured stream is decoded before any is imported, so an
    /// abandoned kind leaves all minute tables untouched.
    fn prepare_minutes(&self, as_of: NaiveDate, since: NaiveDate) -> Prepared {
        self.transcode(TranscodeKind::Tick, as_of)?;
        self.transcode(TranscodeKind::Min, as_of)?;
        let mut artifacts = Vec::new();
        for &stream in &self.config.minute_streams {
            let csv = self.config.minute_csv(stream);
            self.decode(&csv, stream.file_suffix(), since)?;
            artifacts.push((schema::minute(stream), csv));
        }
        Ok(artifacts)
    }

    fn prepare_actions(&self, as_of: NaiveDate) -> Prepared {
        self.transcode(TranscodeKind::Gbbq, as_of)?;
        let source = self.config.gbbq_download_dir().join(GBBQ_EXPORT);
        let csv = self
            .decoder
            .decode_corporate_actions(&source, &self.config.gbbq_csv())
            .map_err(|e| e.to_string())?;
        Ok(vec![(schema::gbbq(), csv)])
    }
}

fn ensure_dir(dir: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dir).map_err(|source| SyncError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Last synced date for the minute streams: the oldest stream wins, and a
/// stream with no rows yet starts from the daily table's date.
pub fn minute_last_synced(
    store: &dyn Store,
    streams: &[MinuteStream],
    daily_last: NaiveDate,
) -> Result<NaiveDate, StoreError> {
    let mut last = None;
    for &stream in streams {
        let date = store
            .latest_date(&schema::minute(stream))?
            .unwrap_or(daily_last);
        last = Some(last.map_or(date, |l: NaiveDate| l.min(date)));
    }
    Ok(last.unwrap_or(daily_last))
}
