//! One full sync cycle, plus the one-off operations built from the same
//! parts (bootstrap import, staging load, on-demand factors).

use crate::engine::{EngineError, FactorEngine, FactorSummary};
use crate::sync::{minute_last_synced, SyncError, SyncReport, SyncStatus, Synchronizer};
use crate::views::{clear_staging, ensure_tables, establish_views, ViewSetupError};
use serde::Serialize;
use std::path::Path;
use tdxsync_core::config::{ConfigError, SyncConfig};
use tdxsync_core::data::{DecodeError, DecodeRequest, Decoder, Downloader, Transcoder};
use tdxsync_core::domain::{DataKind, MinuteStream, Symbol};
use tdxsync_core::schema;
use tdxsync_core::store::{ReplaceScope, Store, StoreError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store has no daily history; run `init` first")]
    NotInitialized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Views(#[from] ViewSetupError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// The acquisition collaborators a cycle drives.
pub struct Collaborators<'a> {
    pub downloader: &'a dyn Downloader,
    pub decoder: &'a dyn Decoder,
    pub transcoder: &'a dyn Transcoder,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub daily: SyncReport,
    pub tick: Option<SyncReport>,
    pub corporate_actions: SyncReport,
    /// `None` when factors were already current.
    pub factors: Option<FactorSummary>,
    pub views: Vec<String>,
}

impl CycleReport {
    pub fn log_summary(&self) {
        for report in [Some(&self.daily), self.tick.as_ref(), Some(&self.corporate_actions)]
            .into_iter()
            .flatten()
        {
            info!(
                kind = %report.kind,
                status = ?report.status,
                resolved = report.valid_dates.len(),
                not_applicable = report.not_applicable(),
                transient = report.transient_failures(),
                rows = report.rows_imported(),
                "sync summary"
            );
        }
        match &self.factors {
            Some(f) => info!(
                computed = f.computed,
                faults = f.faults.len(),
                rows = f.imported,
                "factor summary"
            ),
            None => info!("factors already current"),
        }
        info!(views = self.views.len(), "cycle complete");
    }
}

/// Run every data kind, recompute factors when needed, then re-establish
/// the views.
pub fn run_cycle(
    config: &SyncConfig,
    store: &dyn Store,
    collaborators: &Collaborators<'_>,
) -> Result<CycleReport, CycleError> {
    config.validate()?;
    ensure_tables(store)?;
    let daily_last = store
        .latest_date(&schema::daily())?
        .ok_or(CycleError::NotInitialized)?;
    info!(%daily_last, today = %config.today(), "starting cycle");
    clear_staging(store)?;

    let sync = Synchronizer::new(
        config,
        store,
        collaborators.downloader,
        collaborators.decoder,
        collaborators.transcoder,
    );
    let daily = sync.sync(DataKind::Daily, daily_last)?;
    let tick = if config.minute_streams.is_empty() {
        None
    } else {
        let last = minute_last_synced(store, &config.minute_streams, daily_last)?;
        Some(sync.sync(DataKind::Tick, last)?)
    };
    let corporate_actions = sync.sync(DataKind::CorporateActions, daily_last)?;

    let factors = if factors_stale(store, &daily, &corporate_actions)? {
        Some(recompute_factors(config, store, None)?)
    } else {
        None
    };

    let views = establish_views(store, config)?;
    let report = CycleReport {
        daily,
        tick,
        corporate_actions,
        factors,
        views,
    };
    report.log_summary();
    Ok(report)
}

/// Factors follow daily prices and corporate actions: recompute when either
/// changed, or when the factor table lags the daily table.
fn factors_stale(
    store: &dyn Store,
    daily: &SyncReport,
    actions: &SyncReport,
) -> Result<bool, StoreError> {
    if daily.changed_data() || matches!(actions.status, SyncStatus::Imported { .. }) {
        return Ok(true);
    }
    let factor_last = store.latest_date(&schema::factors())?;
    let daily_last = store.latest_date(&schema::daily())?;
    Ok(factor_last != daily_last)
}

pub fn recompute_factors(
    config: &SyncConfig,
    store: &dyn Store,
    only: Option<&[Symbol]>,
) -> Result<FactorSummary, CycleError> {
    let engine = FactorEngine::new(store, config.max_concurrency, config.factors_csv());
    Ok(engine.compute_all(only)?)
}

/// Bootstrap the daily table from a local vendor directory holding full
/// history. Replaces any existing daily rows.
pub fn init_from_directory(
    config: &SyncConfig,
    store: &dyn Store,
    decoder: &dyn Decoder,
    day_dir: &Path,
) -> Result<u64, CycleError> {
    let csv = config.daily_csv();
    let decoded = decoder.decode(&DecodeRequest {
        source_dir: day_dir,
        prefixes: &config.symbol_prefixes,
        output: &csv,
        suffix: ".day",
        since: None,
    })?;
    info!(decoded, dir = %day_dir.display(), "bootstrap decode done");
    let rows = store.replace_import(&schema::daily(), &ReplaceScope::All, &csv)?;
    establish_views(store, config)?;
    Ok(rows)
}

/// Replace a minute stream's staging table wholesale from a CSV artifact.
pub fn stage(store: &dyn Store, stream: MinuteStream, csv: &Path) -> Result<u64, StoreError> {
    let staging = schema::minute(stream).staging();
    let rows = store.replace_import(&staging, &ReplaceScope::All, csv)?;
    info!(%stream, rows, "staging replaced");
    Ok(rows)
}
