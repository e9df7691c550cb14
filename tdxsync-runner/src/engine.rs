//! Concurrent per-symbol factor computation.
//!
//! A bounded rayon pool computes each symbol into an in-memory buffer and
//! sends it over a bounded channel to one collector thread, the only
//! writer of the CSV artifact. The artifact is imported once, after the
//! collector drains.

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;
use tdxsync_core::adjust::{compute_factors, ActionIndex, FactorError};
use tdxsync_core::domain::{AdjustmentFactor, Symbol};
use tdxsync_core::schema;
use tdxsync_core::store::{DateRange, ReplaceScope, Store, StoreError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("build worker pool: {0}")]
    Pool(String),

    #[error("write factor artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("factor collector thread: {0}")]
    Collector(String),
}

/// A symbol left out of the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolFault {
    pub symbol: Symbol,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FactorSummary {
    pub symbols: usize,
    pub computed: usize,
    /// Rows written to the artifact.
    pub rows: u64,
    /// Rows the store reported importing.
    pub imported: u64,
    pub faults: Vec<SymbolFault>,
}

enum Outcome {
    Computed(Vec<AdjustmentFactor>),
    Fault(FactorError),
    Store(StoreError),
}

struct Collected {
    rows: u64,
    computed: usize,
    faults: Vec<SymbolFault>,
}

pub struct FactorEngine<'a> {
    store: &'a dyn Store,
    workers: usize,
    artifact: PathBuf,
}

impl<'a> FactorEngine<'a> {
    pub fn new(store: &'a dyn Store, workers: usize, artifact: impl Into<PathBuf>) -> Self {
        Self {
            store,
            workers: workers.max(1),
            artifact: artifact.into(),
        }
    }

    /// Recompute factors for `only` (every stored symbol when `None`) and
    /// replace their factor rows.
    ///
    /// History is read from the raw daily table, not the tier view. An
    /// exact replay collapses on read, but a replay that conflicts with an
    /// earlier row leaves two rows for one date: that symbol becomes a
    /// `DuplicateDate` fault, and under a full run its old factor rows are
    /// deleted with the rest and stay absent until the raw table is rebuilt.
    pub fn compute_all(&self, only: Option<&[Symbol]>) -> Result<FactorSummary, EngineError> {
        let (symbols, scope) = match only {
            Some(list) => (list.to_vec(), ReplaceScope::Symbols(list.to_vec())),
            None => (self.store.query_all_symbols()?, ReplaceScope::All),
        };
        let index = ActionIndex::build(self.store.query_all_corporate_actions()?);
        info!(
            symbols = symbols.len(),
            action_codes = index.codes(),
            workers = self.workers,
            "computing factors"
        );

        let collected = self.fan_out(&symbols, &index)?;

        let factors = schema::factors();
        let imported = self.store.replace_import(&factors, &scope, &self.artifact)?;
        let summary = FactorSummary {
            symbols: symbols.len(),
            computed: collected.computed,
            rows: collected.rows,
            imported,
            faults: collected.faults,
        };
        info!(
            computed = summary.computed,
            faults = summary.faults.len(),
            rows = summary.imported,
            "factors replaced"
        );
        Ok(summary)
    }

    fn fan_out(&self, symbols: &[Symbol], index: &ActionIndex) -> Result<Collected, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("factor-{i}"))
            .build()
            .map_err(|e| EngineError::Pool(e.to_string()))?;
        let (tx, rx) = sync_channel::<(Symbol, Outcome)>(self.workers * 4);
        let store = self.store;
        let artifact = self.artifact.as_path();

        thread::scope(|s| {
            let collector = thread::Builder::new()
                .name("factor-writer".into())
                .spawn_scoped(s, move || collect(rx, artifact))
                .map_err(|e| EngineError::Collector(e.to_string()))?;

            pool.install(|| {
                symbols.par_iter().for_each_with(tx, |tx, symbol| {
                    let outcome = match store.query_price_points(symbol, DateRange::all()) {
                        Ok(history) => {
                            match compute_factors(symbol, &history, index.for_symbol(symbol)) {
                                Ok(rows) => Outcome::Computed(rows),
                                Err(e) => Outcome::Fault(e),
                            }
                        }
                        Err(e) => Outcome::Store(e),
                    };
                    // Fails only once the collector has bailed; its error
                    // surfaces on join.
                    let _ = tx.send((symbol.clone(), outcome));
                });
            });

            collector
                .join()
                .map_err(|_| EngineError::Collector("writer thread panicked".into()))?
        })
    }
}

/// Drain the channel, writing computed rows. After the first write error
/// nothing more is written but the channel is still drained so workers
/// never block.
fn collect(
    rx: Receiver<(Symbol, Outcome)>,
    artifact: &Path,
) -> Result<Collected, EngineError> {
    let artifact_err = |source| EngineError::Artifact {
        path: artifact.to_path_buf(),
        source,
    };
    if let Some(parent) = artifact.parent() {
        std::fs::create_dir_all(parent).map_err(|e| artifact_err(csv::Error::from(e)))?;
    }
    let mut writer = csv::Writer::from_path(artifact).map_err(artifact_err)?;
    let mut collected = Collected {
        rows: 0,
        computed: 0,
        faults: Vec::new(),
    };
    let mut write_error: Option<csv::Error> = None;

    for (symbol, outcome) in rx {
        match outcome {
            Outcome::Computed(rows) => {
                collected.computed += 1;
                if write_error.is_some() {
                    continue;
                }
                for row in &rows {
                    if let Err(e) = writer.serialize(row) {
                        error!(%symbol, error = %e, "factor artifact write failed");
                        write_error = Some(e);
                        break;
                    }
                    collected.rows += 1;
                }
                debug!(%symbol, rows = rows.len(), "factors computed");
            }
            Outcome::Fault(e) => {
                warn!(%symbol, error = %e, "factor fault, symbol skipped");
                collected.faults.push(SymbolFault {
                    symbol,
                    reason: e.to_string(),
                });
            }
            Outcome::Store(e) => {
                error!(%symbol, error = %e, "price history query failed, symbol skipped");
                collected.faults.push(SymbolFault {
                    symbol,
                    reason: e.to_string(),
                });
            }
        }
    }

    if let Some(e) = write_error {
        return Err(artifact_err(e));
    }
    // An empty run still needs a header for the typed import.
    if collected.rows == 0 {
        writer
            .write_record(schema::factors().columns().iter().map(|c| c.name.as_str()))
            .map_err(artifact_err)?;
    }
    writer
        .flush()
        .map_err(|e| artifact_err(csv::Error::from(e)))?;
    Ok(collected)
}
