//! Table bootstrap and view (re)establishment.

use tdxsync_core::config::SyncConfig;
use tdxsync_core::data::archive::has_files_with_extension;
use tdxsync_core::domain::MinuteStream;
use tdxsync_core::schema;
use tdxsync_core::store::{Store, StoreError};
use tdxsync_core::tier::{catalog, ViewError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ViewSetupError {
    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create every base table and its staging counterpart if missing, so
/// views have something to select from even before the first import.
pub fn ensure_tables(store: &dyn Store) -> Result<(), StoreError> {
    for table in schema::price_tables() {
        store.create_table(&table)?;
        store.create_table(&table.staging())?;
    }
    store.create_table(&schema::factors())?;
    store.create_table(&schema::gbbq())
}

/// Empty every staging table.
pub fn clear_staging(store: &dyn Store) -> Result<(), StoreError> {
    for table in schema::price_tables() {
        store.clear_table(&table.staging())?;
    }
    Ok(())
}

/// Archive glob per configured stream, present only when the archive
/// directory holds Parquet files.
pub fn archive_sources(config: &SyncConfig) -> Vec<(MinuteStream, Option<String>)> {
    config
        .minute_streams
        .iter()
        .map(|&stream| {
            let present = has_files_with_extension(&config.archive_dir(stream), "parquet");
            debug!(%stream, present, "archive layer");
            (stream, present.then(|| config.archive_glob(stream)))
        })
        .collect()
}

/// (Re)create every served view. Returns the view names in creation order.
pub fn establish_views(
    store: &dyn Store,
    config: &SyncConfig,
) -> Result<Vec<String>, ViewSetupError> {
    ensure_tables(store)?;
    let views = catalog(&archive_sources(config))?;
    let mut names = Vec::with_capacity(views.len());
    for view in &views {
        store.create_or_replace_view(view)?;
        names.push(view.name.to_string());
    }
    info!(views = names.len(), "views established");
    Ok(names)
}
