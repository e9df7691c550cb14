//! Download collaborator contract.
//!
//! The synchronizer only sees status codes and errors; it classifies them
//! as resolved, not applicable or transient. Implementations never retry.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("build HTTP client: {0}")]
    Client(String),

    #[error("request {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("extract {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

pub trait Downloader: Send + Sync {
    /// Fetch `url` into `dest`. Returns the HTTP status; `dest` is only
    /// written on 200.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u16, DownloadError>;

    /// Unpack a zip archive into `dest_dir`, creating it if needed.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), DownloadError>;
}
