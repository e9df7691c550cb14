use super::archive::extract_zip;
use super::provider::{DownloadError, Downloader};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Blocking HTTP downloader.
///
/// Bodies stream into `<dest>.part` and are renamed into place once
/// complete, so an interrupted transfer never leaves a truncated archive
/// under the final name.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u16, DownloadError> {
        let transport = |e: reqwest::Error| DownloadError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        };
        let mut resp = self.client.get(url).send().map_err(transport)?;
        let status = resp.status().as_u16();
        debug!(url, status, "fetched");
        if status != 200 {
            return Ok(status);
        }

        stream_into(&mut resp, url, dest)?;
        Ok(status)
    }

    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), DownloadError> {
        extract_zip(archive, dest_dir)
    }
}

/// Copy `body` into `<dest>.part`, then rename it over `dest`. A failed
/// copy removes the partial file.
fn stream_into(body: &mut impl Read, url: &str, dest: &Path) -> Result<(), DownloadError> {
    let write_err = |source| DownloadError::Io {
        path: dest.to_path_buf(),
        source,
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = Path::new(&part);

    let mut file = fs::File::create(part).map_err(write_err)?;
    if let Err(e) = io::copy(body, &mut file) {
        drop(file);
        let _ = fs::remove_file(part);
        return Err(DownloadError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        });
    }
    drop(file);
    fs::rename(part, dest).map_err(write_err)
}
