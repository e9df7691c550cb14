use super::provider::DownloadError;
use std::fs;
use std::path::Path;

/// Unpack every entry of a zip archive under `dest_dir`.
pub fn extract_zip(archive: &Path, dest_dir: &Path) -> Result<(), DownloadError> {
    let io = |source| DownloadError::Io {
        path: dest_dir.to_path_buf(),
        source,
    };
    let zip_err = |source| DownloadError::Archive {
        path: archive.to_path_buf(),
        source,
    };
    fs::create_dir_all(dest_dir).map_err(io)?;
    let file = fs::File::open(archive).map_err(|source| DownloadError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(zip_err)?;
    zip.extract(dest_dir).map_err(zip_err)
}

/// Whether `dir` holds at least one file with extension `ext`, at any depth.
/// A missing directory counts as empty.
pub fn has_files_with_extension(dir: &Path, ext: &str) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let path = entry.path();
        if path.is_dir() {
            has_files_with_extension(&path, ext)
        } else {
            path.extension().is_some_and(|e| e == ext)
        }
    })
}
