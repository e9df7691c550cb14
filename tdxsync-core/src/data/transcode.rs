//! Vendor transcoding: an external tool converts downloaded archives into
//! per-symbol binary files (and the share-capital export into plaintext).

use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeKind {
    Day,
    Tick,
    Min,
    Gbbq,
}

impl TranscodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeKind::Day => "day",
            TranscodeKind::Tick => "tick",
            TranscodeKind::Min => "min",
            TranscodeKind::Gbbq => "gbbq",
        }
    }
}

impl fmt::Display for TranscodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} transcode exited with {code:?}: {stderr}")]
    Failed {
        kind: TranscodeKind,
        code: Option<i32>,
        stderr: String,
    },
}

pub trait Transcoder: Send + Sync {
    fn transcode(
        &self,
        data_root: &Path,
        kind: TranscodeKind,
        as_of: NaiveDate,
    ) -> Result<(), TranscodeError>;
}

/// Runs `<program> <kind> create <yyyymmdd>` inside the data root.
#[derive(Debug, Clone)]
pub struct ToolTranscoder {
    program: PathBuf,
}

impl ToolTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Transcoder for ToolTranscoder {
    fn transcode(
        &self,
        data_root: &Path,
        kind: TranscodeKind,
        as_of: NaiveDate,
    ) -> Result<(), TranscodeError> {
        let date = as_of.format("%Y%m%d").to_string();
        debug!(program = %self.program.display(), %kind, %date, "running transcoder");
        let output = Command::new(&self.program)
            .args([kind.as_str(), "create", date.as_str()])
            .current_dir(data_root)
            .output()
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(TranscodeError::Failed {
                kind,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        info!(%kind, %date, "transcoded");
        Ok(())
    }
}

/// Used when no tool is configured: files are expected to already be in
/// decodable form.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTranscoder;

impl Transcoder for NoopTranscoder {
    fn transcode(&self, _: &Path, kind: TranscodeKind, _: NaiveDate) -> Result<(), TranscodeError> {
        debug!(%kind, "no transcoder configured, skipping");
        Ok(())
    }
}
