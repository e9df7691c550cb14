//! Data kinds the synchronizer drives and the minute streams they feed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One acquisition stream.
///
/// "tick" and "minute" name the same stream: tick archives are transcoded
/// into minute files and decoded into every configured [`MinuteStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    Daily,
    Tick,
    CorporateActions,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Daily, DataKind::Tick, DataKind::CorporateActions];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Daily => "daily",
            DataKind::Tick => "tick",
            DataKind::CorporateActions => "corporate-actions",
        }
    }

    /// Whether the kind is a single snapshot rather than one archive per date.
    pub fn is_snapshot(&self) -> bool {
        matches!(self, DataKind::CorporateActions)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} '{value}'")]
pub struct ParseKindError {
    what: &'static str,
    value: String,
}

impl FromStr for DataKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(DataKind::Daily),
            "tick" | "minute" => Ok(DataKind::Tick),
            "corporate-actions" | "gbbq" => Ok(DataKind::CorporateActions),
            other => Err(ParseKindError {
                what: "data kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Intraday granularity. Each stream has its own raw table, staging
/// table, archive and resolved view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MinuteStream {
    #[serde(rename = "1min")]
    One,
    #[serde(rename = "5min")]
    Five,
}

impl MinuteStream {
    pub const ALL: [MinuteStream; 2] = [MinuteStream::One, MinuteStream::Five];

    pub fn minutes(&self) -> u32 {
        match self {
            MinuteStream::One => 1,
            MinuteStream::Five => 5,
        }
    }

    /// Finalized raw table name.
    pub fn table(&self) -> &'static str {
        match self {
            MinuteStream::One => "raw_stocks_1min",
            MinuteStream::Five => "raw_stocks_5min",
        }
    }

    /// Vendor file suffix produced by the transcoder.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            MinuteStream::One => ".01",
            MinuteStream::Five => ".5",
        }
    }

    /// Tier-resolved view name.
    pub fn view(&self) -> &'static str {
        match self {
            MinuteStream::One => "v_stocks_1min",
            MinuteStream::Five => "v_stocks_5min",
        }
    }

    /// View over the Parquet archive.
    pub fn cold_view(&self) -> &'static str {
        match self {
            MinuteStream::One => "v_cold_stocks_1min",
            MinuteStream::Five => "v_cold_stocks_5min",
        }
    }

    /// Archive directory under the data root.
    pub fn archive_dir(&self) -> &'static str {
        match self {
            MinuteStream::One => "parquet_1",
            MinuteStream::Five => "parquet_5",
        }
    }

    /// Decoded CSV artifact name.
    pub fn csv_name(&self) -> &'static str {
        match self {
            MinuteStream::One => "1min.csv",
            MinuteStream::Five => "5min.csv",
        }
    }
}

impl fmt::Display for MinuteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.minutes())
    }
}

impl FromStr for MinuteStream {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "1min" => Ok(MinuteStream::One),
            "5" | "5min" => Ok(MinuteStream::Five),
            other => Err(ParseKindError {
                what: "minute stream",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_and_minute_are_one_stream() {
        assert_eq!("tick".parse::<DataKind>().unwrap(), DataKind::Tick);
        assert_eq!("minute".parse::<DataKind>().unwrap(), DataKind::Tick);
        assert_eq!("gbbq".parse::<DataKind>().unwrap(), DataKind::CorporateActions);
        assert!("weekly".parse::<DataKind>().is_err());
    }

    #[test]
    fn minute_stream_names() {
        assert_eq!("5".parse::<MinuteStream>().unwrap(), MinuteStream::Five);
        assert_eq!(MinuteStream::One.table(), "raw_stocks_1min");
        assert_eq!(MinuteStream::Five.to_string(), "5min");
        assert_eq!(MinuteStream::Five.file_suffix(), ".5");
    }
}
