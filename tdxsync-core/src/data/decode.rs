//! Vendor binary files to normalized CSV artifacts.
//!
//! Daily files (`.day`) hold 32-byte little-endian records:
//! `date u32 (YYYYMMDD), open/high/low/close u32 (x100), amount f32,
//! volume u32, reserved u32`.
//!
//! Minute files (`.01`, `.5`) hold 32-byte records:
//! `date u16, minutes u16, open/high/low/close f32, amount f32,
//! volume u32, reserved u32`, where the packed date decodes as
//! `year = d / 2048 + 2004`, `month = (d % 2048) / 100`,
//! `day = (d % 2048) % 100`, and `minutes` counts from midnight.

use crate::domain::{DailyPoint, GbbqRecord, MinutePoint, PricePoint, Stamp, Symbol};
use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const RECORD_LEN: usize = 32;
pub const DAILY_SUFFIX: &str = ".day";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write CSV artifact: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}: invalid date {raw} at record {record}")]
    InvalidDate {
        path: PathBuf,
        record: usize,
        raw: String,
    },

    #[error("no decoder for file suffix '{0}'")]
    UnsupportedSuffix(String),

    #[error("source directory {0} does not exist")]
    MissingSource(PathBuf),

    #[error("corporate-action line {line}: {detail}")]
    MalformedAction { line: usize, detail: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DecodeError + '_ {
    move |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Arguments of one decode pass.
#[derive(Debug, Clone)]
pub struct DecodeRequest<'a> {
    /// Walked recursively.
    pub source_dir: &'a Path,
    /// A file is decoded when its name starts with one of these.
    pub prefixes: &'a [String],
    pub output: &'a Path,
    /// File name suffix selecting the record layout (`.day`, `.01`, `.5`).
    pub suffix: &'a str,
    /// Keep only rows whose trading date is after this.
    pub since: Option<NaiveDate>,
}

pub trait Decoder: Send + Sync {
    /// Decode every matching file into one CSV artifact. Returns the row
    /// count written.
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<u64, DecodeError>;

    /// Normalize the plaintext share-capital export into a CSV artifact
    /// matching `raw_gbbq`. Returns the artifact path.
    fn decode_corporate_actions(&self, source: &Path, output: &Path)
        -> Result<PathBuf, DecodeError>;
}

/// Decoder for the vendor's binary day and minute files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TdxDecoder;

impl Decoder for TdxDecoder {
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<u64, DecodeError> {
        if !request.source_dir.is_dir() {
            return Err(DecodeError::MissingSource(request.source_dir.to_path_buf()));
        }
        let is_daily = request.suffix == DAILY_SUFFIX;
        if !is_daily && !matches!(request.suffix, ".01" | ".5") {
            return Err(DecodeError::UnsupportedSuffix(request.suffix.to_string()));
        }

        let files = collect_files(request.source_dir, request.prefixes, request.suffix)?;
        debug!(files = files.len(), suffix = request.suffix, "decoding vendor files");

        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut writer = csv::Writer::from_path(request.output)?;
        let rows = if is_daily {
            write_points(&mut writer, &files, request.since, decode_daily_file)?
        } else {
            write_points(&mut writer, &files, request.since, decode_minute_file)?
        };
        writer.flush().map_err(io_err(request.output))?;
        info!(rows, output = %request.output.display(), "decoded");
        Ok(rows)
    }

    fn decode_corporate_actions(
        &self,
        source: &Path,
        output: &Path,
    ) -> Result<PathBuf, DecodeError> {
        let records = read_gbbq_export(source)?;
        let mut writer = csv::Writer::from_path(output)?;
        for record in &records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(io_err(output))?;
        info!(rows = records.len(), output = %output.display(), "normalized corporate actions");
        Ok(output.to_path_buf())
    }
}

fn write_points<S: Stamp>(
    writer: &mut csv::Writer<fs::File>,
    files: &[(Symbol, PathBuf)],
    since: Option<NaiveDate>,
    decode: fn(&Path, &Symbol) -> Result<Vec<PricePoint<S>>, DecodeError>,
) -> Result<u64, DecodeError> {
    writer.write_record(PricePoint::<S>::header())?;
    let mut rows = 0u64;
    for (symbol, path) in files {
        for point in decode(path, symbol)? {
            if since.is_some_and(|s| point.stamp.trading_date() <= s) {
                continue;
            }
            writer.write_record(point.to_record())?;
            rows += 1;
        }
    }
    Ok(rows)
}

/// Matching files under `dir`, sorted by path, paired with the symbol
/// named by the file stem.
fn collect_files(
    dir: &Path,
    prefixes: &[String],
    suffix: &str,
) -> Result<Vec<(Symbol, PathBuf)>, DecodeError> {
    let mut found = Vec::new();
    walk(dir, &mut |path| {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let Some(stem) = name.strip_suffix(suffix) else {
            return;
        };
        if !prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            return;
        }
        match Symbol::parse(stem) {
            Ok(symbol) => found.push((symbol, path.to_path_buf())),
            Err(e) => debug!(file = %path.display(), error = %e, "skipping file"),
        }
    })?;
    found.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(found)
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) -> Result<(), DecodeError> {
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        if path.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<[u8; RECORD_LEN]>, DecodeError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    let chunks = bytes.chunks_exact(RECORD_LEN);
    if !chunks.remainder().is_empty() {
        warn!(
            file = %path.display(),
            trailing = chunks.remainder().len(),
            "ignoring partial trailing record"
        );
    }
    Ok(chunks
        .map(|c| {
            let mut record = [0u8; RECORD_LEN];
            record.copy_from_slice(c);
            record
        })
        .collect())
}

/// Decode one `.day` file.
pub fn decode_daily_file(path: &Path, symbol: &Symbol) -> Result<Vec<DailyPoint>, DecodeError> {
    let io = |e| DecodeError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut points = Vec::new();
    for (i, record) in read_records(path)?.iter().enumerate() {
        let mut r = Cursor::new(&record[..]);
        let raw_date = r.read_u32::<LittleEndian>().map_err(io)?;
        let mut prices = [0f64; 4];
        for p in &mut prices {
            *p = f64::from(r.read_u32::<LittleEndian>().map_err(io)?) / 100.0;
        }
        let amount = f64::from(r.read_f32::<LittleEndian>().map_err(io)?);
        let volume = i64::from(r.read_u32::<LittleEndian>().map_err(io)?);

        let date = NaiveDate::from_ymd_opt(
            (raw_date / 10000) as i32,
            raw_date / 100 % 100,
            raw_date % 100,
        )
        .ok_or_else(|| DecodeError::InvalidDate {
            path: path.to_path_buf(),
            record: i,
            raw: raw_date.to_string(),
        })?;

        points.push(DailyPoint {
            symbol: symbol.clone(),
            stamp: date,
            open: prices[0],
            high: prices[1],
            low: prices[2],
            close: prices[3],
            amount,
            volume,
        });
    }
    Ok(points)
}

/// Decode one `.01` or `.5` file.
pub fn decode_minute_file(path: &Path, symbol: &Symbol) -> Result<Vec<MinutePoint>, DecodeError> {
    let io = |e| DecodeError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut points = Vec::new();
    for (i, record) in read_records(path)?.iter().enumerate() {
        let mut r = Cursor::new(&record[..]);
        let packed = r.read_u16::<LittleEndian>().map_err(io)?;
        let minutes = r.read_u16::<LittleEndian>().map_err(io)?;
        let mut prices = [0f64; 4];
        for p in &mut prices {
            *p = round2(f64::from(r.read_f32::<LittleEndian>().map_err(io)?));
        }
        let amount = f64::from(r.read_f32::<LittleEndian>().map_err(io)?);
        let volume = i64::from(r.read_u32::<LittleEndian>().map_err(io)?);

        let stamp = minute_stamp(packed, minutes).ok_or_else(|| DecodeError::InvalidDate {
            path: path.to_path_buf(),
            record: i,
            raw: format!("{packed}/{minutes}"),
        })?;

        points.push(MinutePoint {
            symbol: symbol.clone(),
            stamp,
            open: prices[0],
            high: prices[1],
            low: prices[2],
            close: prices[3],
            amount,
            volume,
        });
    }
    Ok(points)
}

fn minute_stamp(packed: u16, minutes: u16) -> Option<NaiveDateTime> {
    let packed = u32::from(packed);
    let year = (packed / 2048 + 2004) as i32;
    let rest = packed % 2048;
    let minutes = u32::from(minutes);
    NaiveDate::from_ymd_opt(year, rest / 100, rest % 100)?
        .and_hms_opt(minutes / 60, minutes % 60, 0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Deserialize)]
struct GbbqExportRow {
    market: i32,
    code: String,
    date: String,
    category: i32,
    c1: f64,
    c2: f64,
    c3: f64,
    c4: f64,
}

/// Read the plaintext export (`market,code,date,category,c1..c4`, dates as
/// `YYYYMMDD`).
pub fn read_gbbq_export(source: &Path) -> Result<Vec<GbbqRecord>, DecodeError> {
    let file = fs::File::open(source).map_err(io_err(source))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<GbbqExportRow>().enumerate() {
        let line = i + 2;
        let row = row.map_err(|e| DecodeError::MalformedAction {
            line,
            detail: e.to_string(),
        })?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y%m%d").map_err(|e| {
            DecodeError::MalformedAction {
                line,
                detail: format!("date '{}': {e}", row.date),
            }
        })?;
        records.push(GbbqRecord {
            market: row.market,
            code: row.code,
            date,
            category: row.category,
            c1: row.c1,
            c2: row.c2,
            c3: row.c3,
            c4: row.c4,
        });
    }
    Ok(records)
}
