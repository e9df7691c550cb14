//! Decoding vendor binary files written byte-for-byte in a scratch dir.

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tdxsync_core::data::decode::{decode_daily_file, read_gbbq_export};
use tdxsync_core::data::{DecodeError, DecodeRequest, Decoder, TdxDecoder};
use tdxsync_core::domain::Symbol;

// ── Fixture writers ──────────────────────────────────────────────────

fn day_record(buf: &mut Vec<u8>, date: u32, ohlc: [u32; 4], amount: f32, volume: u32) {
    buf.write_u32::<LittleEndian>(date).unwrap();
    for p in ohlc {
        buf.write_u32::<LittleEndian>(p).unwrap();
    }
    buf.write_f32::<LittleEndian>(amount).unwrap();
    buf.write_u32::<LittleEndian>(volume).unwrap();
    buf.write_u32::<LittleEndian>(0).unwrap();
}

fn minute_record(buf: &mut Vec<u8>, y: u16, m: u16, d: u16, minutes: u16, close: f32) {
    buf.write_u16::<LittleEndian>((y - 2004) * 2048 + m * 100 + d).unwrap();
    buf.write_u16::<LittleEndian>(minutes).unwrap();
    for _ in 0..4 {
        buf.write_f32::<LittleEndian>(close).unwrap();
    }
    buf.write_f32::<LittleEndian>(1234.5).unwrap();
    buf.write_u32::<LittleEndian>(300).unwrap();
    buf.write_u32::<LittleEndian>(0).unwrap();
}

fn write_day_file(dir: &Path, name: &str, dates: &[u32]) {
    let mut buf = Vec::new();
    for (i, d) in dates.iter().enumerate() {
        let p = 1000 + i as u32;
        day_record(&mut buf, *d, [p, p + 10, p - 10, p + 5], 5.0e6, 10_000);
    }
    fs::write(dir.join(name), buf).unwrap();
}

fn prefixes() -> Vec<String> {
    vec!["sh60".into(), "sz00".into()]
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// ── Daily ────────────────────────────────────────────────────────────

#[test]
fn daily_files_decode_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let lday = dir.path().join("vipdoc/sh/lday");
    fs::create_dir_all(&lday).unwrap();
    write_day_file(&lday, "sh600000.day", &[20240603, 20240604]);
    // filtered by prefix
    write_day_file(&lday, "sh900901.day", &[20240603]);
    let out = dir.path().join("stock.csv");

    let rows = TdxDecoder
        .decode(&DecodeRequest {
            source_dir: &dir.path().join("vipdoc"),
            prefixes: &prefixes(),
            output: &out,
            suffix: ".day",
            since: None,
        })
        .unwrap();

    assert_eq!(rows, 2);
    let lines = read_lines(&out);
    assert_eq!(lines[0], "symbol,open,high,low,close,amount,volume,date");
    assert_eq!(lines[1], "sh600000,10,10.1,9.9,10.05,5000000,10000,2024-06-03");
    assert!(lines[2].ends_with(",2024-06-04"));
}

#[test]
fn since_keeps_only_newer_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_day_file(dir.path(), "sz000001.day", &[20240531, 20240603, 20240604]);
    let out = dir.path().join("stock.csv");
    let rows = TdxDecoder
        .decode(&DecodeRequest {
            source_dir: dir.path(),
            prefixes: &prefixes(),
            output: &out,
            suffix: ".day",
            since: NaiveDate::from_ymd_opt(2024, 6, 3),
        })
        .unwrap();
    assert_eq!(rows, 1);
    assert!(read_lines(&out)[1].ends_with(",2024-06-04"));
}

#[test]
fn partial_trailing_record_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut buf = Vec::new();
    day_record(&mut buf, 20240603, [100, 100, 100, 100], 1.0, 1);
    buf.extend_from_slice(&[0u8; 7]);
    let path = dir.path().join("sh600000.day");
    fs::write(&path, buf).unwrap();
    let points = decode_daily_file(&path, &Symbol::parse("sh600000").unwrap()).unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].close, 1.0);
}

#[test]
fn invalid_date_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write_day_file(dir.path(), "sh600000.day", &[20241341]);
    let err = decode_daily_file(
        &dir.path().join("sh600000.day"),
        &Symbol::parse("sh600000").unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidDate { .. }));
}

#[test]
fn unknown_suffix_and_missing_dir_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("x.csv");
    let missing = dir.path().join("nope");
    let mut req = DecodeRequest {
        source_dir: dir.path(),
        prefixes: &[],
        output: &out,
        suffix: ".lc1",
        since: None,
    };
    assert!(matches!(
        TdxDecoder.decode(&req),
        Err(DecodeError::UnsupportedSuffix(_))
    ));
    req.source_dir = &missing;
    req.suffix = ".day";
    assert!(matches!(
        TdxDecoder.decode(&req),
        Err(DecodeError::MissingSource(_))
    ));
}

// ── Minute ───────────────────────────────────────────────────────────

#[test]
fn minute_files_decode_with_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let mut buf = Vec::new();
    minute_record(&mut buf, 2024, 6, 3, 9 * 60 + 31, 10.07);
    minute_record(&mut buf, 2024, 6, 3, 15 * 60, 10.2);
    fs::write(dir.path().join("sh600000.01"), buf).unwrap();
    // other stream, same symbol
    fs::write(dir.path().join("sh600000.5"), [0u8; 32]).unwrap();

    let out = dir.path().join("1min.csv");
    let rows = TdxDecoder
        .decode(&DecodeRequest {
            source_dir: dir.path(),
            prefixes: &prefixes(),
            output: &out,
            suffix: ".01",
            since: None,
        })
        .unwrap();

    assert_eq!(rows, 2);
    let lines = read_lines(&out);
    assert_eq!(lines[0], "symbol,open,high,low,close,amount,volume,datetime");
    assert_eq!(
        lines[1],
        "sh600000,10.07,10.07,10.07,10.07,1234.5,300,2024-06-03 09:31:00"
    );
    assert!(lines[2].ends_with(",2024-06-03 15:00:00"));
}

// ── Corporate actions ────────────────────────────────────────────────

#[test]
fn gbbq_export_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("gbbq.txt");
    fs::write(
        &src,
        "market,code,date,category,c1,c2,c3,c4\n\
         1,600000,20240603,1,2.5,0,10,0\n\
         0,000001,20230115,5,100,200,150,250\n",
    )
    .unwrap();

    let records = read_gbbq_export(&src).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
    assert_eq!(records[1].code, "000001");

    let out = dir.path().join("gbbq.csv");
    let path = TdxDecoder.decode_corporate_actions(&src, &out).unwrap();
    let lines = read_lines(&path);
    assert_eq!(lines[0], "market,code,date,category,c1,c2,c3,c4");
    assert!(lines[1].starts_with("1,600000,2024-06-03,1,2.5,"));
    assert_eq!(lines.len(), 3);
}

#[test]
fn malformed_gbbq_line_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("gbbq.txt");
    fs::write(
        &src,
        "market,code,date,category,c1,c2,c3,c4\n1,600000,2024-06-03,1,0,0,0,0\n",
    )
    .unwrap();
    assert!(matches!(
        read_gbbq_export(&src),
        Err(DecodeError::MalformedAction { line: 2, .. })
    ));
}
