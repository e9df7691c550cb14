//! Price points at daily and intraday granularity.

use super::symbol::Symbol;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Debug;
use std::hash::Hash;

/// Time key of a price stream: a calendar date for daily bars, a
/// timestamp for minute bars.
pub trait Stamp: Copy + Ord + Hash + Debug + Send + Sync + 'static {
    /// Column name used for this stamp in tables and CSV artifacts.
    const COLUMN: &'static str;

    /// strftime pattern of the text form, shared with the store's SQL.
    const FORMAT: &'static str;

    /// The calendar date the stamp falls on.
    fn trading_date(&self) -> NaiveDate;

    /// Text form used in CSV artifacts.
    fn to_text(&self) -> String;

    fn from_text(text: &str) -> Option<Self>;
}

impl Stamp for NaiveDate {
    const COLUMN: &'static str = "date";
    const FORMAT: &'static str = "%Y-%m-%d";

    fn trading_date(&self) -> NaiveDate {
        *self
    }

    fn to_text(&self) -> String {
        self.format(Self::FORMAT).to_string()
    }

    fn from_text(text: &str) -> Option<Self> {
        NaiveDate::parse_from_str(text.trim(), Self::FORMAT).ok()
    }
}

impl Stamp for NaiveDateTime {
    const COLUMN: &'static str = "datetime";
    const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    fn trading_date(&self) -> NaiveDate {
        self.date()
    }

    fn to_text(&self) -> String {
        self.format(Self::FORMAT).to_string()
    }

    fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        NaiveDateTime::parse_from_str(text, Self::FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
            .ok()
    }
}

/// One OHLC bar for a symbol. Immutable once imported.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint<S: Stamp = NaiveDate> {
    pub symbol: Symbol,
    pub stamp: S,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub amount: f64,
    pub volume: i64,
}

pub type DailyPoint = PricePoint<NaiveDate>;
pub type MinutePoint = PricePoint<NaiveDateTime>;

impl<S: Stamp> PricePoint<S> {
    /// Resolution key shared by every tier holding this row.
    pub fn key(&self) -> (Symbol, S) {
        (self.symbol.clone(), self.stamp)
    }

    /// CSV record in table column order:
    /// `symbol,open,high,low,close,amount,volume,<stamp>`.
    pub fn to_record(&self) -> [String; 8] {
        [
            self.symbol.to_string(),
            self.open.to_string(),
            self.high.to_string(),
            self.low.to_string(),
            self.close.to_string(),
            self.amount.to_string(),
            self.volume.to_string(),
            self.stamp.to_text(),
        ]
    }

    /// Header matching [`PricePoint::to_record`].
    pub fn header() -> [&'static str; 8] {
        [
            "symbol", "open", "high", "low", "close", "amount", "volume", S::COLUMN,
        ]
    }
}

impl DailyPoint {
    pub fn date(&self) -> NaiveDate {
        self.stamp
    }
}
