//! Corporate actions (the vendor's share-capital export, "gbbq").

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category code for ex-rights / ex-dividend events.
pub const EX_RIGHTS_CATEGORY: i32 = 1;

/// Categories whose columns describe share-capital changes
/// (float and total counts before/after).
pub const SHARE_CHANGE_CATEGORIES: [i32; 8] = [2, 3, 4, 5, 7, 8, 9, 10];

/// One row of the normalized share-capital export, as stored in
/// `raw_gbbq`. The meaning of `c1..c4` depends on `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbbqRecord {
    pub market: i32,
    pub code: String,
    pub date: NaiveDate,
    pub category: i32,
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    pub c4: f64,
}

/// Ratios of an ex-rights / ex-dividend event, all per 10 shares held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExRights {
    pub cash_dividend: f64,
    pub rights_price: f64,
    pub bonus_shares: f64,
    pub rights_shares: f64,
}

impl ExRights {
    /// Theoretical previous close after this event:
    /// `(prev*10 - cash + rights_shares*rights_price) / (10 + rights_shares + bonus_shares)`.
    ///
    /// `None` when the ratios cannot produce a positive finite price.
    pub fn pre_close(&self, prev_close: f64) -> Option<f64> {
        let denominator = 10.0 + self.rights_shares + self.bonus_shares;
        if denominator <= 0.0 {
            return None;
        }
        let value = (prev_close * 10.0 - self.cash_dividend
            + self.rights_shares * self.rights_price)
            / denominator;
        (value.is_finite() && value > 0.0).then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    ExRights(ExRights),
    ShareChange {
        category: i32,
        pre_float: f64,
        pre_total: f64,
        post_float: f64,
        post_total: f64,
    },
    /// Carried through but not interpreted.
    Other { category: i32 },
}

/// A corporate action keyed by instrument code (symbol minus exchange).
#[derive(Debug, Clone, PartialEq)]
pub struct CorporateAction {
    pub code: String,
    pub date: NaiveDate,
    pub kind: ActionKind,
}

impl CorporateAction {
    pub fn from_record(record: &GbbqRecord) -> Self {
        let kind = match record.category {
            EX_RIGHTS_CATEGORY => ActionKind::ExRights(ExRights {
                cash_dividend: record.c1,
                rights_price: record.c2,
                bonus_shares: record.c3,
                rights_shares: record.c4,
            }),
            c if SHARE_CHANGE_CATEGORIES.contains(&c) => ActionKind::ShareChange {
                category: c,
                pre_float: record.c1,
                pre_total: record.c2,
                post_float: record.c3,
                post_total: record.c4,
            },
            c => ActionKind::Other { category: c },
        };
        Self {
            code: record.code.clone(),
            date: record.date,
            kind,
        }
    }

    pub fn category(&self) -> i32 {
        match &self.kind {
            ActionKind::ExRights(_) => EX_RIGHTS_CATEGORY,
            ActionKind::ShareChange { category, .. } | ActionKind::Other { category } => {
                *category
            }
        }
    }

    pub fn ex_rights(&self) -> Option<&ExRights> {
        match &self.kind {
            ActionKind::ExRights(x) => Some(x),
            _ => None,
        }
    }
}
