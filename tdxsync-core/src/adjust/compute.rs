use crate::domain::{AdjustmentFactor, CorporateAction, DailyPoint, Symbol};
use chrono::NaiveDate;
use thiserror::Error;

/// Data-quality faults that stop factor computation for one symbol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorError {
    #[error("{symbol}: no daily history")]
    EmptyHistory { symbol: Symbol },

    #[error("{symbol}: row for {date} follows later date {previous}")]
    OutOfOrder {
        symbol: Symbol,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("{symbol}: duplicate daily row for {date}")]
    DuplicateDate { symbol: Symbol, date: NaiveDate },

    #[error("{symbol}: close {close} on {date} is not a positive number")]
    InvalidClose {
        symbol: Symbol,
        date: NaiveDate,
        close: f64,
    },

    #[error("{symbol}: ex-rights action on {date} yields no positive previous close")]
    InvalidAction { symbol: Symbol, date: NaiveDate },
}

/// Compute one [`AdjustmentFactor`] per daily row, in input order.
///
/// `history` must be strictly ascending by date. `actions` are the
/// instrument's corporate actions sorted by date; only ex-rights events
/// affect the result. An action dated on a non-trading day applies to the
/// next trading row after it. Actions on or before the first row are
/// ignored since there is no prior close to adjust.
pub fn compute_factors(
    symbol: &Symbol,
    history: &[DailyPoint],
    actions: &[CorporateAction],
) -> Result<Vec<AdjustmentFactor>, FactorError> {
    let first = history.first().ok_or_else(|| FactorError::EmptyHistory {
        symbol: symbol.clone(),
    })?;
    validate(symbol, history)?;

    let mut pending = actions
        .iter()
        .filter(|a| a.date > first.stamp)
        .filter_map(|a| a.ex_rights().map(|x| (a.date, x)))
        .peekable();

    let mut pre_closes = Vec::with_capacity(history.len());
    let mut hfq = Vec::with_capacity(history.len());
    pre_closes.push(first.close);
    hfq.push(1.0_f64);

    for pair in history.windows(2) {
        let (prev, row) = (&pair[0], &pair[1]);
        let mut pre_close = prev.close;
        while let Some((date, x)) = pending.next_if(|(date, _)| *date <= row.stamp) {
            pre_close = x
                .pre_close(pre_close)
                .ok_or_else(|| FactorError::InvalidAction {
                    symbol: symbol.clone(),
                    date,
                })?;
        }
        let last = hfq[hfq.len() - 1];
        hfq.push(last * prev.close / pre_close);
        pre_closes.push(pre_close);
    }

    let latest = hfq[hfq.len() - 1];
    Ok(history
        .iter()
        .zip(pre_closes)
        .zip(hfq)
        .map(|((row, pre_close), hfq_factor)| AdjustmentFactor {
            symbol: symbol.clone(),
            date: row.stamp,
            close: row.close,
            pre_close,
            qfq_factor: hfq_factor / latest,
            hfq_factor,
        })
        .collect())
}

fn validate(symbol: &Symbol, history: &[DailyPoint]) -> Result<(), FactorError> {
    for (i, row) in history.iter().enumerate() {
        if !row.close.is_finite() || row.close <= 0.0 {
            return Err(FactorError::InvalidClose {
                symbol: symbol.clone(),
                date: row.stamp,
                close: row.close,
            });
        }
        if i == 0 {
            continue;
        }
        let previous = history[i - 1].stamp;
        if row.stamp == previous {
            return Err(FactorError::DuplicateDate {
                symbol: symbol.clone(),
                date: row.stamp,
            });
        }
        if row.stamp < previous {
            return Err(FactorError::OutOfOrder {
                symbol: symbol.clone(),
                previous,
                date: row.stamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionKind, ExRights};

    fn sym() -> Symbol {
        Symbol::parse("sz000001").unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn bar(d: u32, close: f64) -> DailyPoint {
        DailyPoint {
            symbol: sym(),
            stamp: day(d),
            open: close,
            high: close,
            low: close,
            close,
            amount: 0.0,
            volume: 0,
        }
    }

    fn dividend(d: u32, cash: f64) -> CorporateAction {
        CorporateAction {
            code: "000001".into(),
            date: day(d),
            kind: ActionKind::ExRights(ExRights {
                cash_dividend: cash,
                rights_price: 0.0,
                bonus_shares: 0.0,
                rights_shares: 0.0,
            }),
        }
    }

    #[test]
    fn weekend_action_rolls_to_next_row() {
        // Action on the 9th (Saturday) lands on Monday the 11th.
        let history = vec![bar(8, 10.0), bar(11, 9.0)];
        let f = compute_factors(&sym(), &history, &[dividend(9, 10.0)]).unwrap();
        assert!((f[1].pre_close - 9.0).abs() < 1e-12);
        assert!((f[1].hfq_factor - 10.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn actions_before_first_row_are_ignored() {
        let history = vec![bar(4, 10.0), bar(5, 10.0)];
        let f = compute_factors(&sym(), &history, &[dividend(1, 5.0), dividend(4, 5.0)]).unwrap();
        assert_eq!(f[1].pre_close, 10.0);
        assert_eq!(f[1].hfq_factor, 1.0);
    }

    #[test]
    fn non_ex_rights_actions_do_not_adjust() {
        let history = vec![bar(4, 10.0), bar(5, 10.0)];
        let other = CorporateAction {
            code: "000001".into(),
            date: day(5),
            kind: ActionKind::Other { category: 6 },
        };
        let f = compute_factors(&sym(), &history, &[other]).unwrap();
        assert_eq!(f[1].hfq_factor, 1.0);
    }

    #[test]
    fn two_actions_on_one_row_compound() {
        let history = vec![bar(4, 10.0), bar(5, 8.0)];
        let f = compute_factors(&sym(), &history, &[dividend(5, 10.0), dividend(5, 10.0)])
            .unwrap();
        assert!((f[1].pre_close - 8.0).abs() < 1e-12);
    }

    #[test]
    fn impossible_action_is_a_fault() {
        let history = vec![bar(4, 1.0), bar(5, 1.0)];
        let err = compute_factors(&sym(), &history, &[dividend(5, 50.0)]).unwrap_err();
        assert!(matches!(err, FactorError::InvalidAction { .. }));
    }
}
