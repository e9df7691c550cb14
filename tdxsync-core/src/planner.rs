//! Date gap planning for incremental syncs.
//!
//! Trading-day status is unknown until the download source answers, so the
//! plan is every calendar date in the gap. Weekends and holidays are
//! filtered later, when the source reports them as not applicable.

use chrono::NaiveDate;

/// Every calendar date strictly after `last_synced` up to and including
/// `today`, ascending. Empty when `last_synced >= today`.
pub fn plan(last_synced: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    if last_synced >= today {
        return Vec::new();
    }
    last_synced
        .iter_days()
        .skip(1)
        .take_while(|d| *d <= today)
        .collect()
}
