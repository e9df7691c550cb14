use crate::domain::{PricePoint, Stamp, Symbol};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// Trust level of a data layer. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Parquet archive files.
    Archival = 1,
    /// Same-day table, cleared every cycle.
    Staging = 2,
    /// Post-session raw table.
    Finalized = 3,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Archival, Tier::Staging, Tier::Finalized];

    pub fn priority(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Archival => "archival",
            Tier::Staging => "staging",
            Tier::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Accumulates tier-tagged rows and keeps the highest tier per key.
///
/// Rows from the same tier sharing a key keep the first one pushed.
#[derive(Debug)]
pub struct TierResolver<S: Stamp> {
    winners: BTreeMap<(Symbol, S), (Tier, PricePoint<S>)>,
}

impl<S: Stamp> Default for TierResolver<S> {
    fn default() -> Self {
        Self {
            winners: BTreeMap::new(),
        }
    }
}

impl<S: Stamp> TierResolver<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tier: Tier, row: PricePoint<S>) {
        match self.winners.entry(row.key()) {
            Entry::Vacant(slot) => {
                slot.insert((tier, row));
            }
            Entry::Occupied(mut slot) => {
                if tier > slot.get().0 {
                    slot.insert((tier, row));
                }
            }
        }
    }

    pub fn extend(&mut self, tier: Tier, rows: impl IntoIterator<Item = PricePoint<S>>) {
        for row in rows {
            self.push(tier, row);
        }
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }

    /// Winning rows ordered by `(symbol, stamp)`, each with its tier.
    pub fn into_tagged(self) -> Vec<(Tier, PricePoint<S>)> {
        self.winners.into_values().collect()
    }

    /// Winning rows ordered by `(symbol, stamp)`.
    pub fn finish(self) -> Vec<PricePoint<S>> {
        self.winners.into_values().map(|(_, row)| row).collect()
    }
}

/// One-shot resolution over whole layers.
pub fn resolve<S: Stamp>(
    layers: impl IntoIterator<Item = (Tier, Vec<PricePoint<S>>)>,
) -> Vec<PricePoint<S>> {
    let mut resolver = TierResolver::new();
    for (tier, rows) in layers {
        resolver.extend(tier, rows);
    }
    resolver.finish()
}
