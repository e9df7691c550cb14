use crate::domain::{CorporateAction, Symbol};
use std::collections::HashMap;

/// Corporate actions grouped by instrument code, each list sorted by date.
///
/// Built once per factor run and shared read-only by every worker.
#[derive(Debug, Default, Clone)]
pub struct ActionIndex {
    by_code: HashMap<String, Vec<CorporateAction>>,
}

impl ActionIndex {
    pub fn build(actions: impl IntoIterator<Item = CorporateAction>) -> Self {
        let mut by_code: HashMap<String, Vec<CorporateAction>> = HashMap::new();
        for action in actions {
            by_code.entry(action.code.clone()).or_default().push(action);
        }
        for list in by_code.values_mut() {
            list.sort_by_key(|a| a.date);
        }
        Self { by_code }
    }

    /// Actions for the symbol's instrument code; empty when it has none.
    pub fn for_symbol(&self, symbol: &Symbol) -> &[CorporateAction] {
        self.by_code
            .get(symbol.code())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn codes(&self) -> usize {
        self.by_code.len()
    }

    pub fn len(&self) -> usize {
        self.by_code.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionKind;
    use chrono::NaiveDate;

    fn action(code: &str, day: u32) -> CorporateAction {
        CorporateAction {
            code: code.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            kind: ActionKind::Other { category: 6 },
        }
    }

    #[test]
    fn lookup_uses_instrument_code_and_sorts() {
        let index = ActionIndex::build(vec![
            action("600000", 9),
            action("600000", 2),
            action("000001", 5),
        ]);
        let sh = Symbol::parse("sh600000").unwrap();
        let dates: Vec<u32> = index
            .for_symbol(&sh)
            .iter()
            .map(|a| chrono::Datelike::day(&a.date))
            .collect();
        assert_eq!(dates, vec![2, 9]);
        assert_eq!(index.codes(), 2);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn missing_symbol_yields_empty_slice() {
        let index = ActionIndex::default();
        let sym = Symbol::parse("bj920001").unwrap();
        assert!(index.for_symbol(&sym).is_empty());
    }
}
