use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::Fine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FineTotals {
    pub total: Decimal,
    pub outstanding: Decimal,
    pub cleared: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearSelector {
    Ids(Vec<i64>),
    Player(String),
    All,
}

pub fn summarize(fines: &[Fine]) -> BTreeMap<String, FineTotals> {
    let mut out: BTreeMap<String, FineTotals> = BTreeMap::new();
    for fine in fines {
        let entry = out.entry(fine.player_name.clone()).or_default();
        entry.total += fine.amount;
        if fine.cleared {
            entry.cleared += fine.amount;
        } else {
            entry.outstanding += fine.amount;
        }
    }
    out
}

/// Ids of the currently uncleared fines the selector would clear.
pub fn fines_to_clear(fines: &[Fine], selector: &ClearSelector) -> Vec<i64> {
    fines
        .iter()
        .filter(|f| !f.cleared)
        .filter(|f| match selector {
            ClearSelector::Ids(ids) => ids.contains(&f.id),
            ClearSelector::Player(player) => f.player_name == *player,
            ClearSelector::All => true,
        })
        .map(|f| f.id)
        .collect()
}

/// Clearing only ever flips `cleared` to true. Returns how many changed.
pub fn apply_clear(fines: &mut [Fine], selector: &ClearSelector) -> usize {
    let ids = fines_to_clear(fines, selector);
    let mut changed = 0usize;
    for fine in fines.iter_mut().filter(|f| ids.contains(&f.id)) {
        fine.cleared = true;
        changed += 1;
    }
    changed
}

/// Amounts may arrive as "5", "5.00", "£5" or " 2.5 ".
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '£' | '$' | '€' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .ok()
        .map(|d| d.normalize())
}

pub fn format_amount(amount: Decimal) -> String {
    format!("£{:.2}", amount)
}
