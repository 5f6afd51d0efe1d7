use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::ledger::summarize;
use crate::model::{Fine, Selection, SelectionResult, Week};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    pub player_name: String,
    pub total_selections: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    /// Rounded percentage of resolved picks that won.
    pub win_rate: u32,
    pub total_fines: Decimal,
    pub outstanding_fines: Decimal,
    pub cleared_fines: Decimal,
    pub current_streak: usize,
    pub best_streak: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultCounts {
    pub won: usize,
    pub lost: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekBreakdown {
    pub week: Week,
    pub player_results: BTreeMap<String, ResultCounts>,
    pub fines_total: Decimal,
}

/// `selections` must be in submission order for streaks to be meaningful.
pub fn player_stats(player: &str, selections: &[Selection], fines: &[Fine]) -> PlayerStats {
    let picks: Vec<&Selection> = selections
        .iter()
        .filter(|s| s.player_name == player)
        .collect();

    let wins = picks.iter().filter(|s| s.result == SelectionResult::Won).count();
    let losses = picks.iter().filter(|s| s.result == SelectionResult::Lost).count();
    let pending = picks.len() - wins - losses;

    let resolved: Vec<SelectionResult> = picks
        .iter()
        .map(|s| s.result)
        .filter(|r| r.is_resolved())
        .collect();
    let mut best_streak = 0usize;
    let mut run = 0usize;
    for result in &resolved {
        if *result == SelectionResult::Won {
            run += 1;
            best_streak = best_streak.max(run);
        } else {
            run = 0;
        }
    }
    let current_streak = resolved
        .iter()
        .rev()
        .take_while(|r| **r == SelectionResult::Won)
        .count();

    let win_rate = if picks.is_empty() {
        0
    } else {
        let resolved_count = (wins + losses).max(1) as f64;
        ((wins as f64 / resolved_count) * 100.0).round() as u32
    };

    let player_fines: Vec<Fine> = fines
        .iter()
        .filter(|f| f.player_name == player)
        .cloned()
        .collect();
    let totals = summarize(&player_fines)
        .remove(player)
        .unwrap_or_default();

    PlayerStats {
        player_name: player.to_string(),
        total_selections: picks.len(),
        wins,
        losses,
        pending,
        win_rate,
        total_fines: totals.total,
        outstanding_fines: totals.outstanding,
        cleared_fines: totals.cleared,
        current_streak,
        best_streak,
    }
}

/// Per-week tallies, in the order `weeks` is given.
pub fn weekly_breakdown(
    weeks: &[Week],
    selections: &[Selection],
    fines: &[Fine],
) -> Vec<WeekBreakdown> {
    weeks
        .iter()
        .map(|week| {
            let mut player_results: BTreeMap<String, ResultCounts> = BTreeMap::new();
            for sel in selections.iter().filter(|s| s.week_id == week.id) {
                let counts = player_results.entry(sel.player_name.clone()).or_default();
                match sel.result {
                    SelectionResult::Won => counts.won += 1,
                    SelectionResult::Lost => counts.lost += 1,
                    SelectionResult::Pending => counts.pending += 1,
                }
            }
            let fines_total = fines
                .iter()
                .filter(|f| f.week_id == week.id)
                .map(|f| f.amount)
                .sum();
            WeekBreakdown {
                week: week.clone(),
                player_results,
                fines_total,
            }
        })
        .collect()
}
