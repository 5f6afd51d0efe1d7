//! Turns final scores into pick outcomes and fines.
//!
//! The engine is pure: it reads a week's fixtures, selections and already
//! cleared fines and returns what should be written. Callers persist the
//! result, replacing every uncleared fine for the week in one transaction.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::config::Config;
use crate::model::{Fine, Fixture, NewFine, Selection, SelectionResult};

pub const BOTH_ZERO_ZERO_REASON: &str = "Both games 0-0!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRules {
    pub goal_threshold: u32,
    pub zero_zero_fine: Decimal,
    pub one_goal_fine: Decimal,
    pub both_zero_zero_fine: Decimal,
}

impl SettlementRules {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            goal_threshold: cfg.goal_threshold,
            zero_zero_fine: cfg.zero_zero_fine,
            one_goal_fine: cfg.one_goal_fine,
            both_zero_zero_fine: cfg.both_zero_zero_fine,
        }
    }
}

impl Default for SettlementRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub selection_id: i64,
    pub result: SelectionResult,
    pub total_goals: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    pub outcomes: Vec<SelectionOutcome>,
    /// The complete set of uncleared fines the week should hold afterwards.
    pub fines: Vec<NewFine>,
    /// Selections left pending because their fixture is not final (or missing).
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FineKind {
    ZeroZero,
    OneGoal,
    BothZeroZero,
}

pub fn outcome_for(total_goals: u32, goal_threshold: u32) -> SelectionResult {
    if total_goals > goal_threshold {
        SelectionResult::Won
    } else {
        SelectionResult::Lost
    }
}

/// Settle one week. `selections` are processed in the order given, which
/// decides the fixture the both-zero-zero fine is attached to.
pub fn settle_week(
    week_id: i64,
    fixtures: &[Fixture],
    selections: &[Selection],
    cleared: &[Fine],
    rules: &SettlementRules,
) -> Settlement {
    let by_id: HashMap<i64, &Fixture> = fixtures.iter().map(|f| (f.id, f)).collect();

    let mut outcomes = Vec::new();
    let mut emitted: Vec<(FineKind, NewFine)> = Vec::new();
    let mut skipped = 0usize;
    // player -> zero-zero fixture ids, in first-seen player order
    let mut zero_zero: Vec<(String, Vec<i64>)> = Vec::new();

    for sel in selections.iter().filter(|s| s.week_id == week_id) {
        let Some(fixture) = by_id.get(&sel.fixture_id) else {
            skipped += 1;
            continue;
        };
        let Some((home, away, total_goals)) = fixture
            .final_score()
            .and_then(|(home, away)| home.checked_add(away).map(|t| (home, away, t)))
        else {
            skipped += 1;
            continue;
        };

        outcomes.push(SelectionOutcome {
            selection_id: sel.id,
            result: outcome_for(total_goals, rules.goal_threshold),
            total_goals,
        });

        match total_goals {
            0 => {
                emitted.push((
                    FineKind::ZeroZero,
                    NewFine {
                        week_id,
                        player_name: sel.player_name.clone(),
                        amount: rules.zero_zero_fine,
                        reason: format!("0-0: {} vs {}", fixture.home_team, fixture.away_team),
                        fixture_id: Some(fixture.id),
                    },
                ));
                match zero_zero.iter_mut().find(|(p, _)| *p == sel.player_name) {
                    Some((_, ids)) => ids.push(fixture.id),
                    None => zero_zero.push((sel.player_name.clone(), vec![fixture.id])),
                }
            }
            1 => emitted.push((
                FineKind::OneGoal,
                NewFine {
                    week_id,
                    player_name: sel.player_name.clone(),
                    amount: rules.one_goal_fine,
                    reason: format!(
                        "1 goal: {} {}-{} {}",
                        fixture.home_team, home, away, fixture.away_team
                    ),
                    fixture_id: Some(fixture.id),
                },
            )),
            _ => {}
        }
    }

    for (player, fixture_ids) in &zero_zero {
        if fixture_ids.len() < 2 {
            continue;
        }
        emitted.retain(|(kind, fine)| !(*kind == FineKind::ZeroZero && fine.player_name == *player));
        emitted.push((
            FineKind::BothZeroZero,
            NewFine {
                week_id,
                player_name: player.clone(),
                amount: rules.both_zero_zero_fine,
                reason: BOTH_ZERO_ZERO_REASON.to_string(),
                fixture_id: fixture_ids.first().copied(),
            },
        ));
    }

    // A fine already paid off must not come back on a later pass.
    let fines = emitted
        .into_iter()
        .map(|(_, fine)| fine)
        .filter(|fine| !cleared.iter().any(|c| c.cleared && fine.matches(c)))
        .collect();

    Settlement {
        outcomes,
        fines,
        skipped,
    }
}

/// Apply outcomes in memory, mirroring what the store writes.
pub fn apply_outcomes(selections: &mut [Selection], outcomes: &[SelectionOutcome]) {
    for outcome in outcomes {
        if let Some(sel) = selections.iter_mut().find(|s| s.id == outcome.selection_id) {
            sel.result = outcome.result;
            sel.total_goals = Some(outcome.total_goals);
        }
    }
}

/// A week is settled once it has selections and none of them is pending.
pub fn week_is_settled(selections: &[Selection]) -> bool {
    !selections.is_empty() && selections.iter().all(|s| s.result.is_resolved())
}
