use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use betting_overs::ledger::summarize;
use betting_overs::lifecycle::status_after_settlement;
use betting_overs::model::{
    Fine, Fixture, MatchStatus, NewFine, Selection, SelectionResult, Week, WeekStatus,
};
use betting_overs::settlement::{
    BOTH_ZERO_ZERO_REASON, SettlementRules, apply_outcomes, outcome_for, settle_week,
    week_is_settled,
};

const WEEK: i64 = 1;

fn ts(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 4, 14, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn fixture(id: i64, home: &str, away: &str, score: Option<(u32, u32)>, status: MatchStatus) -> Fixture {
    Fixture {
        id,
        external_id: 1000 + id,
        week_id: WEEK,
        home_team: home.to_string(),
        away_team: away.to_string(),
        league_id: 17,
        league_name: "Premier League".to_string(),
        kickoff: ts(0),
        home_score: score.map(|s| s.0),
        away_score: score.map(|s| s.1),
        match_status: status,
        created_at: ts(-3000),
    }
}

fn ft(id: i64, home: &str, away: &str, h: u32, a: u32) -> Fixture {
    fixture(id, home, away, Some((h, a)), MatchStatus::FullTime)
}

fn pick(id: i64, player: &str, fixture_id: i64) -> Selection {
    Selection {
        id,
        week_id: WEEK,
        player_name: player.to_string(),
        fixture_id,
        result: SelectionResult::Pending,
        total_goals: None,
        created_at: ts(-600 + id),
    }
}

fn stored(fines: &[NewFine], cleared: bool) -> Vec<Fine> {
    fines
        .iter()
        .enumerate()
        .map(|(i, f)| Fine {
            id: i as i64 + 1,
            week_id: f.week_id,
            player_name: f.player_name.clone(),
            amount: f.amount,
            reason: f.reason.clone(),
            fixture_id: f.fixture_id,
            cleared,
            created_at: ts(180),
        })
        .collect()
}

fn active_week() -> Week {
    Week {
        id: WEEK,
        week_number: 10,
        season: "2025-26".to_string(),
        saturday_date: ts(0).date_naive(),
        status: WeekStatus::Active,
        created_at: ts(-5000),
    }
}

#[test]
fn threshold_is_strictly_greater_than() {
    assert_eq!(outcome_for(3, 2), SelectionResult::Won);
    assert_eq!(outcome_for(2, 2), SelectionResult::Lost);
    assert_eq!(outcome_for(0, 2), SelectionResult::Lost);
    assert_eq!(outcome_for(3, 3), SelectionResult::Lost);
}

#[test]
fn tommy_zero_zero_and_one_goal_owes_seven() {
    let fixtures = vec![ft(1, "Everton", "Burnley", 0, 0), ft(2, "Hull City", "Stoke City", 1, 0)];
    let picks = vec![pick(1, "Tommy", 1), pick(2, "Tommy", 2)];

    let out = settle_week(WEEK, &fixtures, &picks, &[], &SettlementRules::default());

    assert_eq!(out.outcomes.len(), 2);
    assert!(out.outcomes.iter().all(|o| o.result == SelectionResult::Lost));
    assert_eq!(out.fines.len(), 2);
    assert_eq!(out.fines[0].amount, Decimal::new(5, 0));
    assert_eq!(out.fines[0].reason, "0-0: Everton vs Burnley");
    assert_eq!(out.fines[0].fixture_id, Some(1));
    assert_eq!(out.fines[1].amount, Decimal::new(2, 0));
    assert_eq!(out.fines[1].reason, "1 goal: Hull City 1-0 Stoke City");

    let summary = summarize(&stored(&out.fines, false));
    assert_eq!(summary["Tommy"].outstanding, Decimal::new(7, 0));
}

#[test]
fn mikey_double_zero_zero_collapses_into_one_fine() {
    let fixtures = vec![ft(1, "Everton", "Burnley", 0, 0), ft(2, "Barrow", "Notts County", 0, 0)];
    let picks = vec![pick(1, "Mikey", 1), pick(2, "Mikey", 2), pick(3, "Kezza", 1)];

    let out = settle_week(WEEK, &fixtures, &picks, &[], &SettlementRules::default());

    let mikey: Vec<&NewFine> = out.fines.iter().filter(|f| f.player_name == "Mikey").collect();
    assert_eq!(mikey.len(), 1);
    assert_eq!(mikey[0].amount, Decimal::new(20, 0));
    assert_eq!(mikey[0].reason, BOTH_ZERO_ZERO_REASON);
    assert_eq!(mikey[0].fixture_id, Some(1));

    // Kezza only had one goalless pick and keeps the base fine.
    let kezza: Vec<&NewFine> = out.fines.iter().filter(|f| f.player_name == "Kezza").collect();
    assert_eq!(kezza.len(), 1);
    assert_eq!(kezza[0].amount, Decimal::new(5, 0));
}

#[test]
fn unfinished_or_scoreless_fixtures_stay_pending() {
    let fixtures = vec![
        fixture(1, "A", "B", None, MatchStatus::NotStarted),
        fixture(2, "C", "D", Some((2, 0)), MatchStatus::InProgress),
        // Claimed final but a score is missing: never read as 0-0.
        Fixture {
            away_score: None,
            ..ft(3, "E", "F", 0, 0)
        },
        fixture(4, "G", "H", None, MatchStatus::Postponed),
    ];
    let picks = vec![pick(1, "Krissy", 1), pick(2, "Krissy", 2), pick(3, "Tommy", 3), pick(4, "Tommy", 4)];

    let out = settle_week(WEEK, &fixtures, &picks, &[], &SettlementRules::default());
    assert!(out.outcomes.is_empty());
    assert!(out.fines.is_empty());
    assert_eq!(out.skipped, 4);
}

#[test]
fn goal_rich_fixtures_win_without_fines() {
    let fixtures = vec![
        ft(1, "A", "B", 3, 1),
        fixture(2, "C", "D", Some((2, 2)), MatchStatus::AfterExtraTime),
        ft(3, "E", "F", 1, 1),
    ];
    let picks = vec![pick(1, "Kezza", 1), pick(2, "Kezza", 2), pick(3, "Mikey", 3)];
    let out = settle_week(WEEK, &fixtures, &picks, &[], &SettlementRules::default());

    let results: Vec<(i64, SelectionResult, u32)> = out
        .outcomes
        .iter()
        .map(|o| (o.selection_id, o.result, o.total_goals))
        .collect();
    assert_eq!(
        results,
        vec![
            (1, SelectionResult::Won, 4),
            (2, SelectionResult::Won, 4),
            (3, SelectionResult::Lost, 2),
        ]
    );
    assert!(out.fines.is_empty());
}

#[test]
fn every_selection_on_a_goalless_fixture_is_fined_once() {
    let fixtures = vec![ft(1, "A", "B", 0, 0), ft(2, "C", "D", 1, 0)];
    let picks = vec![
        pick(1, "Kezza", 1),
        pick(2, "Mikey", 1),
        pick(3, "Krissy", 2),
        pick(4, "Tommy", 2),
    ];
    let out = settle_week(WEEK, &fixtures, &picks, &[], &SettlementRules::default());
    let zero_zero = out.fines.iter().filter(|f| f.amount == Decimal::new(5, 0)).count();
    let one_goal = out.fines.iter().filter(|f| f.amount == Decimal::new(2, 0)).count();
    assert_eq!((zero_zero, one_goal), (2, 2));
}

#[test]
fn settling_twice_gives_the_same_result() {
    let fixtures = vec![ft(1, "A", "B", 0, 0), ft(2, "C", "D", 1, 0), ft(3, "E", "F", 0, 0)];
    let picks = vec![pick(1, "Tommy", 1), pick(2, "Tommy", 2), pick(3, "Mikey", 1), pick(4, "Mikey", 3)];
    let rules = SettlementRules::default();

    let first = settle_week(WEEK, &fixtures, &picks, &[], &rules);
    let mut settled = picks.clone();
    apply_outcomes(&mut settled, &first.outcomes);
    let second = settle_week(WEEK, &fixtures, &settled, &[], &rules);

    assert_eq!(first, second);
}

#[test]
fn cleared_fines_are_not_recreated() {
    let fixtures = vec![ft(1, "A", "B", 0, 0), ft(2, "C", "D", 1, 0)];
    let picks = vec![pick(1, "Tommy", 1), pick(2, "Tommy", 2)];
    let rules = SettlementRules::default();

    let first = settle_week(WEEK, &fixtures, &picks, &[], &rules);
    // Tommy pays the zero-zero fine only.
    let mut history = stored(&first.fines, false);
    history[0].cleared = true;
    let cleared: Vec<Fine> = history.iter().filter(|f| f.cleared).cloned().collect();

    let second = settle_week(WEEK, &fixtures, &picks, &cleared, &rules);
    assert_eq!(second.fines.len(), 1);
    assert_eq!(second.fines[0].amount, Decimal::new(2, 0));
}

#[test]
fn double_zero_zero_spans_passes() {
    let rules = SettlementRules::default();
    let picks = vec![pick(1, "Mikey", 1), pick(2, "Mikey", 2)];

    let saturday = vec![ft(1, "A", "B", 0, 0), fixture(2, "C", "D", None, MatchStatus::NotStarted)];
    let first = settle_week(WEEK, &saturday, &picks, &[], &rules);
    assert_eq!(first.fines.len(), 1);
    assert_eq!(first.fines[0].amount, Decimal::new(5, 0));

    let sunday = vec![ft(1, "A", "B", 0, 0), ft(2, "C", "D", 0, 0)];
    let second = settle_week(WEEK, &sunday, &picks, &[], &rules);
    assert_eq!(second.fines.len(), 1);
    assert_eq!(second.fines[0].reason, BOTH_ZERO_ZERO_REASON);
}

#[test]
fn custom_rules_change_amounts_and_threshold() {
    let rules = SettlementRules {
        goal_threshold: 3,
        zero_zero_fine: Decimal::new(250, 2),
        one_goal_fine: Decimal::new(1, 0),
        both_zero_zero_fine: Decimal::new(10, 0),
    };
    let fixtures = vec![ft(1, "A", "B", 2, 1), ft(2, "C", "D", 0, 0)];
    let picks = vec![pick(1, "Kezza", 1), pick(2, "Kezza", 2)];
    let out = settle_week(WEEK, &fixtures, &picks, &[], &rules);
    assert_eq!(out.outcomes[0].result, SelectionResult::Lost);
    assert_eq!(out.fines.len(), 1);
    assert_eq!(out.fines[0].amount, Decimal::new(25, 1));
}

#[test]
fn week_completes_only_when_the_last_pick_resolves() {
    let players = ["Kezza", "Mikey", "Krissy", "Tommy"];
    let mut fixtures: Vec<Fixture> = (1..=8).map(|id| ft(id, "H", "A", 2, 1)).collect();
    fixtures[7] = fixture(8, "H", "A", None, MatchStatus::InProgress);
    let picks: Vec<Selection> = (1..=8)
        .map(|id| pick(id, players[((id - 1) / 2) as usize], id))
        .collect();
    let rules = SettlementRules::default();
    let week = active_week();

    let out = settle_week(WEEK, &fixtures, &picks, &[], &rules);
    let mut settled = picks.clone();
    apply_outcomes(&mut settled, &out.outcomes);
    assert_eq!(out.outcomes.len(), 7);
    assert!(!week_is_settled(&settled));
    assert_eq!(status_after_settlement(&week, &settled), WeekStatus::Active);

    fixtures[7] = ft(8, "H", "A", 3, 0);
    let out = settle_week(WEEK, &fixtures, &settled, &[], &rules);
    apply_outcomes(&mut settled, &out.outcomes);
    assert!(week_is_settled(&settled));
    assert_eq!(status_after_settlement(&week, &settled), WeekStatus::Completed);
}

#[test]
fn empty_week_never_completes() {
    assert!(!week_is_settled(&[]));
    assert_eq!(status_after_settlement(&active_week(), &[]), WeekStatus::Active);
}

#[test]
fn overflowing_scores_leave_the_pick_pending() {
    let fixtures = vec![ft(1, "A", "B", u32::MAX, 1), ft(2, "C", "D", 0, 0)];
    let picks = vec![pick(1, "Tommy", 1), pick(2, "Tommy", 2)];
    let out = settle_week(WEEK, &fixtures, &picks, &[], &SettlementRules::default());

    assert_eq!(out.skipped, 1);
    assert_eq!(out.outcomes.len(), 1);
    assert_eq!(out.outcomes[0].selection_id, 2);
    assert_eq!(out.fines.len(), 1);
    assert_eq!(out.fines[0].fixture_id, Some(2));
}
