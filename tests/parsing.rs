use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::London;

use betting_overs::model::MatchStatus;
use betting_overs::provider::filter_matchday;
use betting_overs::sofascore::{parse_event_json, parse_scheduled_events_json};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_scheduled_events_fixture() {
    let raw = read_fixture("sofascore_scheduled_events.json");
    let rows = parse_scheduled_events_json(&raw).expect("fixture should parse");
    // The event without a home team is dropped.
    assert_eq!(rows.len(), 5);

    let arsenal = &rows[0];
    assert_eq!(arsenal.external_id, 13001);
    assert_eq!(arsenal.league_id, 17);
    assert_eq!(arsenal.league_name, "Premier League");
    assert_eq!(arsenal.home_team, "Arsenal");
    assert_eq!(arsenal.away_team, "Fulham");
    assert_eq!(arsenal.home_score, Some(2));
    assert_eq!(arsenal.away_score, Some(1));
    assert_eq!(arsenal.status, MatchStatus::FullTime);
    assert_eq!(
        arsenal.kickoff,
        Utc.with_ymd_and_hms(2025, 10, 4, 14, 0, 0).unwrap()
    );
}

#[test]
fn missing_scores_stay_missing() {
    let raw = read_fixture("sofascore_scheduled_events.json");
    let rows = parse_scheduled_events_json(&raw).expect("fixture should parse");
    let leeds = rows.iter().find(|r| r.external_id == 13002).unwrap();
    assert_eq!(leeds.home_score, None);
    assert_eq!(leeds.away_score, None);
    assert_eq!(leeds.status, MatchStatus::NotStarted);
}

#[test]
fn penalties_are_a_final_status() {
    let raw = read_fixture("sofascore_scheduled_events.json");
    let rows = parse_scheduled_events_json(&raw).expect("fixture should parse");
    let cup = rows.iter().find(|r| r.external_id == 13005).unwrap();
    assert_eq!(cup.status, MatchStatus::Penalties);
    assert!(cup.status.is_complete());
    assert_eq!((cup.home_score, cup.away_score), (Some(1), Some(1)));
}

#[test]
fn matchday_filter_keeps_tracked_three_pm_kickoffs() {
    let raw = read_fixture("sofascore_scheduled_events.json");
    let rows = parse_scheduled_events_json(&raw).expect("fixture should parse");
    let date = NaiveDate::from_ymd_opt(2025, 10, 4).unwrap();
    let kickoff = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
    let kept: Vec<i64> = filter_matchday(rows, date, kickoff, London)
        .iter()
        .map(|f| f.external_id)
        .collect();
    assert_eq!(kept, vec![13001, 13002, 13005]);
}

#[test]
fn matchday_filter_respects_the_date() {
    let raw = read_fixture("sofascore_scheduled_events.json");
    let rows = parse_scheduled_events_json(&raw).expect("fixture should parse");
    let sunday = NaiveDate::from_ymd_opt(2025, 10, 5).unwrap();
    let kickoff = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
    assert!(filter_matchday(rows, sunday, kickoff, London).is_empty());
}

#[test]
fn parses_single_event_fixture() {
    let raw = read_fixture("sofascore_event.json");
    let event = parse_event_json(&raw)
        .expect("fixture should parse")
        .expect("event should be present");
    assert_eq!(event.external_id, 13002);
    assert_eq!(event.status, MatchStatus::HalfTime);
    assert_eq!((event.home_score, event.away_score), (Some(0), Some(1)));
}

#[test]
fn null_payloads_are_empty() {
    assert!(parse_scheduled_events_json("null").unwrap().is_empty());
    assert!(parse_scheduled_events_json("  ").unwrap().is_empty());
    assert!(parse_event_json("null").unwrap().is_none());
    assert!(parse_event_json(r#"{"event": null}"#).unwrap().is_none());
}

#[test]
fn garbage_is_an_error() {
    assert!(parse_scheduled_events_json("<html>blocked</html>").is_err());
    assert!(parse_event_json("{").is_err());
}
