use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::Config;
use crate::error::{TrackerError, TrackerResult};
use crate::model::{Selection, Week, WeekStatus};
use crate::settlement::week_is_settled;

/// Day on which results checking is held back until the cutoff hour.
pub const GATED_DAY: Weekday = Weekday::Sat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsGate {
    Open,
    Locked { opens_at: DateTime<Tz> },
}

impl ResultsGate {
    pub fn is_open(self) -> bool {
        matches!(self, ResultsGate::Open)
    }
}

/// Checking is held back on matchday until the cutoff hour; every other
/// day stays open for late or administrative re-checks.
pub fn results_gate(now: DateTime<Utc>, tz: Tz, cutoff_hour: u32) -> ResultsGate {
    let local = now.with_timezone(&tz);
    if local.weekday() != GATED_DAY {
        return ResultsGate::Open;
    }
    let Some(cutoff) = local.date_naive().and_hms_opt(cutoff_hour, 0, 0) else {
        return ResultsGate::Open;
    };
    let opens_at = tz.from_local_datetime(&cutoff).earliest().unwrap_or(local);
    if local >= opens_at {
        ResultsGate::Open
    } else {
        ResultsGate::Locked { opens_at }
    }
}

/// Remaining wait before fixtures may be refetched, measured from the most
/// recent fixture row created for the week.
pub fn refresh_cooldown_remaining(
    now: DateTime<Utc>,
    last_fixture_created: Option<DateTime<Utc>>,
    cooldown: Duration,
) -> Option<Duration> {
    let last = last_fixture_created?;
    let elapsed = now - last;
    if elapsed >= cooldown {
        None
    } else {
        Some(cooldown - elapsed)
    }
}

/// Preconditions for a player's pick submission. `week_fixture_ids` are the
/// fixture ids stored for the target week.
pub fn validate_submission(
    cfg: &Config,
    week: Option<&Week>,
    week_fixture_ids: &[i64],
    player: &str,
    fixture_ids: &[i64],
) -> TrackerResult<()> {
    if !cfg.is_player(player) {
        return Err(TrackerError::validation(format!(
            "invalid player name, must be one of: {}",
            cfg.players.join(", ")
        )));
    }
    if fixture_ids.len() != cfg.selections_per_player {
        return Err(TrackerError::validation(format!(
            "must select exactly {} fixtures",
            cfg.selections_per_player
        )));
    }
    let unique: HashSet<i64> = fixture_ids.iter().copied().collect();
    if unique.len() != fixture_ids.len() {
        return Err(TrackerError::validation("the same fixture was picked twice"));
    }
    match week {
        Some(w) if w.is_active() => {}
        _ => {
            return Err(TrackerError::validation(
                "week not found or already completed",
            ));
        }
    }
    if let Some(missing) = fixture_ids.iter().find(|id| !week_fixture_ids.contains(id)) {
        return Err(TrackerError::validation(format!(
            "fixture {missing} is not part of this week"
        )));
    }
    Ok(())
}

/// True once every rostered player holds a full set of picks.
pub fn all_players_submitted(cfg: &Config, selections: &[Selection]) -> bool {
    cfg.players.iter().all(|player| {
        selections.iter().filter(|s| s.player_name == *player).count()
            >= cfg.selections_per_player
    })
}

/// Status a week should hold after its selections were settled. Completed
/// is terminal.
pub fn status_after_settlement(week: &Week, selections: &[Selection]) -> WeekStatus {
    if week.status == WeekStatus::Completed || week_is_settled(selections) {
        WeekStatus::Completed
    } else {
        WeekStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Europe::London;

    fn week(status: WeekStatus) -> Week {
        Week {
            id: 7,
            week_number: 10,
            season: "2025-26".to_string(),
            saturday_date: NaiveDate::from_ymd_opt(2025, 10, 4).unwrap(),
            status,
            created_at: Utc.with_ymd_and_hms(2025, 9, 29, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn saturday_gate_opens_at_cutoff_local_time() {
        // 15:59 UTC is 16:59 BST.
        let before = Utc.with_ymd_and_hms(2025, 10, 4, 15, 59, 0).unwrap();
        match results_gate(before, London, 17) {
            ResultsGate::Locked { opens_at } => {
                assert_eq!(opens_at.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 10, 4, 16, 0, 0).unwrap());
            }
            ResultsGate::Open => panic!("expected locked gate"),
        }
        let after = Utc.with_ymd_and_hms(2025, 10, 4, 16, 0, 0).unwrap();
        assert!(results_gate(after, London, 17).is_open());
    }

    #[test]
    fn gate_is_open_on_other_days() {
        let friday = Utc.with_ymd_and_hms(2025, 10, 3, 9, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2025, 10, 5, 9, 0, 0).unwrap();
        assert!(results_gate(friday, London, 17).is_open());
        assert!(results_gate(sunday, London, 17).is_open());
    }

    #[test]
    fn cooldown_reports_remaining_wait() {
        let created = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
        let now = created + Duration::minutes(20);
        assert_eq!(
            refresh_cooldown_remaining(now, Some(created), Duration::hours(1)),
            Some(Duration::minutes(40))
        );
        assert_eq!(
            refresh_cooldown_remaining(created + Duration::hours(1), Some(created), Duration::hours(1)),
            None
        );
        assert_eq!(refresh_cooldown_remaining(now, None, Duration::hours(1)), None);
    }

    #[test]
    fn submission_preconditions() {
        let cfg = Config::default();
        let active = week(WeekStatus::Active);
        let fixtures = [1, 2, 3];
        assert!(validate_submission(&cfg, Some(&active), &fixtures, "Tommy", &[1, 2]).is_ok());
        assert!(validate_submission(&cfg, Some(&active), &fixtures, "Bob", &[1, 2]).is_err());
        assert!(validate_submission(&cfg, Some(&active), &fixtures, "Tommy", &[1]).is_err());
        assert!(validate_submission(&cfg, Some(&active), &fixtures, "Tommy", &[1, 1]).is_err());
        assert!(validate_submission(&cfg, Some(&active), &fixtures, "Tommy", &[1, 9]).is_err());
        let done = week(WeekStatus::Completed);
        assert!(validate_submission(&cfg, Some(&done), &fixtures, "Tommy", &[1, 2]).is_err());
        assert!(validate_submission(&cfg, None, &fixtures, "Tommy", &[1, 2]).is_err());
    }

    #[test]
    fn completed_is_terminal() {
        let done = week(WeekStatus::Completed);
        assert_eq!(status_after_settlement(&done, &[]), WeekStatus::Completed);
        let active = week(WeekStatus::Active);
        assert_eq!(status_after_settlement(&active, &[]), WeekStatus::Active);
    }
}
