//! Civil-calendar helpers: which Saturday a date belongs to, week numbering
//! and season labels. All inputs are dates in the home timezone.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

/// Today's date in the home timezone, regardless of where the process runs.
pub fn home_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Saturday is its own week; Sunday through Friday look ahead to the next
/// Saturday. The result is then shifted by whole weeks. `None` when the
/// shift leaves chrono's date range.
pub fn relevant_saturday(today: NaiveDate, week_offset: i64) -> Option<NaiveDate> {
    let from_monday = i64::from(today.weekday().num_days_from_monday());
    let saturday = i64::from(Weekday::Sat.num_days_from_monday());
    let days_ahead = (saturday - from_monday).rem_euclid(7);
    let shift = week_offset.checked_mul(7)?.checked_add(days_ahead)?;
    let days = Days::new(shift.unsigned_abs());
    if shift >= 0 {
        today.checked_add_days(days)
    } else {
        today.checked_sub_days(days)
    }
}

pub fn week_number(saturday: NaiveDate, season_start: NaiveDate) -> u32 {
    let weeks = (saturday - season_start).num_days().div_euclid(7) + 1;
    u32::try_from(weeks.max(1)).unwrap_or(1)
}

/// Seasons flip in August: `2025-26` runs from August 2025 to July 2026.
pub fn season_label(today: NaiveDate) -> String {
    let start_year = if today.month() >= 8 {
        today.year()
    } else {
        today.year() - 1
    };
    format!("{}-{:02}", start_year, (start_year + 1).rem_euclid(100))
}
