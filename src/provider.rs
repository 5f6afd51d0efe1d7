use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::model::MatchStatus;

/// Tournaments offered for picks, keyed by SofaScore unique-tournament id.
pub const TRACKED_LEAGUES: &[(i64, &str)] = &[
    // Cups
    (19, "FA Cup"),
    (347, "Scottish Cup"),
    // England
    (17, "Premier League"),
    (18, "Championship"),
    (24, "League One"),
    (25, "League Two"),
    (173, "National League"),
    // Scotland
    (36, "Scottish Premiership"),
    (206, "Scottish Championship"),
    (207, "Scottish League One"),
    (209, "Scottish League Two"),
];

pub fn tracked_league_name(league_id: i64) -> Option<&'static str> {
    TRACKED_LEAGUES
        .iter()
        .find(|(id, _)| *id == league_id)
        .map(|(_, name)| *name)
}

/// One fixture as reported upstream, already validated. Scores stay `None`
/// until the provider reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFixture {
    pub external_id: i64,
    pub league_id: i64,
    pub league_name: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub status: MatchStatus,
}

pub trait ResultsProvider {
    /// All tracked fixtures on the given matchday.
    fn fetch_matchday_fixtures(&self, date: NaiveDate) -> Result<Vec<ProviderFixture>>;

    /// Latest score and status for each id. Ids that could not be fetched
    /// are simply absent from the result.
    fn fetch_results(&self, external_ids: &[i64]) -> Result<Vec<ProviderFixture>>;
}

/// Keep tracked tournaments kicking off at `kickoff` local time on `date`.
pub fn filter_matchday(
    fixtures: Vec<ProviderFixture>,
    date: NaiveDate,
    kickoff: NaiveTime,
    tz: Tz,
) -> Vec<ProviderFixture> {
    fixtures
        .into_iter()
        .filter(|f| tracked_league_name(f.league_id).is_some())
        .filter(|f| {
            let local = f.kickoff.with_timezone(&tz);
            local.date_naive() == date
                && local.hour() == kickoff.hour()
                && local.minute() == kickoff.minute()
        })
        .map(|mut f| {
            if let Some(name) = tracked_league_name(f.league_id) {
                f.league_name = name.to_string();
            }
            f
        })
        .collect()
}

impl<T: ResultsProvider + ?Sized> ResultsProvider for Box<T> {
    fn fetch_matchday_fixtures(&self, date: NaiveDate) -> Result<Vec<ProviderFixture>> {
        (**self).fetch_matchday_fixtures(date)
    }

    fn fetch_results(&self, external_ids: &[i64]) -> Result<Vec<ProviderFixture>> {
        (**self).fetch_results(external_ids)
    }
}
