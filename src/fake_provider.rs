use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::model::MatchStatus;
use crate::provider::{ProviderFixture, ResultsProvider, TRACKED_LEAGUES, filter_matchday};

const DEMO_TEAMS: &[&str] = &[
    "Arsenal",
    "Brentford",
    "Everton",
    "Fulham",
    "Burnley",
    "Leeds United",
    "Coventry City",
    "Hull City",
    "Stoke City",
    "Preston North End",
    "Bolton Wanderers",
    "Wigan Athletic",
    "Barrow",
    "Notts County",
    "Hearts",
    "Hibernian",
    "Aberdeen",
    "Motherwell",
    "Partick Thistle",
    "Raith Rovers",
];

#[derive(Default)]
struct FakeState {
    fixtures: BTreeMap<i64, ProviderFixture>,
    unavailable: bool,
}

/// In-memory results source. All mutation goes through `&self` so a test can
/// keep a handle while the tracker owns the provider.
pub struct FakeProvider {
    state: Mutex<FakeState>,
    timezone: Tz,
    // Demo mode: fixtures past kickoff + 2h get a random final score on fetch.
    auto_settle: bool,
}

impl FakeProvider {
    pub fn new(timezone: Tz) -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            timezone,
            auto_settle: false,
        }
    }

    /// A random matchday on `date`, one fixture per tracked tournament,
    /// scores filled in as the matches "finish". Seeded from the date so
    /// every process sees the same matchday.
    pub fn demo(date: NaiveDate, tz: Tz, kickoff: NaiveTime) -> Self {
        let provider = Self {
            auto_settle: true,
            ..Self::new(tz)
        };
        let Some(kickoff_utc) = local_kickoff(date, kickoff, tz) else {
            return provider;
        };
        let base_id = i64::from(date.num_days_from_ce()) * 100;
        let mut rng = StdRng::seed_from_u64(base_id.unsigned_abs());
        for (idx, (league_id, league_name)) in TRACKED_LEAGUES.iter().enumerate() {
            let home = rng.gen_range(0..DEMO_TEAMS.len());
            let mut away = rng.gen_range(0..DEMO_TEAMS.len());
            if away == home {
                away = (away + 1) % DEMO_TEAMS.len();
            }
            provider.insert(ProviderFixture {
                external_id: base_id + idx as i64,
                league_id: *league_id,
                league_name: (*league_name).to_string(),
                home_team: DEMO_TEAMS[home].to_string(),
                away_team: DEMO_TEAMS[away].to_string(),
                kickoff: kickoff_utc,
                home_score: None,
                away_score: None,
                status: MatchStatus::NotStarted,
            });
        }
        info!(%date, fixtures = TRACKED_LEAGUES.len(), "seeded demo matchday");
        provider
    }

    pub fn insert(&self, fixture: ProviderFixture) {
        self.lock().fixtures.insert(fixture.external_id, fixture);
    }

    /// Returns false when the id is unknown.
    pub fn set_result(
        &self,
        external_id: i64,
        home_score: Option<u32>,
        away_score: Option<u32>,
        status: MatchStatus,
    ) -> bool {
        let mut state = self.lock();
        let Some(fixture) = state.fixtures.get_mut(&external_id) else {
            return false;
        };
        fixture.home_score = home_score;
        fixture.away_score = away_score;
        fixture.status = status;
        true
    }

    /// Make every fetch fail, to exercise degraded paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn settle_finished(&self, state: &mut FakeState, now: DateTime<Utc>) {
        for fixture in state.fixtures.values_mut() {
            if fixture.status.is_complete() || now < fixture.kickoff + Duration::hours(2) {
                continue;
            }
            let mut rng = StdRng::seed_from_u64(fixture.external_id.unsigned_abs());
            // Weighted towards low scores so every fine rule shows up.
            fixture.home_score = Some(rng.gen_range(0..=3));
            fixture.away_score = Some(rng.gen_range(0..=2));
            fixture.status = MatchStatus::FullTime;
            debug!(external_id = fixture.external_id, "demo fixture finished");
        }
    }
}

impl ResultsProvider for FakeProvider {
    fn fetch_matchday_fixtures(&self, date: NaiveDate) -> Result<Vec<ProviderFixture>> {
        let state = self.lock();
        if state.unavailable {
            return Err(anyhow!("fake provider unavailable"));
        }
        let fixtures = state
            .fixtures
            .values()
            .filter(|f| f.kickoff.with_timezone(&self.timezone).date_naive() == date)
            .cloned()
            .collect();
        Ok(fixtures)
    }

    fn fetch_results(&self, external_ids: &[i64]) -> Result<Vec<ProviderFixture>> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(anyhow!("fake provider unavailable"));
        }
        if self.auto_settle {
            self.settle_finished(&mut state, Utc::now());
        }
        Ok(external_ids
            .iter()
            .filter_map(|id| state.fixtures.get(id).cloned())
            .collect())
    }
}

/// Tracked-league fixture kicking off at `kickoff` local time on `date`.
pub fn scheduled_fixture(
    external_id: i64,
    league_id: i64,
    home_team: &str,
    away_team: &str,
    date: NaiveDate,
    kickoff: NaiveTime,
    tz: Tz,
) -> Option<ProviderFixture> {
    let fixture = ProviderFixture {
        external_id,
        league_id,
        league_name: String::new(),
        home_team: home_team.to_string(),
        away_team: away_team.to_string(),
        kickoff: local_kickoff(date, kickoff, tz)?,
        home_score: None,
        away_score: None,
        status: MatchStatus::NotStarted,
    };
    filter_matchday(vec![fixture], date, kickoff, tz).into_iter().next()
}

fn local_kickoff(date: NaiveDate, kickoff: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(kickoff))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
