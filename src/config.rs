use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::warn;

pub const DEFAULT_PLAYERS: &[&str] = &["Kezza", "Mikey", "Krissy", "Tommy"];
const DEFAULT_SELECTIONS_PER_PLAYER: usize = 2;
// "over 2.5 goals" = 3+ total
const DEFAULT_GOAL_THRESHOLD: u32 = 2;
const DEFAULT_RESULTS_CUTOFF_HOUR: u32 = 17;
const DEFAULT_REFRESH_COOLDOWN_SECS: i64 = 3600;
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::London;
const DEFAULT_KICKOFF: (u32, u32) = (15, 0);
const DEFAULT_SOFASCORE_BASE_URL: &str = "https://api.sofascore.com/api/v1";
const DB_DIR: &str = "betting_overs";
const DB_FILE: &str = "betting.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsSource {
    Sofascore,
    Fake,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub players: Vec<String>,
    pub selections_per_player: usize,
    pub goal_threshold: u32,
    pub zero_zero_fine: Decimal,
    pub one_goal_fine: Decimal,
    pub both_zero_zero_fine: Decimal,
    pub results_cutoff_hour: u32,
    pub refresh_cooldown: Duration,
    pub timezone: Tz,
    pub season_start: NaiveDate,
    pub kickoff_time: NaiveTime,
    pub test_date: Option<NaiveDate>,
    pub db_path: Option<PathBuf>,
    pub results_source: ResultsSource,
    pub sofascore_base_url: String,
    pub provider_max_retries: u32,
    pub provider_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            players: DEFAULT_PLAYERS.iter().map(|p| p.to_string()).collect(),
            selections_per_player: DEFAULT_SELECTIONS_PER_PLAYER,
            goal_threshold: DEFAULT_GOAL_THRESHOLD,
            zero_zero_fine: Decimal::new(5, 0),
            one_goal_fine: Decimal::new(2, 0),
            both_zero_zero_fine: Decimal::new(20, 0),
            results_cutoff_hour: DEFAULT_RESULTS_CUTOFF_HOUR,
            refresh_cooldown: Duration::seconds(DEFAULT_REFRESH_COOLDOWN_SECS),
            timezone: DEFAULT_TIMEZONE,
            season_start: default_season_start(),
            kickoff_time: NaiveTime::from_hms_opt(DEFAULT_KICKOFF.0, DEFAULT_KICKOFF.1, 0)
                .unwrap_or(NaiveTime::MIN),
            test_date: None,
            db_path: default_db_path(),
            results_source: ResultsSource::Sofascore,
            sofascore_base_url: DEFAULT_SOFASCORE_BASE_URL.to_string(),
            provider_max_retries: 3,
            provider_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let players = env::var("BETTING_PLAYERS")
            .ok()
            .map(|raw| parse_roster(&raw))
            .filter(|players| !players.is_empty())
            .unwrap_or(defaults.players);

        let selections_per_player = env_parse("BETTING_SELECTIONS_PER_PLAYER")
            .unwrap_or(defaults.selections_per_player)
            .clamp(1, 10);
        let goal_threshold =
            env_parse("BETTING_GOAL_THRESHOLD").unwrap_or(defaults.goal_threshold);

        let zero_zero_fine =
            env_amount("BETTING_FINE_ZERO_ZERO").unwrap_or(defaults.zero_zero_fine);
        let one_goal_fine = env_amount("BETTING_FINE_ONE_GOAL").unwrap_or(defaults.one_goal_fine);
        let both_zero_zero_fine =
            env_amount("BETTING_FINE_BOTH_ZERO_ZERO").unwrap_or(defaults.both_zero_zero_fine);

        let results_cutoff_hour = env_parse("BETTING_RESULTS_CUTOFF_HOUR")
            .unwrap_or(defaults.results_cutoff_hour)
            .min(23);
        let refresh_cooldown = env_parse::<i64>("BETTING_REFRESH_COOLDOWN_SECS")
            .and_then(|secs| {
                let cooldown = cooldown_from_secs(secs);
                if cooldown.is_none() {
                    warn!(secs, "BETTING_REFRESH_COOLDOWN_SECS out of range, using default");
                }
                cooldown
            })
            .unwrap_or(defaults.refresh_cooldown);

        let timezone = env_parse::<Tz>("BETTING_TIMEZONE").unwrap_or(defaults.timezone);
        let season_start = env_date("BETTING_SEASON_START").unwrap_or(defaults.season_start);
        let kickoff_time = env::var("BETTING_KICKOFF_TIME")
            .ok()
            .and_then(|raw| {
                let parsed = NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok();
                if parsed.is_none() {
                    warn!(value = %raw, "ignoring invalid BETTING_KICKOFF_TIME");
                }
                parsed
            })
            .unwrap_or(defaults.kickoff_time);
        let test_date = env_date("BETTING_TEST_DATE");

        let db_path = env::var("BETTING_DB")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or(defaults.db_path);

        let results_source = match env::var("RESULTS_SOURCE")
            .unwrap_or_else(|_| "sofascore".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "fake" | "demo" | "offline" => ResultsSource::Fake,
            _ => ResultsSource::Sofascore,
        };
        let sofascore_base_url = env::var("SOFASCORE_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.sofascore_base_url);
        let provider_max_retries = env_parse("PROVIDER_MAX_RETRIES")
            .unwrap_or(defaults.provider_max_retries)
            .clamp(1, 8);
        let provider_timeout_secs = env_parse("PROVIDER_TIMEOUT_SECS")
            .unwrap_or(defaults.provider_timeout_secs)
            .clamp(1, 120);

        Self {
            players,
            selections_per_player,
            goal_threshold,
            zero_zero_fine,
            one_goal_fine,
            both_zero_zero_fine,
            results_cutoff_hour,
            refresh_cooldown,
            timezone,
            season_start,
            kickoff_time,
            test_date,
            db_path,
            results_source,
            sofascore_base_url,
            provider_max_retries,
            provider_timeout_secs,
        }
    }

    pub fn is_player(&self, name: &str) -> bool {
        self.players.iter().any(|p| p == name)
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DB_DIR).join(DB_FILE));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DB_DIR)
            .join(DB_FILE),
    )
}

fn default_season_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 1).unwrap_or(NaiveDate::MIN)
}

fn parse_roster(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in raw.split([',', ';']).map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing == name) {
            out.push(name.to_string());
        }
    }
    out
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = trimmed.parse::<T>().ok();
    if parsed.is_none() {
        warn!(key, value = trimmed, "ignoring unparseable config value");
    }
    parsed
}

/// Negative values mean no cooldown; values past chrono's range are rejected.
fn cooldown_from_secs(secs: i64) -> Option<Duration> {
    Duration::try_seconds(secs.max(0))
}

fn env_amount(key: &str) -> Option<Decimal> {
    env_parse::<Decimal>(key).filter(|amount| *amount > Decimal::ZERO)
}

fn env_date(key: &str) -> Option<NaiveDate> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok();
    if parsed.is_none() {
        warn!(key, value = trimmed, "ignoring invalid date");
    }
    parsed
}
