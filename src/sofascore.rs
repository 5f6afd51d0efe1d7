use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http_client::{RetryPolicy, build_http_client, get_json_with_retry};
use crate::model::MatchStatus;
use crate::provider::{ProviderFixture, ResultsProvider, filter_matchday, tracked_league_name};

pub struct SofascoreProvider {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    timezone: Tz,
    kickoff_time: NaiveTime,
}

impl SofascoreProvider {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            base_url: cfg.sofascore_base_url.clone(),
            retry: RetryPolicy::new(cfg.provider_max_retries),
            timezone: cfg.timezone,
            kickoff_time: cfg.kickoff_time,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = build_http_client(cfg.provider_timeout_secs)?;
        Ok(Self::new(client, cfg))
    }

    fn get(&self, endpoint: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "sofascore request");
        get_json_with_retry(&self.client, &url, &self.retry)
    }
}

impl ResultsProvider for SofascoreProvider {
    fn fetch_matchday_fixtures(&self, date: NaiveDate) -> Result<Vec<ProviderFixture>> {
        let body = self
            .get(&format!(
                "/sport/football/scheduled-events/{}",
                date.format("%Y-%m-%d")
            ))
            .context("scheduled events request failed")?;
        let all = parse_scheduled_events_json(&body)?;
        let total = all.len();
        let fixtures = filter_matchday(all, date, self.kickoff_time, self.timezone);
        info!(
            %date,
            total_events = total,
            matchday_fixtures = fixtures.len(),
            "loaded matchday fixtures"
        );
        Ok(fixtures)
    }

    fn fetch_results(&self, external_ids: &[i64]) -> Result<Vec<ProviderFixture>> {
        let mut out = Vec::with_capacity(external_ids.len());
        for id in external_ids {
            let parsed = self
                .get(&format!("/event/{id}"))
                .and_then(|body| parse_event_json(&body));
            match parsed {
                Ok(Some(fixture)) => {
                    debug!(
                        external_id = id,
                        home = %fixture.home_team,
                        away = %fixture.away_team,
                        home_score = ?fixture.home_score,
                        away_score = ?fixture.away_score,
                        status = %fixture.status,
                        "fetched result"
                    );
                    out.push(fixture);
                }
                Ok(None) => warn!(external_id = id, "event payload missing or incomplete"),
                Err(err) => warn!(external_id = id, error = %err, "failed to fetch result"),
            }
        }
        info!(
            requested = external_ids.len(),
            fetched = out.len(),
            "fetched fixture results"
        );
        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct ScheduledEventsResponse {
    #[serde(default)]
    events: Vec<SofaEvent>,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    event: Option<SofaEvent>,
}

#[derive(Debug, Deserialize)]
struct SofaEvent {
    id: Option<i64>,
    #[serde(rename = "startTimestamp")]
    start_timestamp: Option<i64>,
    #[serde(default)]
    status: Option<SofaStatus>,
    #[serde(default)]
    tournament: Option<SofaTournament>,
    #[serde(rename = "homeTeam")]
    home_team: Option<SofaTeam>,
    #[serde(rename = "awayTeam")]
    away_team: Option<SofaTeam>,
    #[serde(rename = "homeScore", default)]
    home_score: Option<SofaScore>,
    #[serde(rename = "awayScore", default)]
    away_score: Option<SofaScore>,
}

#[derive(Debug, Deserialize)]
struct SofaStatus {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SofaTournament {
    #[serde(rename = "uniqueTournament")]
    unique_tournament: Option<SofaUniqueTournament>,
}

#[derive(Debug, Deserialize)]
struct SofaUniqueTournament {
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SofaTeam {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SofaScore {
    #[serde(default)]
    current: Option<i64>,
}

pub fn parse_scheduled_events_json(raw: &str) -> Result<Vec<ProviderFixture>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let data: ScheduledEventsResponse =
        serde_json::from_str(trimmed).context("invalid scheduled events json")?;
    Ok(data.events.into_iter().filter_map(event_to_fixture).collect())
}

/// `Ok(None)` when the payload has no usable event.
pub fn parse_event_json(raw: &str) -> Result<Option<ProviderFixture>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let data: EventResponse = serde_json::from_str(trimmed).context("invalid event json")?;
    Ok(data.event.and_then(event_to_fixture))
}

pub fn map_status(kind: Option<&str>, description: Option<&str>) -> MatchStatus {
    let kind = kind.unwrap_or_default().trim().to_ascii_lowercase();
    let desc = description.unwrap_or_default().trim().to_ascii_lowercase();
    match kind.as_str() {
        "finished" => {
            if desc == "ap" || desc.contains("pen") {
                MatchStatus::Penalties
            } else if desc == "aet" || desc.contains("extra") {
                MatchStatus::AfterExtraTime
            } else {
                MatchStatus::FullTime
            }
        }
        "inprogress" => {
            if desc.contains("halftime") || desc == "ht" {
                MatchStatus::HalfTime
            } else {
                MatchStatus::InProgress
            }
        }
        "postponed" => MatchStatus::Postponed,
        "canceled" | "cancelled" => MatchStatus::Cancelled,
        "interrupted" | "abandoned" | "suspended" => MatchStatus::Abandoned,
        _ => MatchStatus::NotStarted,
    }
}

fn event_to_fixture(event: SofaEvent) -> Option<ProviderFixture> {
    let external_id = event.id?;
    let kickoff = DateTime::<Utc>::from_timestamp(event.start_timestamp?, 0)?;
    let home_team = non_empty(event.home_team?.name)?;
    let away_team = non_empty(event.away_team?.name)?;

    let unique = event.tournament.and_then(|t| t.unique_tournament);
    let league_id = unique.as_ref().and_then(|u| u.id).unwrap_or(0);
    let league_name = tracked_league_name(league_id)
        .map(|s| s.to_string())
        .or_else(|| unique.and_then(|u| non_empty(u.name)))
        .unwrap_or_else(|| "Unknown".to_string());

    let status = event
        .status
        .map(|s| map_status(s.kind.as_deref(), s.description.as_deref()))
        .unwrap_or(MatchStatus::NotStarted);

    // A missing score stays missing; it is never read as zero.
    let home_score = event.home_score.and_then(|s| s.current).and_then(score);
    let away_score = event.away_score.and_then(|s| s.current).and_then(score);

    Some(ProviderFixture {
        external_id,
        league_id,
        league_name,
        home_team,
        away_team,
        kickoff,
        home_score,
        away_score,
        status,
    })
}

fn score(raw: i64) -> Option<u32> {
    u32::try_from(raw).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::map_status;
    use crate::model::MatchStatus;

    #[test]
    fn finished_descriptions_pick_extra_time_and_penalties() {
        assert_eq!(map_status(Some("finished"), Some("Ended")), MatchStatus::FullTime);
        assert_eq!(map_status(Some("finished"), Some("AET")), MatchStatus::AfterExtraTime);
        assert_eq!(map_status(Some("finished"), Some("AP")), MatchStatus::Penalties);
        assert_eq!(
            map_status(Some("finished"), Some("Ended after penalties")),
            MatchStatus::Penalties
        );
    }

    #[test]
    fn other_states_never_count_as_final() {
        assert_eq!(map_status(Some("inprogress"), Some("Halftime")), MatchStatus::HalfTime);
        assert_eq!(map_status(Some("inprogress"), Some("2nd half")), MatchStatus::InProgress);
        assert_eq!(map_status(Some("postponed"), None), MatchStatus::Postponed);
        assert_eq!(map_status(None, None), MatchStatus::NotStarted);
    }
}
