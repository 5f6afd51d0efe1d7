use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStatus {
    Active,
    Completed,
}

impl WeekStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WeekStatus::Active => "active",
            WeekStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(WeekStatus::Active),
            "completed" => Some(WeekStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for WeekStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Week {
    pub id: i64,
    pub week_number: u32,
    pub season: String,
    pub saturday_date: NaiveDate,
    pub status: WeekStatus,
    pub created_at: DateTime<Utc>,
}

impl Week {
    pub fn is_active(&self) -> bool {
        self.status == WeekStatus::Active
    }
}

/// Short status codes as reported by the results provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "NS")]
    NotStarted,
    #[serde(rename = "LIVE")]
    InProgress,
    #[serde(rename = "HT")]
    HalfTime,
    #[serde(rename = "FT")]
    FullTime,
    #[serde(rename = "AET")]
    AfterExtraTime,
    #[serde(rename = "PEN")]
    Penalties,
    #[serde(rename = "PST")]
    Postponed,
    #[serde(rename = "CANC")]
    Cancelled,
    #[serde(rename = "ABD")]
    Abandoned,
}

impl MatchStatus {
    pub fn code(self) -> &'static str {
        match self {
            MatchStatus::NotStarted => "NS",
            MatchStatus::InProgress => "LIVE",
            MatchStatus::HalfTime => "HT",
            MatchStatus::FullTime => "FT",
            MatchStatus::AfterExtraTime => "AET",
            MatchStatus::Penalties => "PEN",
            MatchStatus::Postponed => "PST",
            MatchStatus::Cancelled => "CANC",
            MatchStatus::Abandoned => "ABD",
        }
    }

    /// Unknown codes are treated as not started so they never settle.
    pub fn from_code(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LIVE" | "1H" | "2H" | "ET" => MatchStatus::InProgress,
            "HT" => MatchStatus::HalfTime,
            "FT" => MatchStatus::FullTime,
            "AET" => MatchStatus::AfterExtraTime,
            "PEN" => MatchStatus::Penalties,
            "PST" => MatchStatus::Postponed,
            "CANC" => MatchStatus::Cancelled,
            "ABD" => MatchStatus::Abandoned,
            _ => MatchStatus::NotStarted,
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(
            self,
            MatchStatus::FullTime | MatchStatus::AfterExtraTime | MatchStatus::Penalties
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: i64,
    pub external_id: i64,
    pub week_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub league_id: i64,
    pub league_name: String,
    pub kickoff: DateTime<Utc>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub match_status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Fixture {
    /// Final score, only once the match has concluded and both scores are known.
    pub fn final_score(&self) -> Option<(u32, u32)> {
        if !self.match_status.is_complete() {
            return None;
        }
        let (Some(home), Some(away)) = (self.home_score, self.away_score) else {
            return None;
        };
        Some((home, away))
    }

    pub fn is_final(&self) -> bool {
        self.final_score().is_some()
    }

    pub fn label(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionResult {
    Pending,
    Won,
    Lost,
}

impl SelectionResult {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionResult::Pending => "pending",
            SelectionResult::Won => "won",
            SelectionResult::Lost => "lost",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(SelectionResult::Pending),
            "won" => Some(SelectionResult::Won),
            "lost" => Some(SelectionResult::Lost),
            _ => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        self != SelectionResult::Pending
    }
}

impl fmt::Display for SelectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub id: i64,
    pub week_id: i64,
    pub player_name: String,
    pub fixture_id: i64,
    pub result: SelectionResult,
    pub total_goals: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionWithFixture {
    #[serde(flatten)]
    pub selection: Selection,
    pub fixture: Option<Fixture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fine {
    pub id: i64,
    pub week_id: i64,
    pub player_name: String,
    pub amount: Decimal,
    pub reason: String,
    pub fixture_id: Option<i64>,
    pub cleared: bool,
    pub created_at: DateTime<Utc>,
}

/// A fine produced by settlement, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFine {
    pub week_id: i64,
    pub player_name: String,
    pub amount: Decimal,
    pub reason: String,
    pub fixture_id: Option<i64>,
}

impl NewFine {
    pub fn matches(&self, fine: &Fine) -> bool {
        self.week_id == fine.week_id
            && self.player_name == fine.player_name
            && self.fixture_id == fine.fixture_id
            && self.amount == fine.amount
            && self.reason == fine.reason
    }
}

/// Everything the settlement trigger hands back for one week.
#[derive(Debug, Clone, Serialize)]
pub struct WeekReport {
    pub week: Week,
    pub selections: Vec<SelectionWithFixture>,
    pub fines: Vec<Fine>,
}
