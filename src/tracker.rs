//! The tracker service: every operation the CLI exposes, on top of the
//! sqlite store and a results provider.
//!
//! Operations take `now` explicitly so the matchday gate, cooldowns and
//! week resolution can be driven from tests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calendar::{home_today, relevant_saturday, season_label, week_number};
use crate::config::Config;
use crate::error::{TrackerError, TrackerResult};
use crate::export::{ExportReport, export_workbook};
use crate::ledger::{ClearSelector, FineTotals, apply_clear, fines_to_clear, summarize};
use crate::lifecycle::{
    ResultsGate, all_players_submitted, refresh_cooldown_remaining, results_gate,
    status_after_settlement, validate_submission,
};
use crate::model::{Fine, Fixture, Selection, SelectionWithFixture, Week, WeekReport, WeekStatus};
use crate::provider::ResultsProvider;
use crate::settlement::{SettlementRules, apply_outcomes, settle_week};
use crate::stats::{PlayerStats, WeekBreakdown, player_stats, weekly_breakdown};
use crate::store::{self, FineFilter};

#[derive(Debug, Clone, Serialize)]
pub struct WeekFixtures {
    pub week: Week,
    pub fixtures: Vec<Fixture>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub week_id: i64,
    pub player_name: String,
    pub selections: Vec<Selection>,
    /// Every rostered player now holds a full set of picks.
    pub all_submitted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinesReport {
    pub fines: Vec<Fine>,
    pub summary: BTreeMap<String, FineTotals>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub players: Vec<PlayerStats>,
    /// Newest week first.
    pub weeks: Vec<WeekBreakdown>,
}

pub struct Tracker<P: ResultsProvider> {
    conn: Connection,
    config: Config,
    provider: P,
}

impl<P: ResultsProvider> Tracker<P> {
    pub fn new(conn: Connection, config: Config, provider: P) -> Self {
        Self {
            conn,
            config,
            provider,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Home-timezone date, or the configured override.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.config
            .test_date
            .unwrap_or_else(|| home_today(now, self.config.timezone))
    }

    /// Resolve (and create when missing) the week for the relevant Saturday,
    /// loading its fixtures from the provider the first time.
    pub fn current_week(&mut self, now: DateTime<Utc>, week_offset: i64) -> TrackerResult<WeekFixtures> {
        let today = self.today(now);
        let saturday = relevant_saturday(today, week_offset).ok_or_else(|| {
            TrackerError::validation(format!("week offset {week_offset} is out of range"))
        })?;
        let number = week_number(saturday, self.config.season_start);
        let season = season_label(saturday);
        let week = store::upsert_week_by_date(&self.conn, saturday, number, &season, now)?;

        let mut fixtures = store::fixtures_for_week(&self.conn, week.id)?;
        if fixtures.is_empty() {
            self.load_fixtures(&week, now)?;
            fixtures = store::fixtures_for_week(&self.conn, week.id)?;
        }
        Ok(WeekFixtures { week, fixtures })
    }

    /// Refetch the current week's fixtures, at most once per cooldown.
    pub fn refresh_fixtures(&mut self, now: DateTime<Utc>) -> TrackerResult<WeekFixtures> {
        let saturday = relevant_saturday(self.today(now), 0)
            .ok_or_else(|| TrackerError::validation("no Saturday after today's date"))?;
        let week = store::week_by_date(&self.conn, saturday)?
            .ok_or_else(|| TrackerError::not_found(format!("no week for {saturday}")))?;

        let last = store::latest_fixture_created_at(&self.conn, week.id)?;
        if let Some(remaining) = refresh_cooldown_remaining(now, last, self.config.refresh_cooldown) {
            return Err(TrackerError::RefreshCooldown { remaining });
        }

        self.load_fixtures(&week, now)?;
        let fixtures = store::fixtures_for_week(&self.conn, week.id)?;
        Ok(WeekFixtures { week, fixtures })
    }

    fn load_fixtures(&mut self, week: &Week, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let fetched = self
            .provider
            .fetch_matchday_fixtures(week.saturday_date)
            .with_context(|| format!("fetch fixtures for {}", week.saturday_date))?;

        let tx = self.conn.transaction().context("begin fixtures transaction")?;
        for fixture in &fetched {
            store::upsert_fixture(&tx, week.id, fixture, now)?;
        }
        tx.commit().context("commit fixtures transaction")?;

        info!(
            week = week.week_number,
            saturday = %week.saturday_date,
            fixtures = fetched.len(),
            "loaded fixtures"
        );
        Ok(fetched.len())
    }

    /// Replace `player`'s picks for the week (the active week when `week_id`
    /// is `None`).
    pub fn submit_selections(
        &mut self,
        week_id: Option<i64>,
        player: &str,
        fixture_ids: &[i64],
        now: DateTime<Utc>,
    ) -> TrackerResult<SubmissionReceipt> {
        let week = match week_id {
            Some(id) => store::week_by_id(&self.conn, id)?,
            None => store::active_week(&self.conn)?,
        };
        let week_fixture_ids: Vec<i64> = match &week {
            Some(w) => store::fixtures_for_week(&self.conn, w.id)?
                .iter()
                .map(|f| f.id)
                .collect(),
            None => Vec::new(),
        };
        validate_submission(&self.config, week.as_ref(), &week_fixture_ids, player, fixture_ids)?;
        let Some(week) = week else {
            return Err(TrackerError::not_found("week"));
        };

        let selections = store::replace_selections(&mut self.conn, week.id, player, fixture_ids, now)?;
        info!(week = week.week_number, player, picks = selections.len(), "selections saved");

        let everyone = store::selections_for_week(&self.conn, week.id)?;
        let all_submitted = all_players_submitted(&self.config, &everyone);
        if all_submitted {
            info!(week = week.week_number, "selections complete for every player");
        }

        Ok(SubmissionReceipt {
            week_id: week.id,
            player_name: player.to_string(),
            selections,
            all_submitted,
        })
    }

    /// Withdraw a player's picks from an active week.
    pub fn clear_selections(&mut self, week_id: Option<i64>, player: &str) -> TrackerResult<usize> {
        if !self.config.is_player(player) {
            return Err(TrackerError::validation(format!("unknown player {player}")));
        }
        let week = self.resolve_week(week_id)?;
        if !week.is_active() {
            return Err(TrackerError::validation("week already completed"));
        }
        let removed = store::delete_selections(&self.conn, week.id, player)?;
        info!(week = week.week_number, player, removed, "selections cleared");
        Ok(removed)
    }

    /// Selections joined with their fixtures. Without a week id this is the
    /// active week, or nothing when no week is active.
    pub fn selections(&self, week_id: Option<i64>) -> TrackerResult<Vec<SelectionWithFixture>> {
        let week = match week_id {
            Some(id) => Some(
                store::week_by_id(&self.conn, id)?
                    .ok_or_else(|| TrackerError::not_found(format!("week {id}")))?,
            ),
            None => store::active_week(&self.conn)?,
        };
        match week {
            Some(week) => Ok(self.joined_selections(week.id)?),
            None => Ok(Vec::new()),
        }
    }

    /// The settlement trigger: refresh scores, settle picks, regenerate
    /// fines and complete the week once nothing is pending.
    pub fn check_results(
        &mut self,
        week_id: Option<i64>,
        now: DateTime<Utc>,
        force: bool,
    ) -> TrackerResult<WeekReport> {
        if !force
            && let ResultsGate::Locked { opens_at } =
                results_gate(now, self.config.timezone, self.config.results_cutoff_hour)
        {
            return Err(TrackerError::ResultsLocked { opens_at });
        }

        let week = self.resolve_week(week_id)?;
        let fixtures = store::fixtures_for_week(&self.conn, week.id)?;
        if fixtures.is_empty() {
            return Err(TrackerError::not_found(format!(
                "no fixtures for week {}",
                week.week_number
            )));
        }

        self.refresh_scores(&fixtures)?;
        let fixtures = store::fixtures_for_week(&self.conn, week.id)?;
        let mut selections = store::selections_for_week(&self.conn, week.id)?;
        let cleared = store::list_fines(
            &self.conn,
            &FineFilter {
                week_id: Some(week.id),
                cleared: Some(true),
                ..FineFilter::default()
            },
        )?;

        let rules = SettlementRules::from_config(&self.config);
        let settlement = settle_week(week.id, &fixtures, &selections, &cleared, &rules);
        apply_outcomes(&mut selections, &settlement.outcomes);
        let status = status_after_settlement(&week, &selections);

        let tx = self.conn.transaction().context("begin settlement transaction")?;
        for outcome in &settlement.outcomes {
            store::update_selection_result(
                &tx,
                outcome.selection_id,
                outcome.result,
                Some(outcome.total_goals),
            )?;
        }
        let replaced = store::replace_uncleared_fines(&tx, week.id, &settlement.fines, now)?;
        if status != week.status {
            store::update_week_status(&tx, week.id, status)?;
        }
        tx.commit().context("commit settlement transaction")?;

        info!(
            week = week.week_number,
            settled = settlement.outcomes.len(),
            skipped = settlement.skipped,
            fines = settlement.fines.len(),
            replaced,
            "settlement pass complete"
        );
        if status == WeekStatus::Completed && week.status != WeekStatus::Completed {
            info!(week = week.week_number, "week completed");
        }

        self.week_report(week.id)
    }

    /// Best effort: on provider failure the stored snapshot is settled.
    fn refresh_scores(&self, fixtures: &[Fixture]) -> TrackerResult<()> {
        let ids: Vec<i64> = fixtures
            .iter()
            .filter(|f| !f.is_final())
            .map(|f| f.external_id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        match self.provider.fetch_results(&ids) {
            Ok(results) => {
                let mut updated = 0usize;
                for result in &results {
                    if store::update_fixture_result(&self.conn, result)? {
                        updated += 1;
                    }
                }
                debug!(requested = ids.len(), updated, "fixture scores refreshed");
            }
            Err(err) => {
                warn!(error = %err, "results fetch failed, settling stored scores");
            }
        }
        Ok(())
    }

    /// Administrative roll-over: every active week becomes completed.
    pub fn reset_weeks(&mut self) -> TrackerResult<usize> {
        let changed = store::complete_active_weeks(&self.conn)?;
        info!(weeks = changed, "active weeks reset");
        Ok(changed)
    }

    pub fn weeks(&self) -> TrackerResult<Vec<Week>> {
        Ok(store::list_weeks(&self.conn, None)?)
    }

    pub fn active_week(&self) -> TrackerResult<Option<Week>> {
        Ok(store::active_week(&self.conn)?)
    }

    /// A single week's report, or every completed week newest first.
    pub fn history(&self, week_id: Option<i64>) -> TrackerResult<Vec<WeekReport>> {
        match week_id {
            Some(id) => Ok(vec![self.week_report(id)?]),
            None => store::list_weeks(&self.conn, Some(WeekStatus::Completed))?
                .iter()
                .map(|w| self.week_report(w.id))
                .collect(),
        }
    }

    pub fn week_report(&self, week_id: i64) -> TrackerResult<WeekReport> {
        let week = store::week_by_id(&self.conn, week_id)?
            .ok_or_else(|| TrackerError::not_found(format!("week {week_id}")))?;
        let selections = self.joined_selections(week.id)?;
        let fines = store::list_fines(
            &self.conn,
            &FineFilter {
                week_id: Some(week.id),
                ..FineFilter::default()
            },
        )?;
        Ok(WeekReport {
            week,
            selections,
            fines,
        })
    }

    pub fn fines(&self, filter: &FineFilter) -> TrackerResult<FinesReport> {
        let fines = store::list_fines(&self.conn, filter)?;
        let summary = summarize(&fines);
        Ok(FinesReport { fines, summary })
    }

    /// Returns the fines that flipped to cleared.
    pub fn clear_fines(&mut self, selector: &ClearSelector) -> TrackerResult<Vec<Fine>> {
        match selector {
            ClearSelector::Ids(ids) if ids.is_empty() => {
                return Err(TrackerError::validation("no fine ids given"));
            }
            ClearSelector::Player(player) if !self.config.is_player(player) => {
                return Err(TrackerError::validation(format!("unknown player {player}")));
            }
            _ => {}
        }

        let mut outstanding = store::list_fines(
            &self.conn,
            &FineFilter {
                cleared: Some(false),
                ..FineFilter::default()
            },
        )?;
        let ids = fines_to_clear(&outstanding, selector);
        let changed = store::mark_fines_cleared(&mut self.conn, &ids)?;
        info!(requested = ids.len(), cleared = changed, "fines cleared");

        apply_clear(&mut outstanding, selector);
        outstanding.retain(|f| f.cleared);
        Ok(outstanding)
    }

    pub fn stats(&self, player: Option<&str>) -> TrackerResult<StatsReport> {
        let players: Vec<String> = match player {
            Some(p) if !self.config.is_player(p) => {
                return Err(TrackerError::validation(format!("unknown player {p}")));
            }
            Some(p) => vec![p.to_string()],
            None => self.config.players.clone(),
        };
        let selections = store::all_selections(&self.conn, None)?;
        let fines = store::list_fines(&self.conn, &FineFilter::default())?;
        let weeks = store::list_weeks(&self.conn, None)?;

        Ok(StatsReport {
            players: players
                .iter()
                .map(|p| player_stats(p, &selections, &fines))
                .collect(),
            weeks: weekly_breakdown(&weeks, &selections, &fines),
        })
    }

    pub fn export(&self, path: &Path) -> TrackerResult<ExportReport> {
        let fines = store::list_fines(&self.conn, &FineFilter::default())?;
        let stats = self.stats(None)?;
        let weeks = store::list_weeks(&self.conn, None)?;
        let report = export_workbook(path, &fines, &stats.players, &weeks)?;
        info!(path = %path.display(), fines = report.fines, weeks = report.weeks, "workbook exported");
        Ok(report)
    }

    /// Group-chat summary of a week's picks.
    pub fn share_text(&self, week_id: Option<i64>) -> TrackerResult<String> {
        let week = self.resolve_week(week_id)?;
        let selections = self.joined_selections(week.id)?;
        Ok(format_share_text(&week, &selections, self.config.goal_threshold))
    }

    fn resolve_week(&self, week_id: Option<i64>) -> TrackerResult<Week> {
        match week_id {
            Some(id) => store::week_by_id(&self.conn, id)?
                .ok_or_else(|| TrackerError::not_found(format!("week {id}"))),
            None => store::active_week(&self.conn)?
                .ok_or_else(|| TrackerError::not_found("no active week")),
        }
    }

    fn joined_selections(&self, week_id: i64) -> anyhow::Result<Vec<SelectionWithFixture>> {
        let fixtures: HashMap<i64, Fixture> = store::fixtures_for_week(&self.conn, week_id)?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();
        Ok(store::selections_for_week(&self.conn, week_id)?
            .into_iter()
            .map(|selection| {
                let fixture = fixtures.get(&selection.fixture_id).cloned();
                SelectionWithFixture { selection, fixture }
            })
            .collect())
    }
}

pub fn format_share_text(week: &Week, selections: &[SelectionWithFixture], goal_threshold: u32) -> String {
    let mut grouped: Vec<(&str, Vec<String>)> = Vec::new();
    for item in selections {
        let player = item.selection.player_name.as_str();
        let idx = match grouped.iter().position(|(p, _)| *p == player) {
            Some(idx) => idx,
            None => {
                grouped.push((player, Vec::new()));
                grouped.len() - 1
            }
        };
        if let Some(fixture) = &item.fixture {
            grouped[idx].1.push(fixture.label());
        }
    }

    let rule = "━".repeat(24);
    let mut text = format!(
        "⚽ BETTING OVERS - Week {} ({}) ⚽\n{rule}\n",
        week.week_number,
        week.saturday_date.format("%d %b %Y")
    );
    for (player, picks) in &grouped {
        text.push_str(&format!("\n{player}:\n"));
        for (i, pick) in picks.iter().enumerate() {
            text.push_str(&format!("  {}. {pick}\n", i + 1));
        }
    }
    text.push_str(&format!("\n{rule}\n💰 Over {goal_threshold}.5 goals to win!"));
    text
}
