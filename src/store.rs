use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, Transaction, params};
use rust_decimal::Decimal;

use crate::ledger::parse_amount;
use crate::model::{
    Fine, Fixture, MatchStatus, NewFine, Selection, SelectionResult, Week, WeekStatus,
};
use crate::provider::ProviderFixture;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create db dir {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS weeks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            week_number INTEGER NOT NULL,
            season TEXT NOT NULL,
            saturday_date TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_weeks_status ON weeks(status);

        CREATE TABLE IF NOT EXISTS fixtures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            week_id INTEGER NOT NULL REFERENCES weeks(id) ON DELETE CASCADE,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            league_id INTEGER NOT NULL,
            league_name TEXT NOT NULL,
            kickoff TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            match_status TEXT NOT NULL DEFAULT 'NS',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fixtures_week ON fixtures(week_id);

        CREATE TABLE IF NOT EXISTS selections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            week_id INTEGER NOT NULL REFERENCES weeks(id) ON DELETE CASCADE,
            player_name TEXT NOT NULL,
            fixture_id INTEGER NOT NULL REFERENCES fixtures(id) ON DELETE CASCADE,
            result TEXT NOT NULL DEFAULT 'pending',
            total_goals INTEGER NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_selections_week_player ON selections(week_id, player_name);

        CREATE TABLE IF NOT EXISTS fines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            week_id INTEGER NOT NULL REFERENCES weeks(id) ON DELETE CASCADE,
            player_name TEXT NOT NULL,
            amount TEXT NOT NULL,
            reason TEXT NOT NULL,
            fixture_id INTEGER NULL REFERENCES fixtures(id) ON DELETE SET NULL,
            cleared INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fines_week ON fines(week_id);
        CREATE INDEX IF NOT EXISTS idx_fines_player ON fines(player_name);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl ToSql for WeekStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for WeekStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        WeekStatus::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown week status {raw:?}").into()))
    }
}

impl ToSql for SelectionResult {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SelectionResult {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        SelectionResult::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown selection result {raw:?}").into()))
    }
}

impl ToSql for MatchStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for MatchStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(MatchStatus::from_code(value.as_str()?))
    }
}

/// Amounts are written as text but older rows may hold numbers.
fn amount_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let value = row.get_ref(idx)?;
    let parsed = match value {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_amount),
        ValueRef::Integer(n) => Some(Decimal::from(n)),
        ValueRef::Real(f) => Decimal::try_from(f).ok().map(|d| d.round_dp(2).normalize()),
        _ => None,
    };
    parsed.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            value.data_type(),
            Box::new(FromSqlError::InvalidType),
        )
    })
}

fn week_from_row(row: &Row<'_>) -> rusqlite::Result<Week> {
    Ok(Week {
        id: row.get(0)?,
        week_number: row.get(1)?,
        season: row.get(2)?,
        saturday_date: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn fixture_from_row(row: &Row<'_>) -> rusqlite::Result<Fixture> {
    Ok(Fixture {
        id: row.get(0)?,
        external_id: row.get(1)?,
        week_id: row.get(2)?,
        home_team: row.get(3)?,
        away_team: row.get(4)?,
        league_id: row.get(5)?,
        league_name: row.get(6)?,
        kickoff: row.get(7)?,
        home_score: row.get(8)?,
        away_score: row.get(9)?,
        match_status: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn selection_from_row(row: &Row<'_>) -> rusqlite::Result<Selection> {
    Ok(Selection {
        id: row.get(0)?,
        week_id: row.get(1)?,
        player_name: row.get(2)?,
        fixture_id: row.get(3)?,
        result: row.get(4)?,
        total_goals: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn fine_from_row(row: &Row<'_>) -> rusqlite::Result<Fine> {
    Ok(Fine {
        id: row.get(0)?,
        week_id: row.get(1)?,
        player_name: row.get(2)?,
        amount: amount_at(row, 3)?,
        reason: row.get(4)?,
        fixture_id: row.get(5)?,
        cleared: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
    })
}

const WEEK_COLUMNS: &str = "id, week_number, season, saturday_date, status, created_at";
const FIXTURE_COLUMNS: &str = "id, external_id, week_id, home_team, away_team, league_id, \
     league_name, kickoff, home_score, away_score, match_status, created_at";
const SELECTION_COLUMNS: &str =
    "id, week_id, player_name, fixture_id, result, total_goals, created_at";
const FINE_COLUMNS: &str =
    "id, week_id, player_name, amount, reason, fixture_id, cleared, created_at";

// ---------------------------------------------------------------- weeks

/// Insert the week for `saturday` if missing; an existing row is returned
/// untouched.
pub fn upsert_week_by_date(
    conn: &Connection,
    saturday: NaiveDate,
    week_number: u32,
    season: &str,
    now: DateTime<Utc>,
) -> Result<Week> {
    conn.execute(
        "INSERT INTO weeks (week_number, season, saturday_date, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(saturday_date) DO NOTHING",
        params![week_number, season, saturday, WeekStatus::Active, now],
    )
    .context("upsert week")?;
    week_by_date(conn, saturday)?
        .with_context(|| format!("week for {saturday} missing after upsert"))
}

pub fn week_by_id(conn: &Connection, week_id: i64) -> Result<Option<Week>> {
    conn.query_row(
        &format!("SELECT {WEEK_COLUMNS} FROM weeks WHERE id = ?1"),
        params![week_id],
        week_from_row,
    )
    .optional()
    .context("query week by id")
}

pub fn week_by_date(conn: &Connection, saturday: NaiveDate) -> Result<Option<Week>> {
    conn.query_row(
        &format!("SELECT {WEEK_COLUMNS} FROM weeks WHERE saturday_date = ?1"),
        params![saturday],
        week_from_row,
    )
    .optional()
    .context("query week by date")
}

/// Most recent active week by Saturday.
pub fn active_week(conn: &Connection) -> Result<Option<Week>> {
    conn.query_row(
        &format!(
            "SELECT {WEEK_COLUMNS} FROM weeks WHERE status = ?1
             ORDER BY saturday_date DESC LIMIT 1"
        ),
        params![WeekStatus::Active],
        week_from_row,
    )
    .optional()
    .context("query active week")
}

/// Newest first.
pub fn list_weeks(conn: &Connection, status: Option<WeekStatus>) -> Result<Vec<Week>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {WEEK_COLUMNS} FROM weeks
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY saturday_date DESC"
        ))
        .context("prepare list weeks query")?;
    let rows = stmt
        .query_map(params![status], week_from_row)
        .context("query weeks")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode week row")?);
    }
    Ok(out)
}

pub fn update_week_status(conn: &Connection, week_id: i64, status: WeekStatus) -> Result<()> {
    conn.execute(
        "UPDATE weeks SET status = ?1 WHERE id = ?2",
        params![status, week_id],
    )
    .context("update week status")?;
    Ok(())
}

/// Flip every active week to completed. Returns how many changed.
pub fn complete_active_weeks(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE weeks SET status = ?1 WHERE status = ?2",
        params![WeekStatus::Completed, WeekStatus::Active],
    )
    .context("complete active weeks")
}

// ------------------------------------------------------------- fixtures

/// Keyed on the provider id. `created_at` is only set on first insert so
/// the refresh cooldown measures from when the fixture list was loaded.
pub fn upsert_fixture(
    conn: &Connection,
    week_id: i64,
    fixture: &ProviderFixture,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO fixtures (
            external_id, week_id, home_team, away_team, league_id, league_name,
            kickoff, home_score, away_score, match_status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(external_id) DO UPDATE SET
            week_id = excluded.week_id,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            league_id = excluded.league_id,
            league_name = excluded.league_name,
            kickoff = excluded.kickoff,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            match_status = excluded.match_status
        "#,
        params![
            fixture.external_id,
            week_id,
            fixture.home_team,
            fixture.away_team,
            fixture.league_id,
            fixture.league_name,
            fixture.kickoff,
            fixture.home_score,
            fixture.away_score,
            fixture.status,
            now,
        ],
    )
    .context("upsert fixture")?;
    Ok(())
}

/// Score/status update from a results fetch. Returns false for unknown ids.
pub fn update_fixture_result(conn: &Connection, fixture: &ProviderFixture) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE fixtures SET home_score = ?1, away_score = ?2, match_status = ?3
             WHERE external_id = ?4",
            params![
                fixture.home_score,
                fixture.away_score,
                fixture.status,
                fixture.external_id
            ],
        )
        .context("update fixture result")?;
    Ok(changed > 0)
}

pub fn fixtures_for_week(conn: &Connection, week_id: i64) -> Result<Vec<Fixture>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE week_id = ?1
             ORDER BY league_name ASC, home_team ASC"
        ))
        .context("prepare fixtures query")?;
    let rows = stmt
        .query_map(params![week_id], fixture_from_row)
        .context("query fixtures")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode fixture row")?);
    }
    Ok(out)
}

pub fn latest_fixture_created_at(conn: &Connection, week_id: i64) -> Result<Option<DateTime<Utc>>> {
    conn.query_row(
        "SELECT MAX(created_at) FROM fixtures WHERE week_id = ?1",
        params![week_id],
        |row| row.get::<_, Option<DateTime<Utc>>>(0),
    )
    .context("query latest fixture creation")
}

// ----------------------------------------------------------- selections

/// Delete-then-insert the player's picks for the week in one transaction.
pub fn replace_selections(
    conn: &mut Connection,
    week_id: i64,
    player: &str,
    fixture_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<Vec<Selection>> {
    let tx = conn.transaction().context("begin selections transaction")?;
    tx.execute(
        "DELETE FROM selections WHERE week_id = ?1 AND player_name = ?2",
        params![week_id, player],
    )
    .context("delete previous selections")?;
    for fixture_id in fixture_ids {
        tx.execute(
            "INSERT INTO selections (week_id, player_name, fixture_id, result, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![week_id, player, fixture_id, SelectionResult::Pending, now],
        )
        .context("insert selection")?;
    }
    tx.commit().context("commit selections transaction")?;

    Ok(selections_for_week(conn, week_id)?
        .into_iter()
        .filter(|s| s.player_name == player)
        .collect())
}

pub fn delete_selections(conn: &Connection, week_id: i64, player: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM selections WHERE week_id = ?1 AND player_name = ?2",
        params![week_id, player],
    )
    .context("delete selections")
}

/// Grouped by player, then in submission order.
pub fn selections_for_week(conn: &Connection, week_id: i64) -> Result<Vec<Selection>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SELECTION_COLUMNS} FROM selections WHERE week_id = ?1
             ORDER BY player_name ASC, created_at ASC, id ASC"
        ))
        .context("prepare selections query")?;
    let rows = stmt
        .query_map(params![week_id], selection_from_row)
        .context("query selections")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode selection row")?);
    }
    Ok(out)
}

/// Every selection across weeks in submission order.
pub fn all_selections(conn: &Connection, player: Option<&str>) -> Result<Vec<Selection>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SELECTION_COLUMNS} FROM selections
             WHERE (?1 IS NULL OR player_name = ?1)
             ORDER BY created_at ASC, id ASC"
        ))
        .context("prepare all selections query")?;
    let rows = stmt
        .query_map(params![player], selection_from_row)
        .context("query all selections")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode selection row")?);
    }
    Ok(out)
}

pub fn update_selection_result(
    tx: &Transaction<'_>,
    selection_id: i64,
    result: SelectionResult,
    total_goals: Option<u32>,
) -> Result<()> {
    tx.execute(
        "UPDATE selections SET result = ?1, total_goals = ?2 WHERE id = ?3",
        params![result, total_goals, selection_id],
    )
    .context("update selection result")?;
    Ok(())
}

// ---------------------------------------------------------------- fines

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineFilter {
    pub player: Option<String>,
    pub week_id: Option<i64>,
    pub cleared: Option<bool>,
}

/// Oldest first.
pub fn list_fines(conn: &Connection, filter: &FineFilter) -> Result<Vec<Fine>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {FINE_COLUMNS} FROM fines
             WHERE (?1 IS NULL OR player_name = ?1)
               AND (?2 IS NULL OR week_id = ?2)
               AND (?3 IS NULL OR cleared = ?3)
             ORDER BY created_at ASC, id ASC"
        ))
        .context("prepare fines query")?;
    let rows = stmt
        .query_map(
            params![
                filter.player,
                filter.week_id,
                filter.cleared.map(i64::from)
            ],
            fine_from_row,
        )
        .context("query fines")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode fine row")?);
    }
    Ok(out)
}

/// Drop every uncleared fine of the week and write `fines` in its place.
/// Cleared rows are left alone.
pub fn replace_uncleared_fines(
    tx: &Transaction<'_>,
    week_id: i64,
    fines: &[NewFine],
    now: DateTime<Utc>,
) -> Result<usize> {
    let removed = tx
        .execute(
            "DELETE FROM fines WHERE week_id = ?1 AND cleared = 0",
            params![week_id],
        )
        .context("delete uncleared fines")?;
    insert_fines(tx, fines, now)?;
    Ok(removed)
}

pub fn insert_fines(conn: &Connection, fines: &[NewFine], now: DateTime<Utc>) -> Result<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO fines (week_id, player_name, amount, reason, fixture_id, cleared, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        )
        .context("prepare insert fine")?;
    for fine in fines {
        stmt.execute(params![
            fine.week_id,
            fine.player_name,
            fine.amount.normalize().to_string(),
            fine.reason,
            fine.fixture_id,
            now,
        ])
        .context("insert fine")?;
    }
    Ok(())
}

pub fn mark_fines_cleared(conn: &mut Connection, ids: &[i64]) -> Result<usize> {
    let tx = conn.transaction().context("begin clear fines transaction")?;
    let mut changed = 0usize;
    for id in ids {
        changed += tx
            .execute(
                "UPDATE fines SET cleared = 1 WHERE id = ?1 AND cleared = 0",
                params![id],
            )
            .context("clear fine")?;
    }
    tx.commit().context("commit clear fines transaction")?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap()
    }

    fn saturday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 4).unwrap()
    }

    #[test]
    fn open_db_reports_an_unusable_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let err = open_db(&blocker.join("betting.db")).unwrap_err();
        assert!(format!("{err:#}").contains("create db dir"), "{err:#}");
    }

    #[test]
    fn open_db_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("betting.db");
        let conn = open_db(&path).unwrap();
        assert!(active_week(&conn).unwrap().is_none());
        assert!(path.exists());
    }

    #[test]
    fn week_upsert_is_idempotent() {
        let conn = open_in_memory().unwrap();
        let first = upsert_week_by_date(&conn, saturday(), 10, "2025-26", now()).unwrap();
        let second = upsert_week_by_date(&conn, saturday(), 99, "other", now()).unwrap();
        assert_eq!(first, second);
        assert_eq!(list_weeks(&conn, None).unwrap().len(), 1);
        assert_eq!(active_week(&conn).unwrap().map(|w| w.id), Some(first.id));
    }

    #[test]
    fn amounts_read_from_text_integer_and_real() {
        let conn = open_in_memory().unwrap();
        let week = upsert_week_by_date(&conn, saturday(), 10, "2025-26", now()).unwrap();
        for amount in ["'5.00'", "2", "2.5"] {
            conn.execute(
                &format!(
                    "INSERT INTO fines (week_id, player_name, amount, reason, cleared, created_at)
                     VALUES (?1, 'Tommy', {amount}, 'legacy', 0, ?2)"
                ),
                params![week.id, now()],
            )
            .unwrap();
        }
        let fines = list_fines(&conn, &FineFilter::default()).unwrap();
        let amounts: Vec<Decimal> = fines.iter().map(|f| f.amount).collect();
        assert_eq!(
            amounts,
            vec![Decimal::new(5, 0), Decimal::new(2, 0), Decimal::new(25, 1)]
        );
    }
}
