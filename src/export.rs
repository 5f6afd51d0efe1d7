use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;

use crate::ledger::format_amount;
use crate::model::{Fine, Week};
use crate::stats::PlayerStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub fines: usize,
    pub players: usize,
    pub weeks: usize,
}

pub fn export_workbook(
    path: &Path,
    fines: &[Fine],
    stats: &[PlayerStats],
    weeks: &[Week],
) -> Result<ExportReport> {
    let mut fines_rows = vec![vec![
        "id".to_string(),
        "week_id".to_string(),
        "player".to_string(),
        "amount".to_string(),
        "reason".to_string(),
        "fixture_id".to_string(),
        "cleared".to_string(),
        "created_at".to_string(),
    ]];
    fines_rows.extend(fines.iter().map(fine_row));

    let mut stats_rows = vec![vec![
        "player".to_string(),
        "selections".to_string(),
        "wins".to_string(),
        "losses".to_string(),
        "pending".to_string(),
        "win_rate_pct".to_string(),
        "total_fines".to_string(),
        "outstanding".to_string(),
        "cleared".to_string(),
        "current_streak".to_string(),
        "best_streak".to_string(),
    ]];
    stats_rows.extend(stats.iter().map(stats_row));

    let mut weeks_rows = vec![vec![
        "id".to_string(),
        "week".to_string(),
        "season".to_string(),
        "saturday".to_string(),
        "status".to_string(),
    ]];
    weeks_rows.extend(weeks.iter().map(week_row));

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Fines")?;
        write_rows(sheet, &fines_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Stats")?;
        write_rows(sheet, &stats_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Weeks")?;
        write_rows(sheet, &weeks_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        fines: fines_rows.len().saturating_sub(1),
        players: stats_rows.len().saturating_sub(1),
        weeks: weeks_rows.len().saturating_sub(1),
    })
}

fn fine_row(fine: &Fine) -> Vec<String> {
    vec![
        fine.id.to_string(),
        fine.week_id.to_string(),
        fine.player_name.clone(),
        format_amount(fine.amount),
        fine.reason.clone(),
        opt_to_string(fine.fixture_id),
        if fine.cleared { "yes" } else { "no" }.to_string(),
        fine.created_at.to_rfc3339(),
    ]
}

fn stats_row(stats: &PlayerStats) -> Vec<String> {
    vec![
        stats.player_name.clone(),
        stats.total_selections.to_string(),
        stats.wins.to_string(),
        stats.losses.to_string(),
        stats.pending.to_string(),
        stats.win_rate.to_string(),
        format_amount(stats.total_fines),
        format_amount(stats.outstanding_fines),
        format_amount(stats.cleared_fines),
        stats.current_streak.to_string(),
        stats.best_streak.to_string(),
    ]
}

fn week_row(week: &Week) -> Vec<String> {
    vec![
        week.id.to_string(),
        week.week_number.to_string(),
        week.season.clone(),
        week.saturday_date.to_string(),
        week.status.to_string(),
    ]
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
