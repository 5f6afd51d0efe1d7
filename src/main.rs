use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use betting_overs::calendar::{home_today, relevant_saturday};
use betting_overs::config::{Config, ResultsSource};
use betting_overs::fake_provider::FakeProvider;
use betting_overs::ledger::{ClearSelector, format_amount};
use betting_overs::model::{Fine, Fixture, SelectionWithFixture, Week, WeekReport};
use betting_overs::provider::ResultsProvider;
use betting_overs::sofascore::SofascoreProvider;
use betting_overs::store::{self, FineFilter};
use betting_overs::tracker::{FinesReport, StatsReport, Tracker, WeekFixtures};

#[derive(Parser, Debug)]
#[command(name = "betting_overs")]
#[command(about = "Weekly over-goals picks, results and fines")]
struct Cli {
    /// SQLite database path (overrides BETTING_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show this week's fixtures, loading them on first use
    Fixtures {
        /// Whole weeks relative to the current Saturday
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
    },
    /// Refetch this week's fixtures (rate limited)
    Refresh,
    /// List weeks
    Weeks {
        #[arg(long)]
        active: bool,
    },
    /// Submit a player's picks, replacing any earlier set
    Select {
        #[arg(long)]
        player: String,
        #[arg(long = "fixture", required = true, num_args = 1..)]
        fixtures: Vec<i64>,
        #[arg(long)]
        week: Option<i64>,
    },
    /// Withdraw a player's picks
    Unselect {
        #[arg(long)]
        player: String,
        #[arg(long)]
        week: Option<i64>,
    },
    /// Show picks with their fixtures
    Selections {
        #[arg(long)]
        week: Option<i64>,
    },
    /// Settle results and regenerate fines
    Check {
        #[arg(long)]
        week: Option<i64>,
        /// Ignore the matchday results cutoff
        #[arg(long)]
        force: bool,
    },
    /// Complete every active week
    Reset,
    /// List fines with per-player totals
    Fines {
        #[arg(long)]
        player: Option<String>,
        #[arg(long)]
        week: Option<i64>,
        #[arg(long)]
        cleared: Option<bool>,
    },
    /// Mark fines as paid
    #[command(group(ArgGroup::new("target").required(true).args(["player", "ids", "all"])))]
    ClearFines {
        #[arg(long)]
        player: Option<String>,
        #[arg(long = "id", num_args = 1..)]
        ids: Vec<i64>,
        #[arg(long)]
        all: bool,
    },
    /// Player statistics and weekly breakdown
    Stats {
        #[arg(long)]
        player: Option<String>,
    },
    /// Completed weeks, or one week in full
    History {
        #[arg(long)]
        week: Option<i64>,
    },
    /// Picks formatted for the group chat
    Share {
        #[arg(long)]
        week: Option<i64>,
    },
    /// Write fines, stats and weeks to an .xlsx workbook
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(db) = cli.db.clone() {
        config.db_path = Some(db);
    }

    let db_path = config
        .db_path
        .clone()
        .ok_or_else(|| anyhow!("no database path: set BETTING_DB or pass --db"))?;
    let conn = store::open_db(&db_path)?;

    let now = Utc::now();
    let offset = match &cli.command {
        Command::Fixtures { offset } => *offset,
        _ => 0,
    };
    let provider = build_provider(&config, now, offset)?;
    let mut tracker = Tracker::new(conn, config, provider);
    run(&mut tracker, cli.command, cli.json, now)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "betting_overs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_provider(
    config: &Config,
    now: DateTime<Utc>,
    offset: i64,
) -> Result<Box<dyn ResultsProvider>> {
    match config.results_source {
        ResultsSource::Sofascore => Ok(Box::new(SofascoreProvider::from_config(config)?)),
        ResultsSource::Fake => {
            let today = config
                .test_date
                .unwrap_or_else(|| home_today(now, config.timezone));
            let saturday = relevant_saturday(today, offset)
                .with_context(|| format!("week offset {offset} is out of range"))?;
            Ok(Box::new(FakeProvider::demo(
                saturday,
                config.timezone,
                config.kickoff_time,
            )))
        }
    }
}

fn run(
    tracker: &mut Tracker<Box<dyn ResultsProvider>>,
    command: Command,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    match command {
        Command::Fixtures { offset } => {
            let week = tracker.current_week(now, offset)?;
            emit(json, &week, print_week_fixtures)
        }
        Command::Refresh => {
            let week = tracker.refresh_fixtures(now)?;
            emit(json, &week, print_week_fixtures)
        }
        Command::Weeks { active } => {
            let weeks: Vec<Week> = if active {
                tracker.active_week()?.into_iter().collect()
            } else {
                tracker.weeks()?
            };
            emit(json, &weeks, |weeks| {
                if weeks.is_empty() {
                    println!("no weeks yet");
                }
                for week in weeks {
                    println!("{}", week_line(week));
                }
            })
        }
        Command::Select {
            player,
            fixtures,
            week,
        } => {
            let receipt = tracker.submit_selections(week, &player, &fixtures, now)?;
            emit(json, &receipt, |receipt| {
                println!(
                    "saved {} picks for {} (week id {})",
                    receipt.selections.len(),
                    receipt.player_name,
                    receipt.week_id
                );
                if receipt.all_submitted {
                    println!("everyone has submitted");
                }
            })
        }
        Command::Unselect { player, week } => {
            let removed = tracker.clear_selections(week, &player)?;
            emit(json, &removed, |removed| {
                println!("removed {removed} picks for {player}");
            })
        }
        Command::Selections { week } => {
            let selections = tracker.selections(week)?;
            emit(json, &selections, |selections| print_selections(selections))
        }
        Command::Check { week, force } => {
            let report = tracker.check_results(week, now, force)?;
            emit(json, &report, print_report)
        }
        Command::Reset => {
            let changed = tracker.reset_weeks()?;
            emit(json, &changed, |changed| {
                println!("completed {changed} active week(s)");
            })
        }
        Command::Fines {
            player,
            week,
            cleared,
        } => {
            let report = tracker.fines(&FineFilter {
                player,
                week_id: week,
                cleared,
            })?;
            emit(json, &report, print_fines)
        }
        Command::ClearFines { player, ids, all } => {
            let selector = if all {
                ClearSelector::All
            } else if let Some(player) = player {
                ClearSelector::Player(player)
            } else {
                ClearSelector::Ids(ids)
            };
            let cleared = tracker.clear_fines(&selector)?;
            emit(json, &cleared, |cleared| {
                println!("cleared {} fine(s)", cleared.len());
                for fine in cleared {
                    println!("  {}", fine_line(fine));
                }
            })
        }
        Command::Stats { player } => {
            let report = tracker.stats(player.as_deref())?;
            emit(json, &report, print_stats)
        }
        Command::History { week } => {
            let reports = tracker.history(week)?;
            emit(json, &reports, |reports| {
                if reports.is_empty() {
                    println!("no completed weeks");
                }
                for report in reports {
                    print_report(report);
                    println!();
                }
            })
        }
        Command::Share { week } => {
            let text = tracker.share_text(week)?;
            emit(json, &text, |text| println!("{text}"))
        }
        Command::Export { out } => {
            let report = tracker
                .export(&out)
                .with_context(|| format!("export to {}", out.display()))?;
            emit(json, &report, |report| {
                println!(
                    "wrote {} ({} fines, {} players, {} weeks)",
                    out.display(),
                    report.fines,
                    report.players,
                    report.weeks
                );
            })
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        let raw = serde_json::to_string_pretty(value).context("serialize output")?;
        println!("{raw}");
    } else {
        text(value);
    }
    Ok(())
}

fn week_line(week: &Week) -> String {
    format!(
        "#{:<4} week {:>2}  {}  {}  {}",
        week.id, week.week_number, week.season, week.saturday_date, week.status
    )
}

fn fixture_line(fixture: &Fixture) -> String {
    let score = match (fixture.home_score, fixture.away_score) {
        (Some(h), Some(a)) => format!("{h}-{a}"),
        _ => "-".to_string(),
    };
    format!(
        "{:>6}  {:<22} {:<40} {:>5} {}",
        fixture.id,
        fixture.league_name,
        fixture.label(),
        score,
        fixture.match_status
    )
}

fn fine_line(fine: &Fine) -> String {
    format!(
        "#{:<5} {:<8} {:>8}  {}{}",
        fine.id,
        fine.player_name,
        format_amount(fine.amount),
        fine.reason,
        if fine.cleared { "  (cleared)" } else { "" }
    )
}

fn print_week_fixtures(week: &WeekFixtures) {
    println!("{}", week_line(&week.week));
    if week.fixtures.is_empty() {
        println!("  no fixtures");
    }
    for fixture in &week.fixtures {
        println!("{}", fixture_line(fixture));
    }
}

fn print_selections(selections: &[SelectionWithFixture]) {
    if selections.is_empty() {
        println!("no selections");
    }
    for item in selections {
        let sel = &item.selection;
        let fixture = item
            .fixture
            .as_ref()
            .map(fixture_line)
            .unwrap_or_else(|| format!("fixture {} missing", sel.fixture_id));
        println!("{:<8} {:<8} {}", sel.player_name, sel.result, fixture.trim_start());
    }
}

fn print_report(report: &WeekReport) {
    println!("{}", week_line(&report.week));
    print_selections(&report.selections);
    if !report.fines.is_empty() {
        println!("fines:");
        for fine in &report.fines {
            println!("  {}", fine_line(fine));
        }
    }
}

fn print_fines(report: &FinesReport) {
    for fine in &report.fines {
        println!("{}", fine_line(fine));
    }
    if !report.summary.is_empty() {
        println!();
    }
    for (player, totals) in &report.summary {
        println!(
            "{:<8} total {:>8}  outstanding {:>8}  cleared {:>8}",
            player,
            format_amount(totals.total),
            format_amount(totals.outstanding),
            format_amount(totals.cleared)
        );
    }
}

fn print_stats(report: &StatsReport) {
    for p in &report.players {
        println!(
            "{:<8} picks {:>3}  W {:>3}  L {:>3}  P {:>2}  win {:>3}%  streak {} (best {})  fines {} outstanding {}",
            p.player_name,
            p.total_selections,
            p.wins,
            p.losses,
            p.pending,
            p.win_rate,
            p.current_streak,
            p.best_streak,
            format_amount(p.total_fines),
            format_amount(p.outstanding_fines)
        );
    }
    for row in &report.weeks {
        let results: Vec<String> = row
            .player_results
            .iter()
            .map(|(player, c)| format!("{player} {}/{}/{}", c.won, c.lost, c.pending))
            .collect();
        println!(
            "week {:>2} {}  {}  fines {}",
            row.week.week_number,
            row.week.saturday_date,
            results.join(", "),
            format_amount(row.fines_total)
        );
    }
}
