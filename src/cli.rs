use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::analytics::{Analytics, PriorityBreakdown, Window, activity_level, month_days};
use crate::context::AppContext;
use crate::models::{Priority, Task, TaskUpdate, sort_by_priority};
use crate::persistence::KeyValueStore;
use crate::store::StoreError;
use crate::timer::{Clock, format_clock};
use crate::transfer::{self, ImportError};
use crate::utils::{format_minutes, parse_date};

#[derive(Parser)]
#[command(name = "taskdash")]
#[command(about = "Personal task dashboard with streaks, time analytics and a pomodoro timer")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long, global = true)]
    pub dev: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep everything in memory; nothing is read from or written to disk
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive dashboard (default if no subcommand)
    Dash,
    /// Add a new task
    Add {
        /// Task text
        text: String,
        /// low, medium or high
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List tasks
    List {
        /// Only incomplete tasks
        #[arg(long, conflicts_with = "done")]
        pending: bool,
        /// Only completed tasks
        #[arg(long)]
        done: bool,
        /// Incomplete first, then by priority
        #[arg(long)]
        sort: bool,
        #[arg(long)]
        category: Option<String>,
    },
    /// Mark a task completed, or back to pending
    Toggle {
        /// Task id or unique prefix
        id: String,
    },
    /// Change a task's text, priority, category or time spent
    Update {
        /// Task id or unique prefix
        id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long, conflicts_with = "no_category")]
        category: Option<String>,
        /// Remove the category
        #[arg(long)]
        no_category: bool,
        /// Overwrite accumulated minutes
        #[arg(long)]
        time_spent: Option<u32>,
    },
    /// Delete a task
    Delete {
        /// Task id or unique prefix
        id: String,
    },
    /// Delete all tasks and settings
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Show statistics
    Stats {
        /// Anchor date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// 7d, 30d, 180d or 365d
        #[arg(short, long)]
        window: Option<Window>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Yearly completion heatmap
    Heatmap {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Pomodoro timer
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },
    /// Write a JSON backup
    Export {
        /// Output file, `-` for stdout. Defaults to todo-backup-YYYY-MM-DD.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace all tasks with a JSON backup
    Import { path: PathBuf },
    /// Replace all tasks with the sample data set
    Sample {
        #[arg(long)]
        yes: bool,
    },
    /// Toggle dark mode for the dashboard
    DarkMode,
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session on a task
    Start { id: String },
    /// Stop the running session and record it
    Stop { id: String },
    /// Cancel the running session; it is recorded as incomplete
    Reset { id: String },
    /// Show running sessions, or one task's timer
    Status { id: Option<String> },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Refusing to {0} without --yes")]
    ConfirmationRequired(&'static str),
    #[error("Nothing to update; pass --text, --priority, --category, --no-category or --time-spent")]
    NothingToUpdate,
    #[error("The dashboard needs an interactive terminal")]
    NotInteractive,
}

/// First characters of an id, enough to type back as a prefix
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

/// Run one non-interactive command against the context, writing to `out`
pub fn execute<S: KeyValueStore, C: Clock>(
    command: Commands,
    ctx: &mut AppContext<S, C>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Commands::Dash => Err(CliError::NotInteractive),
        Commands::Add { text, priority, category } => {
            let task = ctx.add_task(&text, priority, category)?;
            writeln!(out, "Task created successfully (ID: {})", short_id(&task.id))?;
            Ok(())
        }
        Commands::List { pending, done, sort, category } => {
            let mut tasks: Vec<Task> = ctx
                .tasks()
                .iter()
                .filter(|t| !pending || !t.completed)
                .filter(|t| !done || t.completed)
                .filter(|t| category.as_ref().is_none_or(|c| t.category.as_ref() == Some(c)))
                .cloned()
                .collect();
            if sort {
                sort_by_priority(&mut tasks);
            }
            handle_list(&tasks, out)
        }
        Commands::Toggle { id } => {
            let id = ctx.resolve_id(&id)?;
            let task = ctx.toggle_task(&id)?;
            let state = if task.completed { "completed" } else { "pending" };
            writeln!(out, "Task {} marked {}", short_id(&task.id), state)?;
            Ok(())
        }
        Commands::Update { id, text, priority, category, no_category, time_spent } => {
            let update = TaskUpdate {
                text,
                priority,
                category: if no_category { Some(None) } else { category.map(Some) },
                time_spent,
            };
            if update.is_empty() {
                return Err(CliError::NothingToUpdate);
            }
            let id = ctx.resolve_id(&id)?;
            let task = ctx.update_task(&id, update)?;
            writeln!(out, "Task {} updated", short_id(&task.id))?;
            Ok(())
        }
        Commands::Delete { id } => {
            let id = ctx.resolve_id(&id)?;
            ctx.delete_task(&id);
            writeln!(out, "Task {} deleted", short_id(&id))?;
            Ok(())
        }
        Commands::Clear { yes } => {
            if !yes {
                return Err(CliError::ConfirmationRequired("delete all tasks"));
            }
            ctx.clear_all();
            writeln!(out, "All tasks deleted")?;
            Ok(())
        }
        Commands::Stats { date, window, json } => {
            let anchor = match date {
                Some(date) => parse_date(&date)
                    .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", date, e)))?,
                None => ctx.now().with_timezone(&Local).date_naive(),
            };
            let window = window.unwrap_or(ctx.config().default_window);
            handle_stats(ctx.tasks(), anchor, window, json, out)
        }
        Commands::Heatmap { year } => {
            let year = year.unwrap_or_else(|| ctx.now().with_timezone(&Local).year());
            handle_heatmap(ctx.tasks(), year, out)
        }
        Commands::Timer { action } => handle_timer(action, ctx, out),
        Commands::Export { output } => {
            let json = ctx.export_json()?;
            match output {
                Some(path) if path.as_os_str() == "-" => writeln!(out, "{}", json)?,
                output => {
                    let path = output.unwrap_or_else(|| {
                        PathBuf::from(transfer::export_file_name(ctx.now().with_timezone(&Local).date_naive()))
                    });
                    std::fs::write(&path, json)?;
                    writeln!(out, "Exported {} tasks to {}", ctx.tasks().len(), path.display())?;
                }
            }
            Ok(())
        }
        Commands::Import { path } => {
            let contents = std::fs::read_to_string(&path).map_err(ImportError::from)?;
            let count = ctx.import_json(&contents)?;
            writeln!(out, "Imported {} tasks from {}", count, path.display())?;
            Ok(())
        }
        Commands::Sample { yes } => {
            if !yes {
                return Err(CliError::ConfirmationRequired("replace all tasks with sample data"));
            }
            ctx.load_sample_data();
            writeln!(out, "Loaded {} sample tasks", ctx.tasks().len())?;
            Ok(())
        }
        Commands::DarkMode => {
            let dark = ctx.toggle_dark_mode();
            writeln!(out, "Dark mode {}", if dark { "on" } else { "off" })?;
            Ok(())
        }
    }
}

fn handle_list(tasks: &[Task], out: &mut impl Write) -> Result<(), CliError> {
    if tasks.is_empty() {
        writeln!(out, "No tasks")?;
        return Ok(());
    }
    for task in tasks {
        writeln!(
            out,
            "[{}] {:<8}  {:<6}  {:<10}  {}{}",
            if task.completed { "x" } else { " " },
            short_id(&task.id),
            task.priority,
            task.category.as_deref().unwrap_or("-"),
            task.text,
            if task.time_spent > 0 {
                format!("  ({})", format_minutes(u64::from(task.time_spent)))
            } else {
                String::new()
            },
        )?;
    }
    Ok(())
}

fn format_breakdown(breakdown: &PriorityBreakdown) -> String {
    Priority::ALL
        .iter()
        .map(|p| format!("{} {}", p, breakdown.get(*p)))
        .collect::<Vec<_>>()
        .join("  ")
}

fn handle_stats(
    tasks: &[Task],
    anchor: NaiveDate,
    window: Window,
    json: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let report = Analytics::new(tasks, anchor, Local).report(window);
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let stats = &report.stats;
    writeln!(out, "Stats for {} (window {})", report.anchor, report.window)?;
    writeln!(
        out,
        "Tasks        {} total, {} completed, {} pending",
        stats.total, stats.completed, stats.pending
    )?;
    writeln!(out, "Today        {} completed", stats.completed_today)?;
    writeln!(out, "Streak       {} day{}", stats.streak, if stats.streak == 1 { "" } else { "s" })?;
    writeln!(
        out,
        "Time spent   {} (avg {} per completed task)",
        format_minutes(stats.total_time_spent),
        format_minutes(stats.average_time_per_task.round() as u64)
    )?;
    writeln!(out)?;
    writeln!(out, "Pending by priority     {}", format_breakdown(&report.pending_by_priority))?;
    writeln!(out, "Completed by priority")?;
    for (window, breakdown) in &report.completed_by_priority {
        writeln!(out, "  {:<5} {}", window.label(), format_breakdown(breakdown))?;
    }
    writeln!(out)?;

    let completed_in_window: u32 = report.trend.iter().map(|p| p.completed).sum();
    writeln!(out, "Completed in last {}: {}", window, completed_in_window)?;
    let time = &report.time_summary;
    writeln!(
        out,
        "Focus time in last {}: {} (avg {:.1}m/day, best day {})",
        window,
        format_minutes(time.total),
        time.average,
        format_minutes(time.max)
    )?;
    Ok(())
}

fn handle_heatmap(tasks: &[Task], year: i32, out: &mut impl Write) -> Result<(), CliError> {
    const SHADES: [char; 5] = ['·', '░', '▒', '▓', '█'];

    let activity = Analytics::new(tasks, NaiveDate::MIN, Local).activity_for_year(year);
    writeln!(out, "{}", year)?;
    for month in 1..=12 {
        let row: String = month_days(year, month)
            .iter()
            .map(|day| SHADES[usize::from(activity_level(activity.get(day).copied().unwrap_or(0)))])
            .collect();
        let label = NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.format("%b").to_string());
        writeln!(out, "{:<4}{}", label.unwrap_or_default(), row)?;
    }
    let total: u32 = activity.values().sum();
    writeln!(out, "{} tasks completed on {} days", total, activity.len())?;
    Ok(())
}

fn handle_timer<S: KeyValueStore, C: Clock>(
    action: TimerAction,
    ctx: &mut AppContext<S, C>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match action {
        TimerAction::Start { id } => {
            let id = ctx.resolve_id(&id)?;
            if ctx.start_timer(&id)? {
                writeln!(out, "Timer started for {}", short_id(&id))?;
            } else {
                writeln!(out, "Timer already running for {}", short_id(&id))?;
            }
        }
        TimerAction::Stop { id } => {
            let id = ctx.resolve_id(&id)?;
            report_closed(ctx.stop_timer(&id, false)?, &id, out)?;
        }
        TimerAction::Reset { id } => {
            let id = ctx.resolve_id(&id)?;
            report_closed(ctx.stop_timer(&id, true)?, &id, out)?;
        }
        TimerAction::Status { id: Some(id) } => {
            let id = ctx.resolve_id(&id)?;
            let tracker = ctx.tracker(&id);
            if tracker.is_running() {
                writeln!(
                    out,
                    "{}  {} / {}",
                    short_id(&id),
                    format_clock(tracker.displayed_secs()),
                    format_clock(tracker.target_secs())
                )?;
            } else {
                writeln!(out, "No timer running for {}", short_id(&id))?;
            }
        }
        TimerAction::Status { id: None } => {
            let trackers = ctx.running_trackers();
            if trackers.is_empty() {
                writeln!(out, "No timers running")?;
            }
            for tracker in trackers {
                let text = ctx
                    .tasks()
                    .iter()
                    .find(|t| t.id == tracker.task_id())
                    .map_or("", |t| t.text.as_str());
                writeln!(
                    out,
                    "{:<8}  {} / {}  {}",
                    short_id(tracker.task_id()),
                    format_clock(tracker.displayed_secs()),
                    format_clock(tracker.target_secs()),
                    text
                )?;
            }
        }
    }
    Ok(())
}

fn report_closed(
    closed: Option<crate::timer::ClosedSession>,
    id: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match closed {
        Some(closed) => writeln!(
            out,
            "Recorded {} on {}{}",
            format_minutes(u64::from(closed.minutes())),
            short_id(id),
            if closed.session.completed { " (pomodoro completed)" } else { "" }
        )?,
        None => writeln!(out, "No timer running for {}", short_id(id))?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::persistence::MemoryStore;
    use crate::timer::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 30, 12, 0, 0).unwrap()
    }

    fn context() -> AppContext<MemoryStore, ManualClock> {
        AppContext::init(MemoryStore::new(), ManualClock::new(t0()), Config::default())
    }

    fn run(ctx: &mut AppContext<MemoryStore, ManualClock>, args: &[&str]) -> Result<String, CliError> {
        let cli = Cli::try_parse_from(std::iter::once("taskdash").chain(args.iter().copied()))
            .map_err(|e| CliError::Io(std::io::Error::other(e.to_string())))?;
        let mut out = Vec::new();
        execute(cli.command.unwrap_or(Commands::Dash), ctx, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn global_flags_parse_anywhere() {
        let cli = Cli::try_parse_from(["taskdash", "list", "--dev", "--ephemeral"]).unwrap();
        assert!(cli.dev);
        assert!(cli.ephemeral);
        assert!(matches!(cli.command, Some(Commands::List { .. })));

        let cli = Cli::try_parse_from(["taskdash"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn rejects_unknown_priority() {
        assert!(Cli::try_parse_from(["taskdash", "add", "x", "--priority", "urgent"]).is_err());
    }

    #[test]
    fn add_then_list() {
        let mut ctx = context();
        run(&mut ctx, &["clear", "--yes"]).unwrap();
        let output = run(&mut ctx, &["add", "Write report", "-p", "high", "-c", "Work"]).unwrap();
        assert!(output.starts_with("Task created successfully"));

        let listing = run(&mut ctx, &["list"]).unwrap();
        assert!(listing.contains("high"));
        assert!(listing.contains("Work"));
        assert!(listing.contains("Write report"));
    }

    #[test]
    fn list_filters() {
        let mut ctx = context();
        let pending = run(&mut ctx, &["list", "--pending"]).unwrap();
        assert_eq!(pending.lines().count(), 3);
        let done = run(&mut ctx, &["list", "--done", "--category", "Work"]).unwrap();
        assert!(done.lines().all(|l| l.starts_with("[x]") && l.contains("Work")));
    }

    #[test]
    fn toggle_by_prefix_and_delete() {
        let mut ctx = context();
        let output = run(&mut ctx, &["toggle", "3"]).unwrap();
        assert_eq!(output, "Task 3 marked completed\n");
        assert!(ctx.tasks().iter().any(|t| t.id == "3" && t.completed));

        run(&mut ctx, &["delete", "3"]).unwrap();
        assert!(ctx.tasks().iter().all(|t| t.id != "3"));
        assert!(matches!(run(&mut ctx, &["delete", "3"]), Err(CliError::Store(StoreError::NotFound(_)))));
    }

    #[test]
    fn update_requires_a_change() {
        let mut ctx = context();
        assert!(matches!(run(&mut ctx, &["update", "1"]), Err(CliError::NothingToUpdate)));

        run(&mut ctx, &["update", "1", "--no-category", "--priority", "low"]).unwrap();
        let task = ctx.tasks().iter().find(|t| t.id == "1").unwrap();
        assert_eq!(task.category, None);
        assert_eq!(task.priority, Priority::Low);
    }

    #[test]
    fn destructive_commands_need_confirmation() {
        let mut ctx = context();
        assert!(matches!(run(&mut ctx, &["clear"]), Err(CliError::ConfirmationRequired(_))));
        assert!(matches!(run(&mut ctx, &["sample"]), Err(CliError::ConfirmationRequired(_))));
        assert_eq!(ctx.tasks().len(), 6);
    }

    #[test]
    fn stats_reports_totals() {
        let mut ctx = context();
        let output = run(&mut ctx, &["stats", "--date", "2025-07-30", "--window", "7d"]).unwrap();
        assert!(output.contains("Stats for 2025-07-30 (window 7d)"));
        assert!(output.contains("6 total, 3 completed, 3 pending"));
        assert!(output.contains("Time spent   4h 25m"));

        assert!(matches!(
            run(&mut ctx, &["stats", "--date", "30/07/2025"]),
            Err(CliError::DateParseError(_))
        ));
    }

    #[test]
    fn stats_json_is_a_report() {
        let mut ctx = context();
        let output = run(&mut ctx, &["stats", "--date", "2025-07-30", "--json"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["window"], "30d");
        assert_eq!(value["stats"]["total"], 6);
        assert_eq!(value["trend"].as_array().unwrap().len(), 30);
    }

    #[test]
    fn heatmap_has_a_row_per_month() {
        let mut ctx = context();
        let output = run(&mut ctx, &["heatmap", "--year", "2025"]).unwrap();
        assert_eq!(output.lines().count(), 14);
        assert!(output.lines().last().unwrap().starts_with("3 tasks completed"));
    }

    #[test]
    fn timer_commands_round_trip() {
        let mut ctx = context();
        assert_eq!(run(&mut ctx, &["timer", "start", "3"]).unwrap(), "Timer started for 3\n");
        assert_eq!(run(&mut ctx, &["timer", "start", "3"]).unwrap(), "Timer already running for 3\n");

        ctx.clock().advance(Duration::seconds(600));
        let status = run(&mut ctx, &["timer", "status"]).unwrap();
        assert!(status.contains("10:00 / 25:00"));
        assert!(status.contains("Buy groceries"));

        let stopped = run(&mut ctx, &["timer", "stop", "3"]).unwrap();
        assert_eq!(stopped, "Recorded 10m on 3\n");
        assert_eq!(run(&mut ctx, &["timer", "status", "3"]).unwrap(), "No timer running for 3\n");
        let task = ctx.tasks().iter().find(|t| t.id == "3").unwrap();
        assert_eq!(task.time_spent, 10);
    }

    #[test]
    fn export_and_import_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let path_str = path.to_str().unwrap();

        let mut ctx = context();
        let output = run(&mut ctx, &["export", "--output", path_str]).unwrap();
        assert!(output.starts_with("Exported 6 tasks"));

        run(&mut ctx, &["clear", "--yes"]).unwrap();
        let output = run(&mut ctx, &["import", path_str]).unwrap();
        assert!(output.starts_with("Imported 6 tasks"));
        assert_eq!(ctx.tasks().len(), 6);
    }

    #[test]
    fn short_ids() {
        assert_eq!(short_id("01j2abcdefgh"), "01j2abcd");
        assert_eq!(short_id("3"), "3");
    }
}
