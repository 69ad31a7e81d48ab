use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use bulk_core::reminders::ScheduleReport;

use super::helpers::{print_json, truncate};
use crate::app::App;

fn print_report(report: &ScheduleReport) {
    println!(
        "Scheduled {} of {} reminders ({})",
        report.scheduled, report.planned, report.platform
    );
    if report.failed > 0 {
        println!("  {} could not be scheduled", report.failed);
    }
    if report.skipped_meals > 0 {
        println!(
            "  {} meal(s) skipped: time is not HH:MM",
            report.skipped_meals
        );
    }
}

pub(crate) fn cmd_reminders_sync(app: &App, force: bool, json: bool) -> Result<()> {
    let scheduler = app.scheduler()?;
    let meals = app.store.meals();
    let report = if force {
        Some(scheduler.sync_meal_reminders(&meals))
    } else {
        scheduler.schedule_if_needed(&meals)
    };

    if json {
        #[derive(Serialize)]
        struct SyncResult {
            skipped: bool,
            report: Option<ScheduleReport>,
        }
        return print_json(&SyncResult {
            skipped: report.is_none(),
            report,
        });
    }

    match report {
        Some(report) => print_report(&report),
        None => {
            let last = scheduler
                .last_scheduled()?
                .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!("Reminders are up to date (last scheduled {last}). Use --force to reschedule");
        }
    }
    Ok(())
}

pub(crate) fn cmd_reminders_list(app: &App, json: bool) -> Result<()> {
    let pruned = app.cache.prune_alarms_before(Local::now().naive_local())?;
    if pruned > 0 {
        tracing::debug!(pruned, "dropped reminders already past");
    }
    let alarms = app.cache.list_alarms()?;
    if json {
        return print_json(&alarms);
    }
    if alarms.is_empty() {
        eprintln!("No reminders scheduled");
        return Ok(());
    }

    #[derive(Tabled)]
    struct AlarmRow {
        #[tabled(rename = "Fires at")]
        fire_at: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Message")]
        message: String,
    }

    let rows: Vec<AlarmRow> = alarms
        .iter()
        .map(|a| AlarmRow {
            fire_at: a.fire_at.format("%a %Y-%m-%d %H:%M").to_string(),
            title: truncate(&a.title, 30),
            message: truncate(&a.message, 40),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_reminders_clear(app: &App, json: bool) -> Result<()> {
    let before = app.cache.list_alarms()?.len();
    app.scheduler()?.cancel_all();

    if json {
        return print_json(&serde_json::json!({ "cleared": before }));
    }
    println!("Cleared {before} reminder(s)");
    Ok(())
}
