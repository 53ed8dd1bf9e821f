//! CLI reminder commands and the `run` daemon.

use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use recollect::alarm::AlarmPayload;
use recollect::app::{self, App};
use recollect::parser::{parse_reminder, ReminderParse};
use recollect::reminder::{Reminder, ReminderKind};

/// Parse a reminder from free text and schedule it.
pub fn remind(app: &App, text: &str) -> Result<()> {
    let request = match parse_reminder(text, Utc::now(), app.config.reminders.tz()) {
        ReminderParse::Parsed(request) => request,
        ReminderParse::Malformed(reason) => bail!("{reason}: {text}"),
        ReminderParse::NotAReminder => {
            bail!("no time found; try \"remind me to stretch in 20 minutes\"")
        }
    };

    let reminder = app.reminders.create(request.into_new_reminder(app.owner()))?;
    println!("Scheduled:");
    print_reminder(&reminder);
    println!("Alarms fire while `recollect run` or `recollect serve` is running.");
    Ok(())
}

pub fn list(app: &App, include_retired: bool) -> Result<()> {
    let reminders = if include_retired {
        app.reminders.list(app.owner())?
    } else {
        app.reminders.list_active(app.owner())?
    };

    if reminders.is_empty() {
        println!("No reminders.");
        return Ok(());
    }
    for reminder in &reminders {
        print_reminder(reminder);
    }
    Ok(())
}

pub fn cancel(app: &App, id: &str) -> Result<()> {
    if app.reminders.cancel(id)? {
        println!("Cancelled {id}.");
    } else {
        println!("No reminder with id {id}.");
    }
    Ok(())
}

pub fn snooze(app: &App, id: &str, minutes: Option<u32>) -> Result<()> {
    let minutes = minutes.unwrap_or_else(|| app.reminders.default_snooze_minutes());
    match app.reminders.snooze(id, minutes)? {
        Some(reminder) => {
            println!("Snoozed for {minutes} minutes:");
            print_reminder(&reminder);
        }
        None => println!("No reminder with id {id}."),
    }
    Ok(())
}

pub fn promote(app: &App, id: &str, every: Option<u32>) -> Result<()> {
    let reminder = app.reminders.promote_to_recurring(id, every)?;
    println!("Now recurring:");
    print_reminder(&reminder);
    Ok(())
}

pub async fn reconcile(app: &App) -> Result<()> {
    let report = app::reconcile(Arc::clone(&app.reminders)).await?;
    println!(
        "Reconciled: {} expired, {} advanced, {} re-armed, {} orphan alarms removed, {} corrupt rows removed.",
        report.expired,
        report.advanced,
        report.rearmed,
        report.orphans_removed,
        report.corrupt_removed
    );
    Ok(())
}

/// Reconcile, then deliver alarms until ctrl-c.
pub async fn run(app: &App, alarms: UnboundedReceiver<AlarmPayload>) -> Result<()> {
    app::reconcile(Arc::clone(&app.reminders)).await?;

    let active = app.reminders.list_active(app.owner())?.len();
    tracing::info!(active, "reminder daemon running");

    tokio::select! {
        _ = app::run_alarm_loop(Arc::clone(&app.reminders), alarms) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down reminder daemon");
        }
    }
    Ok(())
}

fn print_reminder(reminder: &Reminder) {
    let schedule = match (reminder.kind, reminder.interval_minutes) {
        (ReminderKind::Recurring, Some(m)) => format!("every {m} min"),
        _ => "once".to_string(),
    };
    let state = if reminder.is_active { "active" } else { "retired" };
    println!(
        "  {}  [{schedule}, {state}] next {}  {}",
        reminder.id,
        reminder.next_trigger.format("%Y-%m-%d %H:%M UTC"),
        reminder.message
    );
}
