//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use recollect::config::RecollectConfig;
use recollect::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &RecollectConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `recollect save <text>` or `recollect serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    println!("Recollect Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Timezone:          {}", config.reminders.tz());
    println!();
    println!("Embeddings:");
    println!("  Provider:        {} ({})", config.embedding.provider, config.embedding.model);
    match report.embedding_dimensions {
        Some(stored) if stored != config.embedding.dimensions => {
            println!("  Dimensions:      {stored} stored, {} configured", config.embedding.dimensions);
            println!("  WARNING: dimension mismatch! Run `recollect backfill` to re-embed memories.");
        }
        Some(stored) => println!("  Dimensions:      {stored} (match)"),
        None => println!("  Dimensions:      (not set)"),
    }
    if report.memories_without_embedding > 0 {
        println!(
            "  {} memories have no vector; `recollect backfill` will embed them.",
            report.memories_without_embedding
        );
    }
    println!();
    println!("Row counts:");
    println!("  Memories:          {}", report.memory_count);
    println!("  Active reminders:  {}", report.active_reminder_count);
    println!("  Retired reminders: {}", report.retired_reminder_count);
    println!("  Cached alarms:     {}", report.cached_alarm_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED");
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or move the database aside; a fresh one is created on next start.");
    }

    if report.active_reminder_count > 0 && report.cached_alarm_count == 0 {
        println!();
        println!("No alarms are cached for active reminders. Run `recollect reconcile`.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
