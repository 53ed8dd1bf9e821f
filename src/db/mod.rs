//! SQLite database initialization, schema, migrations, and health checks.

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Open (or create) the recollect database at the given path with the schema
/// initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL lets the alarm loop read while the foreground writes
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a fully migrated in-memory database (tests and dry runs).
pub fn open_memory_database() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub schema_version: u32,
    pub memory_count: u64,
    pub memories_without_embedding: u64,
    pub active_reminder_count: u64,
    pub retired_reminder_count: u64,
    pub cached_alarm_count: u64,
    pub embedding_dimensions: Option<usize>,
}

/// Run `PRAGMA integrity_check` and collect table counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    };

    Ok(HealthReport {
        integrity_ok: integrity == "ok",
        schema_version: migrations::get_schema_version(conn)?,
        memory_count: count("SELECT COUNT(*) FROM memories")?,
        memories_without_embedding: count("SELECT COUNT(*) FROM memories WHERE embedding IS NULL")?,
        active_reminder_count: count("SELECT COUNT(*) FROM reminders WHERE is_active = 1")?,
        retired_reminder_count: count("SELECT COUNT(*) FROM reminders WHERE is_active = 0")?,
        cached_alarm_count: count("SELECT COUNT(*) FROM alarm_payloads")?,
        embedding_dimensions: migrations::get_embedding_dimensions(conn)?,
    })
}
