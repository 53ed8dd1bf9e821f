//! SQL DDL for all recollect tables.
//!
//! Defines `memories`, `reminders`, `reminder_log`, `alarm_payloads`, and
//! `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Saved facts. Embeddings are little-endian f32 blobs tagged with the model that produced them.
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    embedding BLOB,
    embedding_model TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_owner ON memories(owner_id, created_at);

CREATE TABLE IF NOT EXISTS reminders (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    message TEXT NOT NULL,
    kind TEXT NOT NULL,
    interval_minutes INTEGER,
    scheduled_time TEXT,
    next_trigger TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_duration_based INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    triggered_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_reminders_owner_active ON reminders(owner_id, is_active);

-- Audit trail of reminder state transitions
CREATE TABLE IF NOT EXISTS reminder_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL,
    reminder_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- The alarm adapter's own bookkeeping: one cached payload per armed alarm id
CREATE TABLE IF NOT EXISTS alarm_payloads (
    alarm_id INTEGER PRIMARY KEY,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "alarm_payloads",
            "memories",
            "reminder_log",
            "reminders",
            "schema_meta",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
