//! Reminder persistence.
//!
//! Timestamps are stored as RFC 3339 text. Rows are decoded leniently in
//! [`ReminderStore::scan_active`] so a single bad row surfaces as a
//! [`CorruptReminder`] instead of failing the scan.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{CorruptReminder, Reminder, ReminderKind};

pub trait ReminderStore: Send + Sync {
    fn insert(&self, reminder: &Reminder) -> Result<()>;

    fn update(&self, reminder: &Reminder) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<Reminder>>;

    fn delete(&self, id: &str) -> Result<bool>;

    /// Every active reminder across all owners, corrupt rows included.
    fn scan_active(&self) -> Result<Vec<Result<Reminder, CorruptReminder>>>;

    /// All decodable reminders for an owner, active and retired, by next trigger.
    fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Reminder>>;

    /// Active reminders whose message contains, or is contained in, `message`
    /// (case-insensitive).
    ///
    /// Substring matching can conflate unrelated reminders that share a word
    /// ("water" vs "water the plants"). Kept for compatibility with existing
    /// replace-on-duplicate behavior.
    fn find_active_by_message(&self, owner_id: &str, message: &str) -> Result<Vec<Reminder>> {
        let needle = message.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }
        Ok(self
            .list_for_owner(owner_id)?
            .into_iter()
            .filter(|r| r.is_active)
            .filter(|r| {
                let hay = r.message.to_lowercase();
                hay.contains(&needle) || needle.contains(&hay)
            })
            .collect())
    }

    /// Append to the audit trail, stamped `at`. Stores without one ignore it.
    fn log_event(
        &self,
        _operation: &str,
        _reminder_id: &str,
        _details: Option<&serde_json::Value>,
        _at: DateTime<Utc>,
    ) {
    }
}

pub struct SqliteReminderStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteReminderStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("database lock poisoned: {e}"))
    }
}

const SELECT_COLUMNS: &str = "SELECT id, owner_id, message, kind, interval_minutes, scheduled_time,
    next_trigger, is_active, is_duration_based, created_at, triggered_at FROM reminders";

/// Undecoded row, read with SQLite's loose typing.
struct RawReminder {
    id: String,
    owner_id: String,
    message: String,
    kind: String,
    interval_minutes: Option<i64>,
    scheduled_time: Option<String>,
    next_trigger: String,
    is_active: bool,
    is_duration_based: bool,
    created_at: String,
    triggered_at: Option<String>,
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawReminder> {
    Ok(RawReminder {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        message: row.get(2)?,
        kind: row.get(3)?,
        interval_minutes: row.get(4)?,
        scheduled_time: row.get(5)?,
        next_trigger: row.get(6)?,
        is_active: row.get(7)?,
        is_duration_based: row.get(8)?,
        created_at: row.get(9)?,
        triggered_at: row.get(10)?,
    })
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad {field} {value:?}: {e}"))
}

impl RawReminder {
    fn decode(self) -> Result<Reminder, CorruptReminder> {
        let id = self.id.clone();
        self.try_decode()
            .map_err(|reason| CorruptReminder { id, reason })
    }

    fn try_decode(self) -> Result<Reminder, String> {
        let kind: ReminderKind = self.kind.parse()?;
        let interval_minutes = match self.interval_minutes {
            None => None,
            Some(n) if n > 0 && n <= u32::MAX as i64 => Some(n as u32),
            Some(n) => return Err(format!("bad interval_minutes {n}")),
        };
        if kind == ReminderKind::Recurring && interval_minutes.is_none() {
            return Err("recurring reminder without interval".into());
        }

        Ok(Reminder {
            id: self.id,
            owner_id: self.owner_id,
            message: self.message,
            kind,
            interval_minutes,
            scheduled_time: self
                .scheduled_time
                .as_deref()
                .map(|s| parse_time("scheduled_time", s))
                .transpose()?,
            next_trigger: parse_time("next_trigger", &self.next_trigger)?,
            is_active: self.is_active,
            is_duration_based: self.is_duration_based,
            created_at: parse_time("created_at", &self.created_at)?,
            triggered_at: self
                .triggered_at
                .as_deref()
                .map(|s| parse_time("triggered_at", s))
                .transpose()?,
        })
    }
}

fn write_params(r: &Reminder) -> [Box<dyn rusqlite::ToSql + '_>; 11] {
    [
        Box::new(&r.id),
        Box::new(&r.owner_id),
        Box::new(&r.message),
        Box::new(r.kind.as_str()),
        Box::new(r.interval_minutes),
        Box::new(r.scheduled_time.map(|t| t.to_rfc3339())),
        Box::new(r.next_trigger.to_rfc3339()),
        Box::new(r.is_active),
        Box::new(r.is_duration_based),
        Box::new(r.created_at.to_rfc3339()),
        Box::new(r.triggered_at.map(|t| t.to_rfc3339())),
    ]
}

impl ReminderStore for SqliteReminderStore {
    fn insert(&self, reminder: &Reminder) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO reminders (id, owner_id, message, kind, interval_minutes, scheduled_time,
                next_trigger, is_active, is_duration_based, created_at, triggered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params_from_iter(write_params(reminder).iter()),
        )
        .with_context(|| format!("failed to insert reminder {}", reminder.id))?;
        Ok(())
    }

    fn update(&self, reminder: &Reminder) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE reminders SET owner_id = ?2, message = ?3, kind = ?4, interval_minutes = ?5,
                scheduled_time = ?6, next_trigger = ?7, is_active = ?8, is_duration_based = ?9,
                created_at = ?10, triggered_at = ?11
             WHERE id = ?1",
            rusqlite::params_from_iter(write_params(reminder).iter()),
        )
        .with_context(|| format!("failed to update reminder {}", reminder.id))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Reminder>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                read_raw,
            )
            .optional()?;
        match raw {
            None => Ok(None),
            Some(raw) => raw
                .decode()
                .map(Some)
                .map_err(|c| anyhow::anyhow!("reminder {} is corrupt: {}", c.id, c.reason)),
        }
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn scan_active(&self) -> Result<Vec<Result<Reminder, CorruptReminder>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE is_active = 1"))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            match read_raw(row) {
                Ok(raw) => out.push(raw.decode()),
                Err(e) => {
                    // Column-level type failure: only the id may be readable
                    let id: String = row.get(0).unwrap_or_default();
                    out.push(Err(CorruptReminder {
                        id,
                        reason: e.to_string(),
                    }));
                }
            }
        }
        Ok(out)
    }

    fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE owner_id = ?1 ORDER BY next_trigger, id"
        ))?;
        let raws = stmt
            .query_map(params![owner_id], read_raw)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(raws
            .into_iter()
            .filter_map(|raw| match raw.decode() {
                Ok(r) => Some(r),
                Err(c) => {
                    tracing::warn!(reminder_id = %c.id, reason = %c.reason, "skipping corrupt reminder");
                    None
                }
            })
            .collect())
    }

    fn log_event(
        &self,
        operation: &str,
        reminder_id: &str,
        details: Option<&serde_json::Value>,
        at: DateTime<Utc>,
    ) {
        let result = self.conn().and_then(|conn| {
            conn.execute(
                "INSERT INTO reminder_log (operation, reminder_id, details, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    operation,
                    reminder_id,
                    details.map(|d| d.to_string()),
                    at.to_rfc3339(),
                ],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(operation, reminder_id, error = %e, "failed to write reminder log");
        }
    }
}
