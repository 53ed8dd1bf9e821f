//! Persistence for memory records.
//!
//! [`MemoryStore`] is the capability the rest of the crate consumes;
//! [`SqliteMemoryStore`] is the production implementation. Tests substitute
//! in-memory fakes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use super::keywords::extract_keywords;
use super::types::MemoryRecord;
use super::{embedding_from_bytes, embedding_to_bytes};

pub trait MemoryStore: Send + Sync {
    fn save(&self, record: &MemoryRecord) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<MemoryRecord>>;

    /// All records for an owner, in no particular order.
    fn get_by_owner(&self, owner_id: &str) -> Result<Vec<MemoryRecord>>;

    fn get_without_embedding(&self, owner_id: &str) -> Result<Vec<MemoryRecord>>;

    /// Replace a record's embedding. Returns `false` if the record is gone.
    fn set_embedding(&self, id: &str, embedding: &[f32], model: &str) -> Result<bool>;

    /// Records containing at least one keyword of `query`, most keyword hits
    /// first, then most recent.
    fn keyword_search(&self, owner_id: &str, query: &str) -> Result<Vec<MemoryRecord>>;

    fn delete(&self, id: &str) -> Result<bool>;

    fn delete_all_for_owner(&self, owner_id: &str) -> Result<usize>;
}

/// Count how many of `keywords` occur in `content` (case-insensitive substring).
pub fn keyword_hits(content: &str, keywords: &[String]) -> usize {
    let lower = content.to_lowercase();
    keywords.iter().filter(|k| lower.contains(k.as_str())).count()
}

/// Order keyword matches: most hits, then newest, then id.
pub fn rank_keyword_matches(records: &mut Vec<MemoryRecord>, keywords: &[String]) {
    records.retain(|r| keyword_hits(&r.content, keywords) > 0);
    records.sort_by(|a, b| {
        keyword_hits(&b.content, keywords)
            .cmp(&keyword_hits(&a.content, keywords))
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub struct SqliteMemoryStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteMemoryStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("database lock poisoned: {e}"))
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map(params, row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, content, created_at, embedding, embedding_model FROM memories";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let created_at: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let blob: Option<Vec<u8>> = row.get(4)?;

    Ok(MemoryRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        content: row.get(2)?,
        created_at,
        // An undecodable blob is treated as missing so backfill can repair it
        embedding: blob.as_deref().and_then(embedding_from_bytes),
        embedding_model: row.get(5)?,
    })
}

impl MemoryStore for SqliteMemoryStore {
    fn save(&self, record: &MemoryRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO memories (id, owner_id, content, created_at, embedding, embedding_model)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.owner_id,
                record.content,
                record.created_at.to_rfc3339(),
                record.embedding.as_deref().map(embedding_to_bytes),
                record.embedding_model,
            ],
        )
        .with_context(|| format!("failed to save memory {}", record.id))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get_by_owner(&self, owner_id: &str) -> Result<Vec<MemoryRecord>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE owner_id = ?1"),
            params![owner_id],
        )
    }

    fn get_without_embedding(&self, owner_id: &str) -> Result<Vec<MemoryRecord>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE owner_id = ?1 AND embedding IS NULL"),
            params![owner_id],
        )
    }

    fn set_embedding(&self, id: &str, embedding: &[f32], model: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE memories SET embedding = ?1, embedding_model = ?2 WHERE id = ?3",
            params![embedding_to_bytes(embedding), model, id],
        )?;
        Ok(changed > 0)
    }

    fn keyword_search(&self, owner_id: &str, query: &str) -> Result<Vec<MemoryRecord>> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return Ok(vec![]);
        }

        let clauses: Vec<String> = (0..keywords.len())
            .map(|i| format!("lower(content) LIKE ?{}", i + 2))
            .collect();
        let sql = format!(
            "{SELECT_COLUMNS} WHERE owner_id = ?1 AND ({})",
            clauses.join(" OR ")
        );

        let mut values: Vec<String> = vec![owner_id.to_string()];
        // keywords are alphanumeric, so no LIKE escaping is needed
        values.extend(keywords.iter().map(|k| format!("%{k}%")));

        let mut records = self.query(&sql, rusqlite::params_from_iter(values.iter()))?;
        rank_keyword_matches(&mut records, &keywords);
        Ok(records)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn delete_all_for_owner(&self, owner_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM memories WHERE owner_id = ?1", params![owner_id])?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn store() -> SqliteMemoryStore {
        let conn = crate::db::open_memory_database().unwrap();
        SqliteMemoryStore::new(Arc::new(Mutex::new(conn)))
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn save_and_read_back_with_embedding() {
        let store = store();
        let record =
            MemoryRecord::new("me", "I parked in lot B5", at(0)).with_embedding(vec![0.5, -0.5], "m1");
        store.save(&record).unwrap();

        let loaded = store.get(&record.id).unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.get_without_embedding("me").unwrap().is_empty());
    }

    #[test]
    fn owner_scoping() {
        let store = store();
        store.save(&MemoryRecord::new("me", "a fact", at(0))).unwrap();
        store.save(&MemoryRecord::new("you", "another fact", at(1))).unwrap();
        assert_eq!(store.get_by_owner("me").unwrap().len(), 1);
        assert_eq!(store.delete_all_for_owner("you").unwrap(), 1);
        assert_eq!(store.get_by_owner("me").unwrap().len(), 1);
    }

    #[test]
    fn set_embedding_fills_missing() {
        let store = store();
        let record = MemoryRecord::new("me", "wifi password is hunter2", at(0));
        store.save(&record).unwrap();
        assert_eq!(store.get_without_embedding("me").unwrap().len(), 1);

        assert!(store.set_embedding(&record.id, &[1.0, 0.0], "m1").unwrap());
        assert!(store.get_without_embedding("me").unwrap().is_empty());
        assert!(!store.set_embedding("missing", &[1.0], "m1").unwrap());
    }

    #[test]
    fn keyword_search_ranks_by_hits_then_recency() {
        let store = store();
        let older = MemoryRecord::new("me", "Spare key is under the mat", at(0));
        let newer = MemoryRecord::new("me", "Car key is in the drawer", at(5));
        let hook = MemoryRecord::new("me", "Car key and house keys on the hook", at(1));
        for r in [&older, &newer, &hook] {
            store.save(r).unwrap();
        }
        store
            .save(&MemoryRecord::new("me", "Wifi password is hunter2", at(9)))
            .unwrap();

        let hits = store.keyword_search("me", "where are my car keys").unwrap();
        let ids: Vec<_> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), hook.id.as_str(), older.id.as_str()]);
    }

    #[test]
    fn keyword_search_with_only_stopwords_is_empty() {
        let store = store();
        store.save(&MemoryRecord::new("me", "where is it", at(0))).unwrap();
        assert!(store.keyword_search("me", "where is it").unwrap().is_empty());
    }

    #[test]
    fn delete_reports_presence() {
        let store = store();
        let record = MemoryRecord::new("me", "gate code 4412", at(0));
        store.save(&record).unwrap();
        assert!(store.delete(&record.id).unwrap());
        assert!(!store.delete(&record.id).unwrap());
    }
}
