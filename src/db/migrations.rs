//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use rusqlite::Connection;

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Embedding dimension the stored vectors were written with, if recorded.
pub fn get_embedding_dimensions(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_dimensions'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(val.parse::<usize>().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn set_embedding_dimensions(conn: &Connection, dimensions: usize) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_dimensions', ?1)",
        [dimensions.to_string()],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: record the dimension of any vectors already on disk so a
/// later provider change can be detected. Fresh databases get no entry until
/// the first embedding is written.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT length(embedding) FROM memories WHERE embedding IS NOT NULL LIMIT 1",
            [],
            |row| row.get(0),
        )
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    if let Some(bytes) = existing {
        set_embedding_dimensions(conn, bytes as usize / std::mem::size_of::<f32>())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn get_schema_version_returns_1_on_fresh_db() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migration_v1_to_v2_records_existing_dimensions() {
        let mut conn = test_db();
        let blob = vec![0u8; 8 * 4];
        conn.execute(
            "INSERT INTO memories (id, owner_id, content, created_at, embedding, embedding_model) \
             VALUES ('m1', 'me', 'x', '2026-01-01T00:00:00Z', ?1, 'hashing')",
            [blob],
        )
        .unwrap();
        assert!(get_embedding_dimensions(&conn).unwrap().is_none());

        run_migrations(&mut conn).unwrap();

        assert_eq!(get_embedding_dimensions(&conn).unwrap(), Some(8));
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn set_and_get_embedding_dimensions() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();

        set_embedding_dimensions(&conn, 384).unwrap();
        assert_eq!(get_embedding_dimensions(&conn).unwrap(), Some(384));
    }
}
