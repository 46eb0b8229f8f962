// ABOUTME: Versioned schema migrations tracked with PRAGMA user_version.
// ABOUTME: Each step runs in its own transaction together with its version bump, so a failure never half-applies.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Transaction, params};

use crate::error::StoreError;

/// The schema version this build creates and migrates to.
pub const SCHEMA_VERSION: i32 = 3;

struct Migration {
    version: i32,
    description: &'static str,
    apply: fn(&Transaction<'_>) -> Result<(), StoreError>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "logs, people and image tables; tags with legacy use_count",
        apply: create_base_tables,
    },
    Migration {
        version: 2,
        description: "rename tags.use_count to count, defaulting missing counts to 1",
        apply: migrate_use_count,
    },
    Migration {
        version: 3,
        description: "optional emoji on tags",
        apply: add_tag_emoji,
    },
];

/// Read the schema version recorded in the database.
pub fn user_version(conn: &Connection) -> Result<i32, StoreError> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Bring the database up to [`SCHEMA_VERSION`]. Returns the number of steps applied.
pub fn migrate(conn: &mut Connection) -> Result<usize, StoreError> {
    migrate_to(conn, SCHEMA_VERSION)
}

pub(crate) fn migrate_to(conn: &mut Connection, target: i32) -> Result<usize, StoreError> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    let mut applied = 0;
    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= target)
    {
        let tx = conn.transaction()?;
        (migration.apply)(&tx)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;

        tracing::info!(
            "applied schema migration v{}: {}",
            migration.version,
            migration.description
        );
        applied += 1;
    }
    Ok(applied)
}

fn create_base_tables(tx: &Transaction<'_>) -> Result<(), StoreError> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            place TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_logs_date ON logs(date);
        CREATE INDEX IF NOT EXISTS idx_logs_place ON logs(place);

        CREATE TABLE IF NOT EXISTS log_people (
            log_id INTEGER NOT NULL REFERENCES logs(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            person TEXT NOT NULL,
            PRIMARY KEY (log_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_log_people_person ON log_people(person);

        CREATE TABLE IF NOT EXISTS log_images (
            log_id INTEGER NOT NULL REFERENCES logs(id) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK (kind IN ('photo', 'thumbnail')),
            position INTEGER NOT NULL,
            data NOT NULL,
            PRIMARY KEY (log_id, kind, position)
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            name TEXT NOT NULL,
            use_count INTEGER,
            last_used TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tags_type ON tags(type);
        CREATE INDEX IF NOT EXISTS idx_tags_type_name ON tags(type, name);",
    )?;
    Ok(())
}

fn migrate_use_count(tx: &Transaction<'_>) -> Result<(), StoreError> {
    tx.execute_batch("ALTER TABLE tags ADD COLUMN count INTEGER NOT NULL DEFAULT 0;")?;

    let mut normalized: Vec<(i64, i64)> = Vec::new();
    {
        let mut stmt = tx.prepare("SELECT id, use_count FROM tags")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let count = match row.get_ref(1)? {
                ValueRef::Null => 1,
                ValueRef::Integer(n) => n.max(0),
                other => {
                    return Err(StoreError::Corrupt {
                        table: "tags",
                        detail: format!("tag {} has non-integer use_count {:?}", id, other),
                    });
                }
            };
            normalized.push((id, count));
        }
    }

    for (id, count) in normalized {
        tx.execute("UPDATE tags SET count = ?1 WHERE id = ?2", params![count, id])?;
    }

    tx.execute_batch(
        "ALTER TABLE tags DROP COLUMN use_count;
        CREATE INDEX IF NOT EXISTS idx_tags_type_count ON tags(type, count);",
    )?;
    Ok(())
}

fn add_tag_emoji(tx: &Transaction<'_>) -> Result<(), StoreError> {
    tx.execute_batch("ALTER TABLE tags ADD COLUMN emoji TEXT;")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 1).unwrap();
        conn
    }

    fn insert_legacy_tag(conn: &Connection, name: &str, use_count: rusqlite::types::Value) {
        conn.execute(
            "INSERT INTO tags (type, name, use_count, last_used) VALUES ('place', ?1, ?2, '2022-12-31')",
            params![name, use_count],
        )
        .unwrap();
    }

    fn counts(conn: &Connection) -> Vec<(String, i64)> {
        let mut stmt = conn.prepare("SELECT name, count FROM tags ORDER BY id").unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn fresh_database_reaches_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();

        let applied = migrate(&mut conn).unwrap();

        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(user_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn legacy_use_count_moves_to_count() {
        use rusqlite::types::Value;

        let mut conn = legacy_db();
        insert_legacy_tag(&conn, "Kept", Value::Integer(4));
        insert_legacy_tag(&conn, "Missing", Value::Null);
        insert_legacy_tag(&conn, "Negative", Value::Integer(-2));

        migrate(&mut conn).unwrap();

        assert_eq!(
            counts(&conn),
            vec![
                ("Kept".to_string(), 4),
                ("Missing".to_string(), 1),
                ("Negative".to_string(), 0),
            ]
        );
        let has_legacy: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('tags') WHERE name = 'use_count'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(has_legacy, 0);
    }

    #[test]
    fn migration_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        assert_eq!(migrate(&mut conn).unwrap(), 0);
        assert_eq!(user_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn failed_normalization_leaves_previous_version_intact() {
        use rusqlite::types::Value;

        let mut conn = legacy_db();
        insert_legacy_tag(&conn, "Good", Value::Integer(2));
        insert_legacy_tag(&conn, "Bad", Value::Text("lots".to_string()));

        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { table: "tags", .. }));

        assert_eq!(user_version(&conn).unwrap(), 1);
        let legacy: i64 = conn
            .query_row(
                "SELECT use_count FROM tags WHERE name = 'Good'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(legacy, 2);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();

        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedSchema { .. }));
    }
}
