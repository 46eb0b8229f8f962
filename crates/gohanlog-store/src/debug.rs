// ABOUTME: Read-only diagnostic snapshot of the environment, database file, and table sizes.
// ABOUTME: Collection never fails outright; problems are recorded in the snapshot's error list.

use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::delivery::{self, DeliveryOutcome, DownloadTarget, ShareTarget};
use crate::engine::{Location, SCHEMA_VERSION, Store, logs, schema, tags};
use crate::error::StoreError;

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub family: String,
    pub language: Option<String>,
    pub timezone_offset: String,
    pub crate_version: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageInfo {
    pub database_path: Option<PathBuf>,
    pub file_size: Option<u64>,
    pub page_size: Option<i64>,
    pub page_count: Option<i64>,
    pub freelist_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub schema_version: Option<i32>,
    pub supported_version: i32,
    pub tables: Vec<TableCount>,
}

/// Everything a bug report needs about the local data layer.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub timestamp: DateTime<Utc>,
    pub system: SystemInfo,
    pub storage: StorageInfo,
    pub database: DatabaseInfo,
    pub errors: Vec<String>,
}

impl SystemInfo {
    fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            language: std::env::var("LANG").ok().filter(|l| !l.is_empty()),
            timezone_offset: Local::now().offset().to_string(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn pragma(conn: &Connection, name: &str) -> Result<i64, StoreError> {
    Ok(conn.query_row(&format!("PRAGMA {}", name), [], |row| row.get(0))?)
}

/// Gather what can be read from an open connection, noting each failure.
fn inspect(
    conn: &Connection,
    storage: &mut StorageInfo,
    database: &mut DatabaseInfo,
    errors: &mut Vec<String>,
) {
    let mut note = |what: &str, e: StoreError| errors.push(format!("{}: {}", what, e));

    match schema::user_version(conn) {
        Ok(v) => database.schema_version = Some(v),
        Err(e) => note("schema version", e),
    }
    match pragma(conn, "page_size") {
        Ok(v) => storage.page_size = Some(v),
        Err(e) => note("page_size", e),
    }
    match pragma(conn, "page_count") {
        Ok(v) => storage.page_count = Some(v),
        Err(e) => note("page_count", e),
    }
    match pragma(conn, "freelist_count") {
        Ok(v) => storage.freelist_count = Some(v),
        Err(e) => note("freelist_count", e),
    }

    let counters: [(&str, fn(&Connection) -> Result<usize, StoreError>); 2] =
        [("logs", logs::count_logs), ("tags", tags::count_tags)];
    for (name, count) in counters {
        match count(conn) {
            Ok(rows) => database.tables.push(TableCount {
                name: name.to_string(),
                rows,
            }),
            Err(e) => note(name, e),
        }
    }
}

impl DebugSnapshot {
    /// Collect a snapshot. Never fails; anything unreadable is listed in `errors`.
    pub async fn collect(store: &Store) -> Self {
        let mut errors = Vec::new();
        let mut storage = StorageInfo::default();

        let name = match store.location() {
            Location::File(path) => {
                storage.database_path = Some(path.clone());
                match std::fs::metadata(path) {
                    Ok(meta) => storage.file_size = Some(meta.len()),
                    Err(e) => errors.push(format!("file size: {}", e)),
                }
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }
            Location::Memory => ":memory:".to_string(),
        };

        let fallback = storage.clone();
        let inspected = store
            .read(move |conn| {
                let mut storage = storage;
                let mut database = DatabaseInfo::default();
                let mut errors = Vec::new();
                inspect(conn, &mut storage, &mut database, &mut errors);
                Ok((storage, database, errors))
            })
            .await;

        let (storage, mut database) = match inspected {
            Ok((storage, database, inner_errors)) => {
                errors.extend(inner_errors);
                (storage, database)
            }
            Err(e) => {
                errors.push(format!("database: {}", e));
                (fallback, DatabaseInfo::default())
            }
        };
        database.name = name;
        database.supported_version = SCHEMA_VERSION;

        if !errors.is_empty() {
            tracing::warn!("debug snapshot collected with {} errors", errors.len());
        }

        Self {
            timestamp: Utc::now(),
            system: SystemInfo::current(),
            storage,
            database,
            errors,
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Export(e.to_string()))
    }

    /// `gohanlog-debug-<YYYY-MM-DD>.json` for the snapshot's day.
    pub fn file_name(&self) -> String {
        format!("gohanlog-debug-{}.json", self.timestamp.format("%Y-%m-%d"))
    }

    /// Deliver the snapshot the same way backups are delivered.
    pub async fn export(
        &self,
        share: Option<&dyn ShareTarget>,
        download: &DownloadTarget,
    ) -> Result<DeliveryOutcome, StoreError> {
        let json = self.to_json()?;
        delivery::deliver(share, download, &self.file_name(), json.into_bytes()).await
    }
}
