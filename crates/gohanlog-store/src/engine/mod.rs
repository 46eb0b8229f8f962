// ABOUTME: Storage engine owning the on-device SQLite database handle and its lifecycle.
// ABOUTME: Serialises access to one connection and runs reads and IMMEDIATE write transactions off the async runtime.

pub mod logs;
pub mod schema;
pub mod tags;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::StoreError;

pub use schema::SCHEMA_VERSION;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

struct Inner {
    conn: Mutex<Option<Connection>>,
    location: Location,
}

/// Handle to the dining-log database.
///
/// Cloning is cheap and every clone shares one connection; operations from
/// all clones are serialised, so each transaction is isolated from the
/// others. The handle is explicitly opened and closed; after [`Store::close`]
/// every operation fails with [`StoreError::Closed`].
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Open or create the database at `path`, running pending migrations.
    /// Creates the parent directory if it does not exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, Location::File(path.to_path_buf()))
    }

    /// Open a private in-memory database, used by tests and previews.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, Location::Memory)
    }

    fn init(mut conn: Connection, location: Location) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let applied = schema::migrate(&mut conn)?;
        tracing::info!(
            "opened store at {:?}, schema v{} ({} migrations applied)",
            location,
            SCHEMA_VERSION,
            applied
        );

        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(Some(conn)),
                location,
            }),
        })
    }

    pub fn location(&self) -> &Location {
        &self.inner.location
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Close the underlying connection. Idempotent.
    pub fn close(&self) -> Result<(), StoreError> {
        let conn = self.lock().take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StoreError::Storage(e))?;
            tracing::info!("closed store at {:?}", self.inner.location);
        }
        Ok(())
    }

    // A panic inside a closure drops its Transaction, which rolls back, so a
    // poisoned lock still guards a consistent connection.
    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.inner.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read-only closure against the connection on the blocking pool.
    pub async fn read<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store.lock();
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }

    /// Run a closure inside one IMMEDIATE transaction. Commits when the
    /// closure returns `Ok`; any error rolls back every change it made.
    pub async fn write<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = store.lock();
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await?
    }

    /// The schema version recorded in the database.
    pub async fn schema_version(&self) -> Result<i32, StoreError> {
        self.read(|conn| schema::user_version(conn)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_creates_parent_directories_and_migrates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("gohanlog.db");

        let store = Store::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.location(), &Location::File(path.clone()));
        assert_eq!(store.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn write_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();

        let result: Result<(), StoreError> = store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO logs (date, place) VALUES ('2024-01-01', 'Kept?')",
                    [],
                )?;
                Err(StoreError::InvalidTagName)
            })
            .await;
        assert!(matches!(result, Err(StoreError::InvalidTagName)));

        let count = store.read(|conn| logs::count_logs(conn)).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn operations_fail_after_close() {
        let store = Store::open_in_memory().unwrap();
        let clone = store.clone();

        store.close().unwrap();
        store.close().unwrap();

        assert!(clone.is_closed());
        let err = clone.schema_version().await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }

    #[tokio::test]
    async fn reopening_a_file_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gohanlog.db");

        let store = Store::open(&path).unwrap();
        store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO logs (date, place) VALUES ('2024-01-01', 'Persisted')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        store.close().unwrap();

        let reopened = Store::open(&path).unwrap();
        let count = reopened.read(|conn| logs::count_logs(conn)).await.unwrap();
        assert_eq!(count, 1);
    }
}
