// ABOUTME: Error taxonomy for the gohanlog data layer.
// ABOUTME: NotFound, InvalidFormat, storage failures, and image encoding failures all propagate to callers.

use std::fmt;

use gohanlog_core::{ImageError, LogError};
use thiserror::Error;

/// The kind of record an id referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Log,
    Tag,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Log => f.write_str("log"),
            Entity::Tag => f.write_str("tag"),
        }
    }
}

/// Errors that can occur in store, ledger, repository, and backup operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: i64 },

    #[error("invalid backup format: {0}")]
    InvalidFormat(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failure: {0}")]
    Encoding(#[from] ImageError),

    #[error("invalid log: {0}")]
    InvalidLog(#[from] LogError),

    #[error("tag name must not be empty")]
    InvalidTagName,

    #[error("export failed: {0}")]
    Export(String),

    #[error("store is closed")]
    Closed,

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },
}

impl StoreError {
    pub fn log_not_found(id: i64) -> Self {
        StoreError::NotFound {
            entity: Entity::Log,
            id,
        }
    }

    pub fn tag_not_found(id: i64) -> Self {
        StoreError::NotFound {
            entity: Entity::Tag,
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_invalid_format(&self) -> bool {
        matches!(self, StoreError::InvalidFormat(_))
    }
}
