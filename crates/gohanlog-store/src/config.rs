// ABOUTME: Configuration loading for the gohanlog data layer.
// ABOUTME: Reads GOHANLOG_* environment variables with defaults rooted in the user's home directory.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use gohanlog_core::{DEFAULT_PAGE_SIZE, ImageError, ImagePayload};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GOHANLOG_PAGE_SIZE must be a positive integer, got {0:?}")]
    InvalidPageSize(String),

    #[error("GOHANLOG_IMAGE_STORAGE must be one of as-given, blob, base64, got {0:?}")]
    InvalidImageStorage(String),
}

/// How new image payloads are persisted. Some platforms lose binary blobs,
/// so they store base64 text instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageStorage {
    /// Keep whatever representation the caller supplied.
    #[default]
    AsGiven,
    Blob,
    Base64,
}

impl ImageStorage {
    /// Convert a payload to this storage representation.
    pub fn apply(self, payload: ImagePayload) -> Result<ImagePayload, ImageError> {
        match self {
            ImageStorage::AsGiven => Ok(payload),
            ImageStorage::Blob => payload.into_binary(),
            ImageStorage::Base64 => payload.into_encoded(),
        }
    }
}

impl FromStr for ImageStorage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "as-given" | "" => Ok(ImageStorage::AsGiven),
            "blob" | "binary" => Ok(ImageStorage::Blob),
            "base64" | "text" => Ok(ImageStorage::Base64),
            _ => Err(ConfigError::InvalidImageStorage(s.to_string())),
        }
    }
}

impl fmt::Display for ImageStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageStorage::AsGiven => "as-given",
            ImageStorage::Blob => "blob",
            ImageStorage::Base64 => "base64",
        })
    }
}

/// Data-layer configuration.
#[derive(Debug, Clone)]
pub struct GohanConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub export_dir: PathBuf,
    pub page_size: usize,
    pub image_storage: ImageStorage,
}

impl GohanConfig {
    /// Configuration rooted at `home` with every other setting defaulted.
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            db_path: home.join("gohanlog.db"),
            export_dir: home.join("exports"),
            home,
            page_size: DEFAULT_PAGE_SIZE,
            image_storage: ImageStorage::default(),
        }
    }

    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - GOHANLOG_HOME: data directory (default: ~/.gohanlog)
    /// - GOHANLOG_DB: database file (default: $GOHANLOG_HOME/gohanlog.db)
    /// - GOHANLOG_EXPORT_DIR: where backups are saved (default: $GOHANLOG_HOME/exports)
    /// - GOHANLOG_PAGE_SIZE: logs per list query (default: 50)
    /// - GOHANLOG_IMAGE_STORAGE: as-given, blob, or base64 (default: as-given)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("GOHANLOG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".gohanlog")
            });
        let mut config = Self::with_home(home);

        if let Some(db) = non_empty_var("GOHANLOG_DB") {
            config.db_path = PathBuf::from(db);
        }
        if let Some(dir) = non_empty_var("GOHANLOG_EXPORT_DIR") {
            config.export_dir = PathBuf::from(dir);
        }
        if let Some(size) = non_empty_var("GOHANLOG_PAGE_SIZE") {
            config.page_size = size
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidPageSize(size))?;
        }
        if let Some(mode) = non_empty_var("GOHANLOG_IMAGE_STORAGE") {
            config.image_storage = mode.parse()?;
        }

        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
