// ABOUTME: Delivery of exported files: the platform share surface first, a direct file download as fallback.
// ABOUTME: Downloads are written atomically (write to .tmp, fsync, rename) into the export directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::error::StoreError;

/// Errors a share surface can report. None of them fail an export on their
/// own; the download fallback runs instead.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("share surface unavailable")]
    Unavailable,

    #[error("share cancelled by user")]
    Cancelled,

    #[error("share failed: {0}")]
    Failed(String),
}

/// A platform's native share sheet (or anything playing that role).
#[async_trait]
pub trait ShareTarget: Send + Sync {
    /// Offer a file to the user. Returns once the user has picked a destination.
    async fn share(&self, file_name: &str, contents: &[u8]) -> Result<(), DeliveryError>;

    /// Name for logging (e.g. "ios-share-sheet").
    fn name(&self) -> &str;
}

/// Where a delivered file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Shared,
    Saved(PathBuf),
}

/// Direct file download into a directory.
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    dir: PathBuf,
}

impl DownloadTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `contents` to `<dir>/<file_name>`, replacing any previous file of
    /// that name. Creates the directory if it does not exist.
    pub fn save(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;

        let tmp_path = self.dir.join(format!("{}.tmp", file_name));
        let final_path = self.dir.join(file_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &final_path)?;

        Ok(final_path)
    }
}

/// Offer the file to `share` if there is one, falling back to `download` when
/// sharing is unavailable, cancelled or fails.
pub async fn deliver(
    share: Option<&dyn ShareTarget>,
    download: &DownloadTarget,
    file_name: &str,
    contents: Vec<u8>,
) -> Result<DeliveryOutcome, StoreError> {
    if let Some(target) = share {
        match target.share(file_name, &contents).await {
            Ok(()) => {
                tracing::info!("shared {} via {}", file_name, target.name());
                return Ok(DeliveryOutcome::Shared);
            }
            Err(e) => {
                tracing::warn!(
                    "share via {} failed ({}), saving {} to {:?} instead",
                    target.name(),
                    e,
                    file_name,
                    download.dir()
                );
            }
        }
    }

    let download = download.clone();
    let file_name = file_name.to_string();
    let path =
        tokio::task::spawn_blocking(move || download.save(&file_name, &contents)).await??;

    tracing::info!("saved export to {:?}", path);
    Ok(DeliveryOutcome::Saved(path))
}
