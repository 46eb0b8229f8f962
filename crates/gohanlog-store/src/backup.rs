// ABOUTME: Backup codec: exports every log and tag to a versioned JSON document with images as data URIs.
// ABOUTME: Import validates the document shape, decodes images, and bulk-upserts rows by id without recounting tags.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use gohanlog_core::{ImagePayload, Log, LogDraft, Operation, Tag, TagType};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::changes::ChangeFeed;
use crate::config::{GohanConfig, ImageStorage};
use crate::delivery::{self, DeliveryOutcome, DownloadTarget, ShareTarget};
use crate::engine::{Store, logs, tags};
use crate::engine::tags::TagRecord;
use crate::error::StoreError;

/// The only document version this codec reads and writes.
pub const BACKUP_VERSION: u32 = 1;

fn default_version() -> u32 {
    BACKUP_VERSION
}

fn default_count() -> u32 {
    1
}

/// A full snapshot of the store in its portable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub logs: Vec<BackupLog>,
    pub tags: Vec<BackupTag>,
}

/// A log with every image as base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub place: String,
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub thumbnails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub tag_type: TagType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default = "default_count", alias = "useCount")]
    pub count: u32,
    #[serde(rename = "lastUsed")]
    pub last_used: NaiveDate,
}

/// Rows written by an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub logs: usize,
    pub tags: usize,
}

impl BackupDocument {
    /// Build a document from stored rows, encoding every image as a data URI.
    /// Any image that cannot be encoded aborts the whole export.
    pub fn from_rows(logs: &[Log], tags: &[Tag], timestamp: DateTime<Utc>) -> Result<Self, StoreError> {
        let logs = logs
            .iter()
            .map(|log| {
                Ok(BackupLog {
                    id: Some(log.id),
                    date: log.date,
                    place: log.place.clone(),
                    people: log.people.clone(),
                    photos: encode_all(&log.photos)?,
                    thumbnails: encode_all(&log.thumbnails)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let tags = tags
            .iter()
            .map(|tag| BackupTag {
                id: Some(tag.id),
                tag_type: tag.tag_type,
                name: tag.name.clone(),
                emoji: tag.emoji.clone(),
                count: tag.count,
                last_used: tag.last_used,
            })
            .collect();

        Ok(Self {
            version: BACKUP_VERSION,
            timestamp: Some(timestamp),
            logs,
            tags,
        })
    }

    /// Parse and validate a backup. Both `logs` and `tags` must be arrays.
    pub fn parse(text: &str) -> Result<Self, StoreError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| StoreError::InvalidFormat(format!("not valid JSON: {}", e)))?;

        let Some(object) = value.as_object() else {
            return Err(StoreError::InvalidFormat(
                "document must be a JSON object".to_string(),
            ));
        };
        for key in ["logs", "tags"] {
            if !object.get(key).is_some_and(Value::is_array) {
                return Err(StoreError::InvalidFormat(format!(
                    "missing {:?} array",
                    key
                )));
            }
        }
        if let Some(version) = object.get("version")
            && version.as_u64() != Some(u64::from(BACKUP_VERSION))
        {
            return Err(StoreError::InvalidFormat(format!(
                "unsupported version {}",
                version
            )));
        }

        serde_json::from_value(value).map_err(|e| StoreError::InvalidFormat(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Export(e.to_string()))
    }

    /// `gohanlog-backup-<YYYY-MM-DD>.json` for the given day.
    pub fn file_name(date: NaiveDate) -> String {
        format!("gohanlog-backup-{}.json", logs::format_date(date))
    }
}

fn encode_all(images: &[ImagePayload]) -> Result<Vec<String>, StoreError> {
    images
        .iter()
        .map(|image| image.to_data_uri().map_err(StoreError::from))
        .collect()
}

/// Decode one backup image. The text is always decoded so bad base64 aborts
/// the import. Images whose declared MIME type differs from what the bytes
/// sniff as stay encoded unless blob storage is forced, so the type survives
/// the next export.
fn decode_image(storage: ImageStorage, text: &str) -> Result<ImagePayload, StoreError> {
    let binary = ImagePayload::decode_text(text)?;
    let encoded = ImagePayload::Encoded(text.to_string());
    let payload = match storage {
        ImageStorage::Blob => binary,
        ImageStorage::Base64 => encoded.into_encoded()?,
        ImageStorage::AsGiven if encoded.mime_type()? == binary.mime_type()? => binary,
        ImageStorage::AsGiven => encoded,
    };
    Ok(payload)
}

fn decode_all(storage: ImageStorage, images: &[String]) -> Result<Vec<ImagePayload>, StoreError> {
    images
        .iter()
        .map(|text| decode_image(storage, text))
        .collect()
}

/// A backup ready to write: images decoded and drafts validated.
struct DecodedBackup {
    logs: Vec<(Option<i64>, LogDraft)>,
    tags: Vec<(Option<i64>, TagRecord)>,
}

fn decode(doc: BackupDocument, storage: ImageStorage) -> Result<DecodedBackup, StoreError> {
    let mut logs = Vec::with_capacity(doc.logs.len());
    for (index, log) in doc.logs.into_iter().enumerate() {
        let mut draft = LogDraft::new(log.date, log.place, log.people);
        draft.photos = decode_all(storage, &log.photos)?;
        draft.thumbnails = decode_all(storage, &log.thumbnails)?;
        let draft = draft
            .normalized()
            .map_err(|e| StoreError::InvalidFormat(format!("log at index {}: {}", index, e)))?;
        logs.push((log.id, draft));
    }

    let tags = doc
        .tags
        .into_iter()
        .map(|tag| {
            (
                tag.id,
                TagRecord {
                    tag_type: tag.tag_type,
                    name: tag.name,
                    emoji: tag.emoji,
                    count: tag.count,
                    last_used: tag.last_used,
                },
            )
        })
        .collect();

    Ok(DecodedBackup { logs, tags })
}

/// Upsert every row of `backup`. Tag counts are taken from the document as-is.
fn restore(tx: &Transaction<'_>, backup: &DecodedBackup) -> Result<ImportSummary, StoreError> {
    for (id, draft) in &backup.logs {
        logs::put_log(tx, *id, draft)?;
    }

    for (id, record) in &backup.tags {
        let existing = tags::find_tag(tx, record.tag_type, &record.name)?;
        match (id, existing) {
            (Some(id), Some(other)) if other.id != *id => {
                tags::delete_tag(tx, other.id)?;
                tags::put_tag(tx, Some(*id), record)?;
            }
            (Some(id), _) => {
                tags::put_tag(tx, Some(*id), record)?;
            }
            (None, Some(other)) => {
                tags::put_tag(tx, Some(other.id), record)?;
            }
            (None, None) => {
                tags::insert_tag(tx, record)?;
            }
        }
    }

    Ok(ImportSummary {
        logs: backup.logs.len(),
        tags: backup.tags.len(),
    })
}

/// Export and import of whole-store backups.
#[derive(Clone)]
pub struct BackupCodec {
    store: Store,
    feed: ChangeFeed,
    image_storage: ImageStorage,
}

impl BackupCodec {
    pub fn new(store: Store, feed: ChangeFeed) -> Self {
        Self {
            store,
            feed,
            image_storage: ImageStorage::default(),
        }
    }

    pub fn with_config(store: Store, feed: ChangeFeed, config: &GohanConfig) -> Self {
        Self {
            image_storage: config.image_storage,
            ..Self::new(store, feed)
        }
    }

    /// Snapshot every log and tag into a document.
    pub async fn export(&self) -> Result<BackupDocument, StoreError> {
        let (all_logs, all_tags) = self
            .store
            .read(|conn| Ok((logs::all_logs(conn)?, tags::all_tags(conn)?)))
            .await?;

        let doc = BackupDocument::from_rows(&all_logs, &all_tags, Utc::now())?;
        tracing::info!(
            "exported backup with {} logs and {} tags",
            doc.logs.len(),
            doc.tags.len()
        );
        Ok(doc)
    }

    /// Export and hand the document to the share surface, falling back to a
    /// download into `download`'s directory.
    pub async fn export_backup(
        &self,
        share: Option<&dyn ShareTarget>,
        download: &DownloadTarget,
    ) -> Result<DeliveryOutcome, StoreError> {
        let doc = self.export().await?;
        let json = doc.to_json()?;
        let file_name = BackupDocument::file_name(Utc::now().date_naive());
        delivery::deliver(share, download, &file_name, json.into_bytes()).await
    }

    /// Merge a backup into the store in one transaction.
    pub async fn import(&self, doc: BackupDocument) -> Result<ImportSummary, StoreError> {
        let backup = decode(doc, self.image_storage)?;
        let summary = self.store.write(move |tx| restore(tx, &backup)).await?;

        tracing::info!(
            "imported backup with {} logs and {} tags",
            summary.logs,
            summary.tags
        );
        self.feed.publish(Operation::BackupImported {
            logs: summary.logs,
            tags: summary.tags,
        });
        Ok(summary)
    }

    pub async fn import_json(&self, text: &str) -> Result<ImportSummary, StoreError> {
        self.import(BackupDocument::parse(text)?).await
    }

    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary, StoreError> {
        let text = tokio::fs::read_to_string(path).await?;
        self.import_json(&text).await
    }
}
