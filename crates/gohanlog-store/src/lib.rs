// ABOUTME: Persistence layer for gohanlog, keeping logs and tag frequencies consistent in SQLite.
// ABOUTME: Provides the storage engine, tag ledger, log repository, backup codec, export delivery, and debug snapshot.

pub mod backup;
pub mod changes;
pub mod config;
pub mod debug;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod repository;

pub use backup::{BackupCodec, BackupDocument, BackupLog, BackupTag, ImportSummary};
pub use changes::ChangeFeed;
pub use config::{ConfigError, GohanConfig, ImageStorage};
pub use debug::DebugSnapshot;
pub use delivery::{DeliveryError, DeliveryOutcome, DownloadTarget, ShareTarget};
pub use engine::{Location, SCHEMA_VERSION, Store};
pub use error::{Entity, StoreError};
pub use ledger::RenameOutcome;
pub use repository::LogRepository;
