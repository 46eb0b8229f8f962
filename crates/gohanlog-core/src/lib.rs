// ABOUTME: Core library for gohanlog, containing the domain types shared by the store and front ends.
// ABOUTME: Logs, tags, image payloads, list filters, and change events live here with no I/O.

pub mod event;
pub mod filter;
pub mod image;
pub mod log;
pub mod tag;

pub use event::{ChangeEvent, Operation, Table};
pub use filter::{DEFAULT_PAGE_SIZE, LogFilter};
pub use image::{ImageError, ImagePayload};
pub use log::{Log, LogDraft, LogError};
pub use tag::{Tag, TagType, TagTypeError};
