// ABOUTME: Defines the Tag record and TagType enum used for place/person usage bookkeeping.
// ABOUTME: Tags are denormalized frequency counters keyed by (type, name), used for suggestions and filters.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing a tag type from text.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown tag type: {0} (expected \"place\" or \"person\")")]
pub struct TagTypeError(pub String);

/// The two kinds of name a log can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Place,
    Person,
}

impl TagType {
    pub const ALL: [TagType; 2] = [TagType::Place, TagType::Person];

    /// The stored text form, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            TagType::Place => "place",
            TagType::Person => "person",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagType {
    type Err = TagTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "place" => Ok(TagType::Place),
            "person" => Ok(TagType::Person),
            other => Err(TagTypeError(other.to_string())),
        }
    }
}

/// A usage-frequency record for one place or person name.
///
/// `count` is the number of logs currently referencing `(tag_type, name)`.
/// `last_used` is a high-water mark: it moves forward whenever the count is
/// bumped and is never rolled back when a log stops referencing the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    #[serde(rename = "type")]
    pub tag_type: TagType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub count: u32,
    #[serde(rename = "lastUsed")]
    pub last_used: NaiveDate,
}

impl Tag {
    /// Label shown in suggestion lists: the emoji, when present, followed by the name.
    pub fn label(&self) -> String {
        match self.emoji.as_deref().filter(|e| !e.is_empty()) {
            Some(emoji) => format!("{} {}", emoji, self.name),
            None => self.name.clone(),
        }
    }
}
