// ABOUTME: Defines the Log record (one dining memory) and LogDraft, the validated input for writes.
// ABOUTME: Drafts normalize place and people names before they reach the store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image::ImagePayload;
use crate::tag::TagType;

/// Validation failures for a log draft.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("place must not be empty")]
    EmptyPlace,

    #[error("photos and thumbnails must be index-aligned: {photos} photos, {thumbnails} thumbnails")]
    MisalignedImages { photos: usize, thumbnails: usize },
}

/// A persisted dining memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub id: i64,
    pub date: NaiveDate,
    pub place: String,
    pub people: Vec<String>,
    #[serde(default)]
    pub photos: Vec<ImagePayload>,
    #[serde(default)]
    pub thumbnails: Vec<ImagePayload>,
}

impl Log {
    /// Whether this log references `name` under the given tag type.
    pub fn references(&self, tag_type: TagType, name: &str) -> bool {
        match tag_type {
            TagType::Place => self.place == name,
            TagType::Person => self.people.iter().any(|p| p == name),
        }
    }

    /// The editable fields of this log as a draft.
    pub fn to_draft(&self) -> LogDraft {
        LogDraft {
            date: self.date,
            place: self.place.clone(),
            people: self.people.clone(),
            photos: self.photos.clone(),
            thumbnails: self.thumbnails.clone(),
        }
    }
}

/// The user-supplied fields of a log, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDraft {
    pub date: NaiveDate,
    pub place: String,
    pub people: Vec<String>,
    #[serde(default)]
    pub photos: Vec<ImagePayload>,
    #[serde(default)]
    pub thumbnails: Vec<ImagePayload>,
}

impl LogDraft {
    /// Create a draft without photos.
    pub fn new(date: NaiveDate, place: impl Into<String>, people: Vec<String>) -> Self {
        Self {
            date,
            place: place.into(),
            people,
            photos: Vec::new(),
            thumbnails: Vec::new(),
        }
    }

    /// Attach one photo with its thumbnail, keeping the two sequences aligned.
    pub fn with_photo(mut self, photo: ImagePayload, thumbnail: ImagePayload) -> Self {
        self.photos.push(photo);
        self.thumbnails.push(thumbnail);
        self
    }

    /// Trim names, drop empty and duplicate people, and check invariants.
    ///
    /// People keep their first-occurrence order. Tag counts assume each name
    /// appears at most once per log.
    pub fn normalized(mut self) -> Result<Self, LogError> {
        self.place = self.place.trim().to_string();
        if self.place.is_empty() {
            return Err(LogError::EmptyPlace);
        }

        let mut people: Vec<String> = Vec::with_capacity(self.people.len());
        for person in self.people {
            let person = person.trim();
            if !person.is_empty() && !people.iter().any(|p| p == person) {
                people.push(person.to_string());
            }
        }
        self.people = people;

        if self.photos.len() != self.thumbnails.len() {
            return Err(LogError::MisalignedImages {
                photos: self.photos.len(),
                thumbnails: self.thumbnails.len(),
            });
        }

        Ok(self)
    }

    /// Build the persisted form once an id has been assigned.
    pub fn into_log(self, id: i64) -> Log {
        Log {
            id,
            date: self.date,
            place: self.place,
            people: self.people,
            photos: self.photos,
            thumbnails: self.thumbnails,
        }
    }
}
