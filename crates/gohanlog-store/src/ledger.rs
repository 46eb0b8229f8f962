// ABOUTME: Tag ledger: bookkeeping that keeps tag usage counts in step with log membership.
// ABOUTME: Every mutator takes the caller's transaction and never opens its own, so log and tag writes commit together.

use chrono::NaiveDate;
use gohanlog_core::{Tag, TagType};
use rusqlite::{Connection, Transaction};
use serde::Serialize;

use crate::engine::logs;
use crate::engine::tags::{self, TagRecord};
use crate::error::StoreError;

/// Result of a rename request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RenameOutcome {
    /// The new name equals the old one; nothing was written.
    Unchanged,
    /// The tag kept its id and took the new name.
    Renamed { logs_rewritten: usize },
    /// Another tag already had the new name; the source tag was folded into it and deleted.
    Merged { into: i64, logs_rewritten: usize },
}

/// Record one more use of `(tag_type, name)`, creating the tag on first use.
/// Returns the tag id.
pub fn bump(
    tx: &Transaction<'_>,
    tag_type: TagType,
    name: &str,
    today: NaiveDate,
) -> Result<i64, StoreError> {
    match tags::find_tag(tx, tag_type, name)? {
        Some(tag) => {
            let count = tag.count.saturating_add(1);
            tags::set_usage(tx, tag.id, count, today.max(tag.last_used))?;
            tracing::debug!("bumped {} tag {:?} to {}", tag_type, name, count);
            Ok(tag.id)
        }
        None => {
            let id = tags::insert_tag(
                tx,
                &TagRecord {
                    tag_type,
                    name: name.to_string(),
                    emoji: None,
                    count: 1,
                    last_used: today,
                },
            )?;
            tracing::debug!("created {} tag {:?} on first use (id {})", tag_type, name, id);
            Ok(id)
        }
    }
}

/// Record that one log stopped using `(tag_type, name)`. The count floors at
/// zero and `last_used` is left alone. Unknown names are ignored.
/// Returns the new count when the tag exists.
pub fn release(
    tx: &Transaction<'_>,
    tag_type: TagType,
    name: &str,
) -> Result<Option<u32>, StoreError> {
    let Some(tag) = tags::find_tag(tx, tag_type, name)? else {
        tracing::debug!("release of unknown {} tag {:?} ignored", tag_type, name);
        return Ok(None);
    };
    let count = tag.count.saturating_sub(1);
    tags::set_count(tx, tag.id, count)?;
    tracing::debug!("released {} tag {:?} to {}", tag_type, name, count);
    Ok(Some(count))
}

/// Pre-seed a suggestion with a zero count. If the `(tag_type, name)` pair
/// already exists its id is returned; the row only changes by taking `emoji`
/// when it has none.
pub fn create(
    tx: &Transaction<'_>,
    name: &str,
    tag_type: TagType,
    emoji: Option<&str>,
    today: NaiveDate,
) -> Result<i64, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::InvalidTagName);
    }
    let emoji = normalize_emoji(emoji);
    if let Some(existing) = tags::find_tag(tx, tag_type, name)? {
        if existing.emoji.is_none() && emoji.is_some() {
            tags::set_emoji(tx, existing.id, emoji.as_deref())?;
        }
        return Ok(existing.id);
    }
    tags::insert_tag(
        tx,
        &TagRecord {
            tag_type,
            name: name.to_string(),
            emoji,
            count: 0,
            last_used: today,
        },
    )
}

/// Rename the tag `id` and rewrite every log that references `old_name`.
/// `old_name` must be the tag's current name, otherwise the call fails with
/// `NotFound` and nothing is written.
///
/// When another tag of the same type already carries `new_name`, the two are
/// merged: counts add up (less any log that listed both names, which now
/// lists the survivor once), `last_used` takes the later date, the
/// destination keeps its emoji or inherits the source's, and the source row
/// is deleted.
pub fn rename(
    tx: &Transaction<'_>,
    id: i64,
    old_name: &str,
    new_name: &str,
    tag_type: TagType,
) -> Result<RenameOutcome, StoreError> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(StoreError::InvalidTagName);
    }
    // The caller's old name must match the stored row
    let source = tags::get_tag(tx, id)?
        .filter(|t| t.tag_type == tag_type && t.name == old_name)
        .ok_or_else(|| StoreError::tag_not_found(id))?;
    let old_name = source.name.as_str();
    if new_name == old_name {
        return Ok(RenameOutcome::Unchanged);
    }

    let destination = tags::find_tag(tx, tag_type, new_name)?.filter(|t| t.id != id);

    let referencing = logs::logs_referencing(tx, tag_type, old_name)?;
    let mut collapsed = 0u32;
    for log_id in &referencing {
        if logs::rewrite_reference(tx, *log_id, tag_type, old_name, new_name)? {
            collapsed += 1;
        }
    }

    match destination {
        Some(dest) => {
            let count = dest
                .count
                .saturating_add(source.count)
                .saturating_sub(collapsed);
            tags::set_usage(tx, dest.id, count, dest.last_used.max(source.last_used))?;
            if dest.emoji.is_none() && source.emoji.is_some() {
                tags::set_emoji(tx, dest.id, source.emoji.as_deref())?;
            }
            tags::delete_tag(tx, id)?;
            tracing::debug!(
                "merged {} tag {:?} (id {}) into {:?} (id {}), count {}",
                tag_type,
                old_name,
                id,
                new_name,
                dest.id,
                count
            );
            Ok(RenameOutcome::Merged {
                into: dest.id,
                logs_rewritten: referencing.len(),
            })
        }
        None => {
            tags::set_name(tx, id, new_name)?;
            tracing::debug!(
                "renamed {} tag {} from {:?} to {:?} across {} logs",
                tag_type,
                id,
                old_name,
                new_name,
                referencing.len()
            );
            Ok(RenameOutcome::Renamed {
                logs_rewritten: referencing.len(),
            })
        }
    }
}

/// Set or clear a tag's emoji. Independent of renaming.
pub fn set_emoji(tx: &Transaction<'_>, id: i64, emoji: Option<&str>) -> Result<(), StoreError> {
    if !tags::set_emoji(tx, id, normalize_emoji(emoji).as_deref())? {
        return Err(StoreError::tag_not_found(id));
    }
    Ok(())
}

/// Delete a tag row. Logs keep their literal names; the name simply stops
/// being suggested and counted.
pub fn remove(tx: &Transaction<'_>, id: i64) -> Result<(), StoreError> {
    if !tags::delete_tag(tx, id)? {
        return Err(StoreError::tag_not_found(id));
    }
    tracing::debug!("deleted tag {}", id);
    Ok(())
}

/// Zero every count while keeping the catalog. Returns the number of tags reset.
pub fn reset_all(tx: &Transaction<'_>) -> Result<usize, StoreError> {
    tags::reset_counts(tx)
}

/// All tags of one type, most used first.
pub fn list_by_type(conn: &Connection, tag_type: TagType) -> Result<Vec<Tag>, StoreError> {
    tags::tags_by_type(conn, tag_type)
}

fn normalize_emoji(emoji: Option<&str>) -> Option<String> {
    emoji
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}
