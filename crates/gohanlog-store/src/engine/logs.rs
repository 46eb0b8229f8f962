// ABOUTME: Table-level operations on logs and their people and image rows.
// ABOUTME: Image data is stored as a BLOB or TEXT value so both payload representations survive unchanged.

use chrono::NaiveDate;
use gohanlog_core::{ImagePayload, Log, LogDraft, TagType};
use rusqlite::types::{ToSql, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Image rows are split by kind and index-aligned by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Photo,
    Thumbnail,
}

impl ImageKind {
    fn as_str(self) -> &'static str {
        match self {
            ImageKind::Photo => "photo",
            ImageKind::Thumbnail => "thumbnail",
        }
    }
}

/// A log without its image payloads, used for list filtering before the
/// heavier image rows are loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSummary {
    pub id: i64,
    pub date: NaiveDate,
    pub place: String,
    pub people: Vec<String>,
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(table: &'static str, text: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| StoreError::Corrupt {
        table,
        detail: format!("invalid date {:?}: {}", text, e),
    })
}

/// Insert a new log and return its assigned id.
pub fn insert_log(conn: &Connection, draft: &LogDraft) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO logs (date, place) VALUES (?1, ?2)",
        params![format_date(draft.date), draft.place],
    )?;
    let id = conn.last_insert_rowid();
    write_children(conn, id, draft)?;
    Ok(id)
}

/// Insert-or-replace a log keyed by id. Without an id a new one is assigned.
pub fn put_log(conn: &Connection, id: Option<i64>, draft: &LogDraft) -> Result<i64, StoreError> {
    let Some(id) = id else {
        return insert_log(conn, draft);
    };
    conn.execute(
        "INSERT INTO logs (id, date, place) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            date = excluded.date,
            place = excluded.place",
        params![id, format_date(draft.date), draft.place],
    )?;
    clear_children(conn, id)?;
    write_children(conn, id, draft)?;
    Ok(id)
}

/// Replace every field of an existing log. Returns false if no such log exists.
pub fn replace_log(conn: &Connection, id: i64, draft: &LogDraft) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE logs SET date = ?1, place = ?2 WHERE id = ?3",
        params![format_date(draft.date), draft.place, id],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    clear_children(conn, id)?;
    write_children(conn, id, draft)?;
    Ok(true)
}

fn clear_children(conn: &Connection, id: i64) -> Result<(), StoreError> {
    conn.execute("DELETE FROM log_people WHERE log_id = ?1", params![id])?;
    conn.execute("DELETE FROM log_images WHERE log_id = ?1", params![id])?;
    Ok(())
}

fn write_children(conn: &Connection, id: i64, draft: &LogDraft) -> Result<(), StoreError> {
    write_people(conn, id, &draft.people)?;
    write_images(conn, id, ImageKind::Photo, &draft.photos)?;
    write_images(conn, id, ImageKind::Thumbnail, &draft.thumbnails)?;
    Ok(())
}

fn write_people(conn: &Connection, id: i64, people: &[String]) -> Result<(), StoreError> {
    let mut stmt =
        conn.prepare_cached("INSERT INTO log_people (log_id, position, person) VALUES (?1, ?2, ?3)")?;
    for (position, person) in people.iter().enumerate() {
        stmt.execute(params![id, position as i64, person])?;
    }
    Ok(())
}

fn write_images(
    conn: &Connection,
    id: i64,
    kind: ImageKind,
    images: &[ImagePayload],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO log_images (log_id, kind, position, data) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, image) in images.iter().enumerate() {
        let data: &dyn ToSql = match image {
            ImagePayload::Binary(bytes) => bytes,
            ImagePayload::Encoded(text) => text,
        };
        stmt.execute(params![id, kind.as_str(), position as i64, data])?;
    }
    Ok(())
}

fn load_people(conn: &Connection, id: i64) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare_cached("SELECT person FROM log_people WHERE log_id = ?1 ORDER BY position")?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;

    let mut people = Vec::new();
    for row in rows {
        people.push(row?);
    }
    Ok(people)
}

fn load_images(conn: &Connection, id: i64, kind: ImageKind) -> Result<Vec<ImagePayload>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT data FROM log_images WHERE log_id = ?1 AND kind = ?2 ORDER BY position",
    )?;
    let mut rows = stmt.query(params![id, kind.as_str()])?;

    let mut images = Vec::new();
    while let Some(row) = rows.next()? {
        let payload = match row.get_ref(0)? {
            ValueRef::Blob(bytes) => ImagePayload::Binary(bytes.to_vec()),
            ValueRef::Text(text) => ImagePayload::Encoded(
                String::from_utf8(text.to_vec()).map_err(|e| StoreError::Corrupt {
                    table: "log_images",
                    detail: format!("log {} has non-UTF-8 encoded image: {}", id, e),
                })?,
            ),
            other => {
                return Err(StoreError::Corrupt {
                    table: "log_images",
                    detail: format!("log {} has image of type {:?}", id, other.data_type()),
                });
            }
        };
        images.push(payload);
    }
    Ok(images)
}

/// Complete a summary into a full log by loading its images.
pub fn hydrate(conn: &Connection, summary: LogSummary) -> Result<Log, StoreError> {
    let photos = load_images(conn, summary.id, ImageKind::Photo)?;
    let thumbnails = load_images(conn, summary.id, ImageKind::Thumbnail)?;
    Ok(Log {
        id: summary.id,
        date: summary.date,
        place: summary.place,
        people: summary.people,
        photos,
        thumbnails,
    })
}

/// Fetch one log without its images.
pub fn get_summary(conn: &Connection, id: i64) -> Result<Option<LogSummary>, StoreError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT date, place FROM logs WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((date, place)) => Ok(Some(LogSummary {
            id,
            date: parse_date("logs", &date)?,
            place,
            people: load_people(conn, id)?,
        })),
        None => Ok(None),
    }
}

/// Fetch one log with its people and images.
pub fn get_log(conn: &Connection, id: i64) -> Result<Option<Log>, StoreError> {
    match get_summary(conn, id)? {
        Some(summary) => Ok(Some(hydrate(conn, summary)?)),
        None => Ok(None),
    }
}

/// Summaries newest-first, narrowed by exact place and/or person through the indexes.
pub fn list_summaries(
    conn: &Connection,
    place: Option<&str>,
    person: Option<&str>,
) -> Result<Vec<LogSummary>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT l.id, l.date, l.place FROM logs l
         WHERE (?1 IS NULL OR l.place = ?1)
           AND (?2 IS NULL OR EXISTS (
                SELECT 1 FROM log_people p WHERE p.log_id = l.id AND p.person = ?2))
         ORDER BY l.date DESC, l.id DESC",
    )?;
    let rows = stmt.query_map(params![place, person], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut raw = Vec::new();
    for row in rows {
        raw.push(row?);
    }

    let mut summaries = Vec::with_capacity(raw.len());
    for (id, date, place) in raw {
        summaries.push(LogSummary {
            id,
            date: parse_date("logs", &date)?,
            place,
            people: load_people(conn, id)?,
        });
    }
    Ok(summaries)
}

/// Every log in id order, with images.
pub fn all_logs(conn: &Connection) -> Result<Vec<Log>, StoreError> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM logs ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>()?
    };

    let mut logs = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(log) = get_log(conn, id)? {
            logs.push(log);
        }
    }
    Ok(logs)
}

/// Ids of logs that reference `name` as their place or as one of their people.
pub fn logs_referencing(
    conn: &Connection,
    tag_type: TagType,
    name: &str,
) -> Result<Vec<i64>, StoreError> {
    let sql = match tag_type {
        TagType::Place => "SELECT id FROM logs WHERE place = ?1 ORDER BY id",
        TagType::Person => "SELECT DISTINCT log_id FROM log_people WHERE person = ?1 ORDER BY log_id",
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params![name], |row| row.get(0))?;
    Ok(rows.collect::<Result<_, _>>()?)
}

/// Rewrite one log's reference from `old` to `new`, touching only the place
/// or the matching people entry. If the log already lists `new` among its
/// people, the old entry is dropped instead of duplicated and `true` is returned.
pub fn rewrite_reference(
    conn: &Connection,
    log_id: i64,
    tag_type: TagType,
    old: &str,
    new: &str,
) -> Result<bool, StoreError> {
    match tag_type {
        TagType::Place => {
            conn.execute(
                "UPDATE logs SET place = ?1 WHERE id = ?2 AND place = ?3",
                params![new, log_id, old],
            )?;
            Ok(false)
        }
        TagType::Person => {
            let people = load_people(conn, log_id)?;
            let collapsed = people.iter().any(|p| p == new);
            let rewritten: Vec<String> = if collapsed {
                people.into_iter().filter(|p| p != old).collect()
            } else {
                people
                    .into_iter()
                    .map(|p| if p == old { new.to_string() } else { p })
                    .collect()
            };
            conn.execute("DELETE FROM log_people WHERE log_id = ?1", params![log_id])?;
            write_people(conn, log_id, &rewritten)?;
            Ok(collapsed)
        }
    }
}

/// Delete one log and its child rows. Returns false if it did not exist.
pub fn delete_log(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let deleted = conn.execute("DELETE FROM logs WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

/// Delete every log. Returns the number removed.
pub fn delete_all_logs(conn: &Connection) -> Result<usize, StoreError> {
    Ok(conn.execute("DELETE FROM logs", [])?)
}

pub fn count_logs(conn: &Connection) -> Result<usize, StoreError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
    Ok(n as usize)
}
