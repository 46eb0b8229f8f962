// ABOUTME: Table-level operations on the tags table: lookups, inserts, patches, and frequency-ranked lists.
// ABOUTME: Uniqueness of (type, name) is kept by callers looking up before inserting.

use chrono::NaiveDate;
use gohanlog_core::{Tag, TagType};
use rusqlite::{Connection, Row, params};

use crate::engine::logs::{format_date, parse_date};
use crate::error::StoreError;

const TAG_COLUMNS: &str = "id, type, name, emoji, count, last_used";

/// The fields of a tag row, minus its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub tag_type: TagType,
    pub name: String,
    pub emoji: Option<String>,
    pub count: u32,
    pub last_used: NaiveDate,
}

fn read_tag(row: &Row<'_>) -> Result<Tag, StoreError> {
    let id: i64 = row.get(0)?;
    let tag_type: String = row.get(1)?;
    let count: i64 = row.get(4)?;
    let last_used: String = row.get(5)?;

    let corrupt = |detail: String| StoreError::Corrupt {
        table: "tags",
        detail,
    };

    Ok(Tag {
        id,
        tag_type: tag_type
            .parse()
            .map_err(|e| corrupt(format!("tag {}: {}", id, e)))?,
        name: row.get(2)?,
        emoji: row.get(3)?,
        count: u32::try_from(count)
            .map_err(|_| corrupt(format!("tag {} has invalid count {}", id, count)))?,
        last_used: parse_date("tags", &last_used)?,
    })
}

fn query_tags(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Tag>, StoreError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(params)?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(read_tag(row)?);
    }
    Ok(tags)
}

pub fn get_tag(conn: &Connection, id: i64) -> Result<Option<Tag>, StoreError> {
    let sql = format!("SELECT {} FROM tags WHERE id = ?1", TAG_COLUMNS);
    Ok(query_tags(conn, &sql, params![id])?.into_iter().next())
}

/// Look up a tag by its `(type, name)` key.
pub fn find_tag(conn: &Connection, tag_type: TagType, name: &str) -> Result<Option<Tag>, StoreError> {
    let sql = format!(
        "SELECT {} FROM tags WHERE type = ?1 AND name = ?2 ORDER BY id LIMIT 1",
        TAG_COLUMNS
    );
    Ok(query_tags(conn, &sql, params![tag_type.as_str(), name])?
        .into_iter()
        .next())
}

pub fn insert_tag(conn: &Connection, record: &TagRecord) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO tags (type, name, emoji, count, last_used) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.tag_type.as_str(),
            record.name,
            record.emoji,
            record.count,
            format_date(record.last_used),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert-or-replace a tag keyed by id. Without an id a new one is assigned.
pub fn put_tag(conn: &Connection, id: Option<i64>, record: &TagRecord) -> Result<i64, StoreError> {
    let Some(id) = id else {
        return insert_tag(conn, record);
    };
    conn.execute(
        "INSERT INTO tags (id, type, name, emoji, count, last_used) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            type = excluded.type,
            name = excluded.name,
            emoji = excluded.emoji,
            count = excluded.count,
            last_used = excluded.last_used",
        params![
            id,
            record.tag_type.as_str(),
            record.name,
            record.emoji,
            record.count,
            format_date(record.last_used),
        ],
    )?;
    Ok(id)
}

/// Patch the usage counters of one tag.
pub fn set_usage(
    conn: &Connection,
    id: i64,
    count: u32,
    last_used: NaiveDate,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE tags SET count = ?1, last_used = ?2 WHERE id = ?3",
        params![count, format_date(last_used), id],
    )?;
    Ok(())
}

pub fn set_count(conn: &Connection, id: i64, count: u32) -> Result<(), StoreError> {
    conn.execute("UPDATE tags SET count = ?1 WHERE id = ?2", params![count, id])?;
    Ok(())
}

pub fn set_name(conn: &Connection, id: i64, name: &str) -> Result<(), StoreError> {
    conn.execute("UPDATE tags SET name = ?1 WHERE id = ?2", params![name, id])?;
    Ok(())
}

/// Returns false if no tag has this id.
pub fn set_emoji(conn: &Connection, id: i64, emoji: Option<&str>) -> Result<bool, StoreError> {
    let changed = conn.execute("UPDATE tags SET emoji = ?1 WHERE id = ?2", params![emoji, id])?;
    Ok(changed > 0)
}

/// Returns false if no tag has this id.
pub fn delete_tag(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let deleted = conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

/// Tags of one type, most used first. Ties keep insertion order.
pub fn tags_by_type(conn: &Connection, tag_type: TagType) -> Result<Vec<Tag>, StoreError> {
    let sql = format!(
        "SELECT {} FROM tags WHERE type = ?1 ORDER BY count DESC, id ASC",
        TAG_COLUMNS
    );
    query_tags(conn, &sql, params![tag_type.as_str()])
}

pub fn all_tags(conn: &Connection) -> Result<Vec<Tag>, StoreError> {
    let sql = format!("SELECT {} FROM tags ORDER BY id", TAG_COLUMNS);
    query_tags(conn, &sql, [])
}

/// Zero every tag's count, keeping the rows. Returns the number of tags touched.
pub fn reset_counts(conn: &Connection) -> Result<usize, StoreError> {
    Ok(conn.execute("UPDATE tags SET count = 0", [])?)
}

pub fn count_tags(conn: &Connection) -> Result<usize, StoreError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::schema;

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::migrate(&mut conn).unwrap();
        conn
    }

    fn record(tag_type: TagType, name: &str, count: u32) -> TagRecord {
        TagRecord {
            tag_type,
            name: name.to_string(),
            emoji: None,
            count,
            last_used: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn find_tag_is_scoped_by_type() {
        let conn = conn();
        let place = insert_tag(&conn, &record(TagType::Place, "Mio", 1)).unwrap();
        let person = insert_tag(&conn, &record(TagType::Person, "Mio", 2)).unwrap();

        assert_eq!(find_tag(&conn, TagType::Place, "Mio").unwrap().unwrap().id, place);
        assert_eq!(find_tag(&conn, TagType::Person, "Mio").unwrap().unwrap().id, person);
        assert!(find_tag(&conn, TagType::Person, "mio").unwrap().is_none());
    }

    #[test]
    fn tags_by_type_ranks_by_count() {
        let conn = conn();
        insert_tag(&conn, &record(TagType::Place, "Rare", 1)).unwrap();
        insert_tag(&conn, &record(TagType::Place, "Often", 9)).unwrap();
        insert_tag(&conn, &record(TagType::Place, "Tie", 1)).unwrap();
        insert_tag(&conn, &record(TagType::Person, "Other", 50)).unwrap();

        let names: Vec<String> = tags_by_type(&conn, TagType::Place)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Often", "Rare", "Tie"]);
    }

    #[test]
    fn put_tag_replaces_by_id() {
        let conn = conn();
        put_tag(&conn, Some(5), &record(TagType::Person, "Ken", 1)).unwrap();

        let mut replacement = record(TagType::Person, "Kenji", 3);
        replacement.emoji = Some("🍜".to_string());
        put_tag(&conn, Some(5), &replacement).unwrap();

        let tag = get_tag(&conn, 5).unwrap().unwrap();
        assert_eq!(tag.name, "Kenji");
        assert_eq!(tag.count, 3);
        assert_eq!(tag.emoji.as_deref(), Some("🍜"));
        assert_eq!(count_tags(&conn).unwrap(), 1);
    }

    #[test]
    fn reset_counts_keeps_rows_and_emoji() {
        let conn = conn();
        let id = insert_tag(&conn, &record(TagType::Place, "A", 4)).unwrap();
        set_emoji(&conn, id, Some("🍱")).unwrap();

        assert_eq!(reset_counts(&conn).unwrap(), 1);

        let tag = get_tag(&conn, id).unwrap().unwrap();
        assert_eq!(tag.count, 0);
        assert_eq!(tag.emoji.as_deref(), Some("🍱"));
    }
}
