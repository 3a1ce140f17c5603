//! Queries on `tags` and their side of `post_tags`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::placeholders;
use crate::models::{Id, Tag};
use crate::Result;

const SELECT: &str = "SELECT t.id, t.blog_id, b.user_id, t.name, t.created_at, t.updated_at
    FROM tags t JOIN blogs b ON b.id = t.blog_id";

fn from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        blog_id: row.get(1)?,
        owner_id: row.get(2)?,
        name: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        posts: Vec::new(),
    })
}

fn load_posts(conn: &Connection, mut tags: Vec<Tag>) -> Result<Vec<Tag>> {
    if tags.is_empty() {
        return Ok(tags);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT tag_id, post_id FROM post_tags WHERE tag_id IN ({}) ORDER BY post_id",
        placeholders(tags.len())
    ))?;
    let mut by_tag: HashMap<Id, Vec<Id>> = HashMap::new();
    let rows = stmt.query_map(params_from_iter(tags.iter().map(|t| t.id)), |row| {
        Ok((row.get::<_, Id>(0)?, row.get::<_, Id>(1)?))
    })?;
    for row in rows {
        let (tag_id, post_id) = row?;
        by_tag.entry(tag_id).or_default().push(post_id);
    }
    for tag in &mut tags {
        tag.posts = by_tag.remove(&tag.id).unwrap_or_default();
    }
    Ok(tags)
}

fn one(conn: &Connection, tag: Option<Tag>) -> Result<Option<Tag>> {
    match tag {
        None => Ok(None),
        Some(tag) => Ok(load_posts(conn, vec![tag])?.pop()),
    }
}

/// Tags whose blog belongs to `owner` or that are attached to one of
/// `owner`'s posts. Every tag when `owner` is `None`.
pub fn list(conn: &Connection, owner: Option<Id>) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE ?1 IS NULL OR b.user_id = ?1 OR EXISTS (
            SELECT 1 FROM post_tags pt
            JOIN posts p ON p.id = pt.post_id
            JOIN blogs pb ON pb.id = p.blog_id
            WHERE pt.tag_id = t.id AND pb.user_id = ?1)
        ORDER BY t.name, t.id"
    ))?;
    let tags = stmt
        .query_map([owner], from_row)?
        .collect::<rusqlite::Result<Vec<Tag>>>()?;
    load_posts(conn, tags)
}

pub fn find(conn: &Connection, id: Id) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(&format!("{SELECT} WHERE t.id = ?1"), [id], from_row)
        .optional()?;
    one(conn, tag)
}

/// Look up a tag by its already normalized name within one blog.
pub fn find_by_name(conn: &Connection, blog_id: Id, name: &str) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!("{SELECT} WHERE t.blog_id = ?1 AND t.name = ?2"),
            params![blog_id, name],
            from_row,
        )
        .optional()?;
    one(conn, tag)
}

/// The tags among `ids` that exist. Unknown ids are skipped.
pub fn find_many(conn: &Connection, ids: &[Id]) -> Result<Vec<Tag>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE t.id IN ({}) ORDER BY t.id",
        placeholders(ids.len())
    ))?;
    let tags = stmt
        .query_map(params_from_iter(ids.iter()), from_row)?
        .collect::<rusqlite::Result<Vec<Tag>>>()?;
    load_posts(conn, tags)
}

pub fn insert(conn: &Connection, blog_id: Id, name: &str, now: DateTime<Utc>) -> Result<Id> {
    conn.execute(
        "INSERT INTO tags (blog_id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![blog_id, name, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn rename(conn: &Connection, id: Id, name: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE tags SET name = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, name, now],
    )?;
    Ok(())
}

pub fn touch(conn: &Connection, id: Id, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE tags SET updated_at = ?2 WHERE id = ?1",
        params![id, now],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: Id) -> Result<bool> {
    Ok(conn.execute("DELETE FROM tags WHERE id = ?1", [id])? > 0)
}

/// Replace the posts of `tag_id` with `post_ids`.
pub fn set_posts(conn: &Connection, tag_id: Id, post_ids: &[Id]) -> Result<()> {
    conn.execute("DELETE FROM post_tags WHERE tag_id = ?1", [tag_id])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)")?;
    for post_id in post_ids {
        stmt.execute(params![post_id, tag_id])?;
    }
    Ok(())
}
