//! Queries on `posts` and their side of `post_tags`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::placeholders;
use crate::models::{Id, Post, TagRef};
use crate::Result;

const SELECT: &str = "SELECT p.id, p.blog_id, b.user_id, p.title, p.content, p.image,
        p.created_at, p.updated_at
    FROM posts p JOIN blogs b ON b.id = p.blog_id";

const ORDER: &str = "ORDER BY p.created_at DESC, p.id DESC";

fn from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        blog_id: row.get(1)?,
        owner_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        image: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        tags: Vec::new(),
    })
}

/// Fill in `tags` for every post with one query.
fn load_tags(conn: &Connection, mut posts: Vec<Post>) -> Result<Vec<Post>> {
    if posts.is_empty() {
        return Ok(posts);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT pt.post_id, t.id, t.name FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
         WHERE pt.post_id IN ({}) ORDER BY t.name, t.id",
        placeholders(posts.len())
    ))?;
    let mut by_post: HashMap<Id, Vec<TagRef>> = HashMap::new();
    let rows = stmt.query_map(params_from_iter(posts.iter().map(|p| p.id)), |row| {
        Ok((
            row.get::<_, Id>(0)?,
            TagRef {
                id: row.get(1)?,
                name: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (post_id, tag) = row?;
        by_post.entry(post_id).or_default().push(tag);
    }
    for post in &mut posts {
        post.tags = by_post.remove(&post.id).unwrap_or_default();
    }
    Ok(posts)
}

/// Posts whose blog belongs to `owner`, or every post when `owner` is
/// `None`. Newest first.
pub fn list(conn: &Connection, owner: Option<Id>) -> Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE (?1 IS NULL OR b.user_id = ?1) {ORDER}"
    ))?;
    let posts = stmt
        .query_map([owner], from_row)?
        .collect::<rusqlite::Result<Vec<Post>>>()?;
    load_tags(conn, posts)
}

pub fn find(conn: &Connection, id: Id) -> Result<Option<Post>> {
    let post = conn
        .query_row(&format!("{SELECT} WHERE p.id = ?1"), [id], from_row)
        .optional()?;
    match post {
        None => Ok(None),
        Some(post) => Ok(load_tags(conn, vec![post])?.pop()),
    }
}

/// The posts among `ids` that exist. Unknown ids are skipped.
pub fn find_many(conn: &Connection, ids: &[Id]) -> Result<Vec<Post>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE p.id IN ({}) ORDER BY p.id",
        placeholders(ids.len())
    ))?;
    let posts = stmt
        .query_map(params_from_iter(ids.iter()), from_row)?
        .collect::<rusqlite::Result<Vec<Post>>>()?;
    load_tags(conn, posts)
}

/// Row values for a new post.
#[derive(Debug)]
pub struct PostRow<'a> {
    pub blog_id: Id,
    pub title: &'a str,
    pub content: &'a str,
    pub image: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

pub fn insert(conn: &Connection, row: &PostRow) -> Result<Id> {
    conn.execute(
        "INSERT INTO posts (blog_id, title, content, image, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![row.blog_id, row.title, row.content, row.image, row.created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, post: &Post) -> Result<()> {
    conn.execute(
        "UPDATE posts SET title = ?2, content = ?3, image = ?4, updated_at = ?5 WHERE id = ?1",
        params![post.id, post.title, post.content, post.image, post.updated_at],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: Id) -> Result<bool> {
    Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [id])? > 0)
}

/// Replace the tags of `post_id` with `tag_ids`.
pub fn set_tags(conn: &Connection, post_id: Id, tag_ids: &[Id]) -> Result<()> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", [post_id])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute(params![post_id, tag_id])?;
    }
    Ok(())
}
