//! Queries on `blogs`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{Blog, Id, UserRef};
use crate::Result;

const SELECT: &str = "SELECT b.id, b.user_id, u.username, b.title, b.description,
        b.created_at, b.updated_at
    FROM blogs b JOIN users u ON u.id = b.user_id";

fn from_row(row: &Row) -> rusqlite::Result<Blog> {
    Ok(Blog {
        id: row.get(0)?,
        user: UserRef {
            id: row.get(1)?,
            username: row.get(2)?,
        },
        title: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Blogs owned by `owner`, or every blog when `owner` is `None`.
pub fn list(conn: &Connection, owner: Option<Id>) -> Result<Vec<Blog>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE (?1 IS NULL OR b.user_id = ?1) ORDER BY b.id"
    ))?;
    let blogs = stmt
        .query_map([owner], from_row)?
        .collect::<rusqlite::Result<Vec<Blog>>>()?;
    Ok(blogs)
}

pub fn find(conn: &Connection, id: Id) -> Result<Option<Blog>> {
    Ok(conn
        .query_row(&format!("{SELECT} WHERE b.id = ?1"), [id], from_row)
        .optional()?)
}

pub fn find_by_owner(conn: &Connection, user_id: Id) -> Result<Option<Blog>> {
    Ok(conn
        .query_row(&format!("{SELECT} WHERE b.user_id = ?1"), [user_id], from_row)
        .optional()?)
}

pub fn insert(
    conn: &Connection,
    user_id: Id,
    title: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<Id> {
    conn.execute(
        "INSERT INTO blogs (user_id, title, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![user_id, title, description, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, blog: &Blog) -> Result<()> {
    conn.execute(
        "UPDATE blogs SET title = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        params![blog.id, blog.title, blog.description, blog.updated_at],
    )?;
    Ok(())
}

/// Delete a blog. Its posts and tags go with it.
pub fn delete(conn: &Connection, id: Id) -> Result<bool> {
    Ok(conn.execute("DELETE FROM blogs WHERE id = ?1", [id])? > 0)
}
