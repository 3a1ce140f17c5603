//! Queries on `users` and `user_permissions`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{Id, User};
use crate::Result;

const COLUMNS: &str = "id, username, email, is_superuser, is_staff, created_at";

fn from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_superuser: row.get(3)?,
        is_staff: row.get(4)?,
        created_at: row.get(5)?,
        permissions: Vec::new(),
    })
}

fn with_permissions(conn: &Connection, user: Option<User>) -> Result<Option<User>> {
    match user {
        None => Ok(None),
        Some(mut user) => {
            user.permissions = permissions(conn, user.id)?;
            Ok(Some(user))
        }
    }
}

/// Row values for a new user.
#[derive(Debug)]
pub struct UserRow<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

pub fn insert(conn: &Connection, row: &UserRow) -> Result<Id> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, is_superuser, is_staff, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.username,
            row.email,
            row.password_hash,
            row.is_superuser,
            row.is_staff,
            row.created_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: Id) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    with_permissions(conn, user)
}

/// Id and stored password hash for `username`.
pub fn credentials(conn: &Connection, username: &str) -> Result<Option<(Id, String)>> {
    Ok(conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1",
            [username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

pub fn exists(conn: &Connection, username: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            [username],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Codenames granted to `user_id`, sorted.
pub fn permissions(conn: &Connection, user_id: Id) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT codename FROM user_permissions WHERE user_id = ?1 ORDER BY codename")?;
    let names = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Grant codenames. Already granted ones are left alone.
pub fn grant(conn: &Connection, user_id: Id, codenames: &[&str]) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO user_permissions (user_id, codename) VALUES (?1, ?2)")?;
    for codename in codenames {
        stmt.execute(params![user_id, codename])?;
    }
    Ok(())
}
