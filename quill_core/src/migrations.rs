//! Schema migrations, embedded in the binary and applied in order.
//!
//! Applied migrations are recorded by name in the `quill_migrations`
//! table. A migration is applied inside a transaction together with its
//! bookkeeping row, so a failed migration leaves nothing behind.

use rusqlite::{Connection, OptionalExtension};

use crate::{Error, Result};

const TABLE: &str = "quill_migrations";

/// A named, reversible schema change.
#[derive(Debug, PartialEq, Eq)]
pub struct Migration {
    name: &'static str,
    up_sql: &'static str,
    down_sql: &'static str,
}

impl Migration {
    /// The migration's name. Names sort in application order.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply the migration and mark it applied.
    pub fn apply(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute_batch(self.up_sql)?;
        tx.execute(
            &format!("INSERT INTO {TABLE} (name) VALUES (?1)"),
            [self.name],
        )?;
        tx.commit().map_err(|e| e.into())
    }

    /// Undo the migration and forget it was applied.
    pub fn downgrade(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute_batch(self.down_sql)?;
        tx.execute(&format!("DELETE FROM {TABLE} WHERE name = ?1"), [self.name])?;
        tx.commit().map_err(|e| e.into())
    }
}

/// Every migration, oldest first.
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        name: "20240611_083015_init",
        up_sql: r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT,
    password_hash TEXT NOT NULL,
    is_superuser INTEGER NOT NULL DEFAULT 0,
    is_staff INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE TABLE user_permissions (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    codename TEXT NOT NULL,
    PRIMARY KEY (user_id, codename)
);
CREATE TABLE blogs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    blog_id INTEGER NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    image TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX posts_blog_id ON posts (blog_id);
CREATE TABLE tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    blog_id INTEGER NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CONSTRAINT unique_tag_per_blog UNIQUE (blog_id, name)
);
CREATE INDEX tags_name ON tags (name);
CREATE TABLE post_tags (
    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (post_id, tag_id)
);
"#,
        down_sql: r#"
DROP TABLE post_tags;
DROP TABLE tags;
DROP TABLE posts;
DROP TABLE blogs;
DROP TABLE user_permissions;
DROP TABLE users;
"#,
    },
    Migration {
        name: "20240702_141207_post_ordering",
        up_sql: "CREATE INDEX posts_created_at ON posts (created_at DESC, id DESC);",
        down_sql: "DROP INDEX posts_created_at;",
    },
];

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (name TEXT NOT NULL PRIMARY KEY);"
    ))?;
    Ok(())
}

/// Names of the migrations recorded as applied, in application order.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    ensure_migrations_table(conn)?;
    let mut stmt = conn.prepare(&format!("SELECT name FROM {TABLE} ORDER BY name"))?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Get the last migration that has been applied to the database or None
/// if no migrations have been applied
pub fn last_applied_migration(conn: &Connection) -> Result<Option<&'static Migration>> {
    ensure_migrations_table(conn)?;
    let name: Option<String> = conn
        .query_row(
            &format!("SELECT name FROM {TABLE} ORDER BY name DESC LIMIT 1"),
            [],
            |row| row.get(0),
        )
        .optional()?;
    match name {
        None => Ok(None),
        Some(name) => MIGRATIONS
            .iter()
            .find(|m| m.name == name)
            .map(Some)
            .ok_or_else(|| Error::MigrationError(format!("unknown migration {name} applied"))),
    }
}

/// Get migrations which have not yet been applied to the database
pub fn unapplied_migrations(conn: &Connection) -> Result<Vec<&'static Migration>> {
    let applied = applied_migrations(conn)?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.iter().any(|name| name == m.name))
        .collect())
}

/// Apply all unapplied migrations. Returns how many were applied.
pub fn migrate(conn: &mut Connection) -> Result<usize> {
    let to_apply = unapplied_migrations(conn)?;
    for m in &to_apply {
        log::info!("applying migration {}", m.name());
        m.apply(conn)?;
    }
    Ok(to_apply.len())
}

/// Roll back the most recently applied migration, if any.
pub fn rollback_latest(conn: &mut Connection) -> Result<Option<&'static Migration>> {
    let latest = last_applied_migration(conn)?;
    if let Some(m) = latest {
        log::info!("rolling back migration {}", m.name());
        m.downgrade(conn)?;
    }
    Ok(latest)
}

/// Delete every row from every entity table, leaving the schema intact.
pub fn clear_data(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DELETE FROM post_tags;
         DELETE FROM tags;
         DELETE FROM posts;
         DELETE FROM blogs;
         DELETE FROM user_permissions;
         DELETE FROM users;",
    )?;
    tx.commit().map_err(|e| e.into())
}
