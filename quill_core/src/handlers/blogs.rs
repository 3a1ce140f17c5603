use chrono::Utc;
use rusqlite::Connection;

use super::{immediate, not_found, required_text, ALREADY_HAS_BLOG};
use crate::db::blogs;
use crate::models::{Actor, Blog, BlogChanges, Id, NewBlog};
use crate::{Error, Policy, Result, Scope};

const TITLE_MAX: usize = 100;
pub const DEFAULT_DESCRIPTION: &str = "Blog";

pub fn default_title(username: &str) -> String {
    format!("{username}'s blog")
}

pub fn list_blogs(conn: &Connection, actor: &Actor) -> Result<Vec<Blog>> {
    blogs::list(conn, Scope::for_actor(actor).owner())
}

pub fn get_blog(conn: &Connection, actor: &Actor, id: Id) -> Result<Blog> {
    let blog = blogs::find(conn, id)?.ok_or_else(|| not_found("Blog"))?;
    Policy::OwnerOrAdmin.check(actor, &blog)?;
    Ok(blog)
}

/// The actor's blog, created with default title and description if it
/// does not exist yet. Idempotent.
pub fn ensure_blog(conn: &mut Connection, actor: &Actor) -> Result<Blog> {
    immediate(conn, |tx| ensure_blog_in(tx, actor))
}

pub(crate) fn ensure_blog_in(conn: &Connection, actor: &Actor) -> Result<Blog> {
    if let Some(blog) = blogs::find_by_owner(conn, actor.id)? {
        return Ok(blog);
    }
    let title = default_title(&actor.username);
    match blogs::insert(conn, actor.id, &title, DEFAULT_DESCRIPTION, Utc::now()) {
        Ok(id) => {
            log::info!("provisioned blog {id} for {}", actor.username);
        }
        // Lost a race with another request; its blog is ours.
        Err(e) if e.is_unique_violation() => {}
        Err(e) => return Err(e),
    }
    blogs::find_by_owner(conn, actor.id)?
        .ok_or_else(|| Error::Internal(format!("blog for user {} vanished", actor.id)))
}

pub fn create_blog(conn: &mut Connection, actor: &Actor, input: NewBlog) -> Result<Blog> {
    required_text("title", &input.title, TITLE_MAX)?;
    let description = input
        .description
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
    immediate(conn, |tx| {
        if !actor.is_superuser && blogs::find_by_owner(tx, actor.id)?.is_some() {
            return Err(Error::Conflict(ALREADY_HAS_BLOG.to_string()));
        }
        let id = match blogs::insert(tx, actor.id, &input.title, &description, Utc::now()) {
            Ok(id) => id,
            Err(e) if e.is_unique_violation() => {
                return Err(Error::Conflict(ALREADY_HAS_BLOG.to_string()))
            }
            Err(e) => return Err(e),
        };
        log::info!("created blog {id} for {}", actor.username);
        blogs::find(tx, id)?.ok_or_else(|| not_found("Blog"))
    })
}

pub fn update_blog(
    conn: &mut Connection,
    actor: &Actor,
    id: Id,
    changes: BlogChanges,
) -> Result<Blog> {
    immediate(conn, |tx| {
        let mut blog = blogs::find(tx, id)?.ok_or_else(|| not_found("Blog"))?;
        Policy::OwnerOrAdmin.check(actor, &blog)?;
        if let Some(title) = changes.title {
            required_text("title", &title, TITLE_MAX)?;
            blog.title = title;
        }
        if let Some(description) = changes.description {
            blog.description = description;
        }
        blog.updated_at = Utc::now();
        blogs::update(tx, &blog)?;
        Ok(blog)
    })
}

/// Delete a blog along with its posts and tags.
pub fn delete_blog(conn: &mut Connection, actor: &Actor, id: Id) -> Result<()> {
    immediate(conn, |tx| {
        let blog = blogs::find(tx, id)?.ok_or_else(|| not_found("Blog"))?;
        Policy::OwnerOrAdmin.check(actor, &blog)?;
        blogs::delete(tx, id)?;
        log::info!("deleted blog {id}");
        Ok(())
    })
}
