use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::Connection;

use super::blogs::ensure_blog_in;
use super::{
    bounded_text, immediate, not_found, required_text, Provisioning, MUST_CREATE_BLOG,
    NO_TAGS_FOUND,
};
use crate::db::{blogs, posts, tags};
use crate::models::{Actor, Blog, Id, NewPost, Post, PostChanges};
use crate::{Error, Policy, Result, Scope};

const TITLE_MAX: usize = 150;
const IMAGE_MAX: usize = 255;

pub fn list_posts(conn: &Connection, actor: &Actor) -> Result<Vec<Post>> {
    posts::list(conn, Scope::for_actor(actor).owner())
}

pub fn get_post(conn: &Connection, actor: &Actor, id: Id) -> Result<Post> {
    let post = posts::find(conn, id)?.ok_or_else(|| not_found("Post"))?;
    Policy::BlogOwnerOrAdmin.check(actor, &post)?;
    Ok(post)
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::validation("content", "This field may not be blank."));
    }
    Ok(())
}

fn validate_image(image: Option<&str>) -> Result<()> {
    match image {
        Some(image) => bounded_text("image", image, IMAGE_MAX),
        None => Ok(()),
    }
}

/// The blog new content of `actor` goes into.
pub(crate) fn owner_blog(
    conn: &Connection,
    actor: &Actor,
    provisioning: Provisioning,
) -> Result<Blog> {
    match provisioning {
        Provisioning::Auto => ensure_blog_in(conn, actor),
        Provisioning::Explicit => blogs::find_by_owner(conn, actor.id)?
            .ok_or_else(|| Error::PermissionDenied(MUST_CREATE_BLOG.to_string())),
    }
}

/// Check that every id names a tag the actor may attach. Superusers may
/// attach any tag; everyone else only tags of their own blog.
fn verified_tags(conn: &Connection, actor: &Actor, ids: &[Id]) -> Result<Vec<Id>> {
    let wanted: BTreeSet<Id> = ids.iter().copied().collect();
    let wanted: Vec<Id> = wanted.into_iter().collect();
    let found: Vec<Id> = tags::find_many(conn, &wanted)?
        .into_iter()
        .filter(|t| actor.is_superuser || t.owner_id == actor.id)
        .map(|t| t.id)
        .collect();
    if found.len() != wanted.len() {
        return Err(Error::Conflict(NO_TAGS_FOUND.to_string()));
    }
    Ok(found)
}

/// Create a post in the actor's blog.
pub fn create_post(
    conn: &mut Connection,
    actor: &Actor,
    input: NewPost,
    provisioning: Provisioning,
) -> Result<Post> {
    required_text("title", &input.title, TITLE_MAX)?;
    validate_content(&input.content)?;
    validate_image(input.image.as_deref())?;
    immediate(conn, |tx| {
        let blog = owner_blog(tx, actor, provisioning)?;
        let tag_ids = match &input.tag_ids {
            Some(ids) => verified_tags(tx, actor, ids)?,
            None => Vec::new(),
        };
        let id = posts::insert(
            tx,
            &posts::PostRow {
                blog_id: blog.id,
                title: &input.title,
                content: &input.content,
                image: input.image.as_deref(),
                created_at: Utc::now(),
            },
        )?;
        posts::set_tags(tx, id, &tag_ids)?;
        log::info!("created post {id} in blog {}", blog.id);
        posts::find(tx, id)?.ok_or_else(|| not_found("Post"))
    })
}

pub fn update_post(
    conn: &mut Connection,
    actor: &Actor,
    id: Id,
    changes: PostChanges,
) -> Result<Post> {
    immediate(conn, |tx| {
        let mut post = posts::find(tx, id)?.ok_or_else(|| not_found("Post"))?;
        Policy::BlogOwnerOrAdmin.check(actor, &post)?;
        if let Some(title) = changes.title {
            required_text("title", &title, TITLE_MAX)?;
            post.title = title;
        }
        if let Some(content) = changes.content {
            validate_content(&content)?;
            post.content = content;
        }
        if let Some(image) = changes.image {
            validate_image(Some(&image))?;
            post.image = if image.is_empty() { None } else { Some(image) };
        }
        let tag_ids = match &changes.tag_ids {
            Some(ids) => Some(verified_tags(tx, actor, ids)?),
            None => None,
        };
        post.updated_at = Utc::now();
        posts::update(tx, &post)?;
        if let Some(tag_ids) = tag_ids {
            posts::set_tags(tx, id, &tag_ids)?;
        }
        posts::find(tx, id)?.ok_or_else(|| not_found("Post"))
    })
}

pub fn delete_post(conn: &mut Connection, actor: &Actor, id: Id) -> Result<()> {
    immediate(conn, |tx| {
        let post = posts::find(tx, id)?.ok_or_else(|| not_found("Post"))?;
        Policy::BlogOwnerOrAdmin.check(actor, &post)?;
        posts::delete(tx, id)?;
        log::info!("deleted post {id}");
        Ok(())
    })
}
