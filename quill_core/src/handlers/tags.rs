//! Tag handlers.
//!
//! Tags live in one blog and are unique by normalized name within it.
//! [`create_tag`] refuses a name that is already taken, while
//! [`assign_tag`] reuses the existing tag and replaces its posts.

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::Connection;

use super::blogs::ensure_blog_in;
use super::{
    immediate, not_found, required_text, Provisioning, MUST_CREATE_BLOG, NO_POSTS_FOUND,
    NO_POSTS_GIVEN,
};
use crate::db::{blogs, posts, tags};
use crate::models::{Actor, Blog, Id, NewTag, Tag, TagChanges};
use crate::ownership::is_owner;
use crate::{Error, Policy, Result, Scope};

const NAME_MAX: usize = 50;

/// Trim and lower-case a tag name.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn validated_name(name: &str) -> Result<String> {
    let name = normalize_tag_name(name);
    required_text("name", &name, NAME_MAX)?;
    Ok(name)
}

fn name_taken(name: &str) -> Error {
    Error::Conflict(format!("A tag named '{name}' already exists in this blog."))
}

pub fn list_tags(conn: &Connection, actor: &Actor) -> Result<Vec<Tag>> {
    tags::list(conn, Scope::for_actor(actor).owner())
}

/// A tag is readable by its blog's owner and by the owner of any post it
/// is attached to. Changing it still needs the blog's owner.
pub fn get_tag(conn: &Connection, actor: &Actor, id: Id) -> Result<Tag> {
    let tag = tags::find(conn, id)?.ok_or_else(|| not_found("Tag"))?;
    if !Policy::BlogOwnerOrAdmin.has_object_permission(actor, &tag) {
        let tagged = posts::find_many(conn, &tag.posts)?;
        Policy::BlogOwnerOrAdmin.check(actor, tagged.as_slice())?;
    }
    Ok(tag)
}

/// The blog a new tag goes into. Only superusers get one provisioned.
fn tag_blog(conn: &Connection, actor: &Actor, provisioning: Provisioning) -> Result<Blog> {
    if actor.is_superuser && provisioning == Provisioning::Auto {
        return ensure_blog_in(conn, actor);
    }
    blogs::find_by_owner(conn, actor.id)?
        .ok_or_else(|| Error::PermissionDenied(MUST_CREATE_BLOG.to_string()))
}

/// Resolve the requested posts, keeping those the actor owns (all of
/// them for superusers). Fails unless every distinct id survives.
fn verified_posts(conn: &Connection, actor: &Actor, ids: &[Id]) -> Result<Vec<Id>> {
    if ids.is_empty() {
        return Err(Error::validation("posts", NO_POSTS_GIVEN));
    }
    let wanted: BTreeSet<Id> = ids.iter().copied().collect();
    let wanted: Vec<Id> = wanted.into_iter().collect();
    let owned: Vec<Id> = posts::find_many(conn, &wanted)?
        .into_iter()
        .filter(|p| actor.is_superuser || is_owner(actor, p))
        .map(|p| p.id)
        .collect();
    if owned.len() != wanted.len() {
        log::debug!(
            "{} asked to tag {wanted:?}, may only tag {owned:?}",
            actor.username
        );
        return Err(Error::Conflict(NO_POSTS_FOUND.to_string()));
    }
    Ok(owned)
}

/// Create a tag in the actor's blog and attach it to exactly the given
/// posts.
pub fn create_tag(
    conn: &mut Connection,
    actor: &Actor,
    input: NewTag,
    provisioning: Provisioning,
) -> Result<Tag> {
    immediate(conn, |tx| {
        let blog = tag_blog(tx, actor, provisioning)?;
        let post_ids = verified_posts(tx, actor, &input.posts)?;
        let name = validated_name(&input.name)?;
        if tags::find_by_name(tx, blog.id, &name)?.is_some() {
            return Err(name_taken(&name));
        }
        let id = match tags::insert(tx, blog.id, &name, Utc::now()) {
            Ok(id) => id,
            Err(e) if e.is_unique_violation() => return Err(name_taken(&name)),
            Err(e) => return Err(e),
        };
        tags::set_posts(tx, id, &post_ids)?;
        log::info!("created tag {id} '{name}' in blog {}", blog.id);
        tags::find(tx, id)?.ok_or_else(|| not_found("Tag"))
    })
}

/// Find or create the named tag in the actor's blog and replace its
/// posts with the given ones. Repeating the call changes nothing.
pub fn assign_tag(
    conn: &mut Connection,
    actor: &Actor,
    input: NewTag,
    provisioning: Provisioning,
) -> Result<Tag> {
    immediate(conn, |tx| {
        let blog = tag_blog(tx, actor, provisioning)?;
        let post_ids = verified_posts(tx, actor, &input.posts)?;
        let name = validated_name(&input.name)?;
        let now = Utc::now();
        let id = match tags::find_by_name(tx, blog.id, &name)? {
            Some(tag) => tag.id,
            None => match tags::insert(tx, blog.id, &name, now) {
                Ok(id) => id,
                Err(e) if e.is_unique_violation() => tags::find_by_name(tx, blog.id, &name)?
                    .map(|t| t.id)
                    .ok_or_else(|| not_found("Tag"))?,
                Err(e) => return Err(e),
            },
        };
        tags::set_posts(tx, id, &post_ids)?;
        tags::touch(tx, id, now)?;
        tags::find(tx, id)?.ok_or_else(|| not_found("Tag"))
    })
}

/// Rename a tag and/or replace its posts.
pub fn update_tag(
    conn: &mut Connection,
    actor: &Actor,
    id: Id,
    changes: TagChanges,
) -> Result<Tag> {
    immediate(conn, |tx| {
        let tag = tags::find(tx, id)?.ok_or_else(|| not_found("Tag"))?;
        Policy::BlogOwnerOrAdmin.check(actor, &tag)?;
        let name = match &changes.name {
            Some(name) => Some(validated_name(name)?),
            None => None,
        };
        let post_ids = match &changes.posts {
            Some(ids) => Some(verified_posts(tx, actor, ids)?),
            None => None,
        };
        let now = Utc::now();
        if let Some(name) = name.filter(|n| *n != tag.name) {
            if tags::find_by_name(tx, tag.blog_id, &name)?.is_some() {
                return Err(name_taken(&name));
            }
            match tags::rename(tx, id, &name, now) {
                Err(e) if e.is_unique_violation() => return Err(name_taken(&name)),
                other => other?,
            }
        }
        if let Some(post_ids) = post_ids {
            tags::set_posts(tx, id, &post_ids)?;
        }
        tags::touch(tx, id, now)?;
        tags::find(tx, id)?.ok_or_else(|| not_found("Tag"))
    })
}

pub fn delete_tag(conn: &mut Connection, actor: &Actor, id: Id) -> Result<()> {
    immediate(conn, |tx| {
        let tag = tags::find(tx, id)?.ok_or_else(|| not_found("Tag"))?;
        Policy::BlogOwnerOrAdmin.check(actor, &tag)?;
        tags::delete(tx, id)?;
        log::info!("deleted tag {id}");
        Ok(())
    })
}
