//! Resource mutation handlers.
//!
//! Every handler takes the acting [`Actor`](crate::Actor) and a
//! connection, performs all of its ownership and validation checks before
//! the first write, and applies its writes inside a single `BEGIN
//! IMMEDIATE` transaction. Read handlers narrow their results with a
//! [`Scope`](crate::Scope) or apply the resource's
//! [`Policy`](crate::Policy).

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub mod blogs;
pub mod posts;
pub mod tags;
pub mod users;

pub use blogs::{create_blog, delete_blog, ensure_blog, get_blog, list_blogs, update_blog};
pub use posts::{create_post, delete_post, get_post, list_posts, update_post};
pub use tags::{
    assign_tag, create_tag, delete_tag, get_tag, list_tags, normalize_tag_name, update_tag,
};
pub use users::{authenticate, create_superuser, get_user, load_actor, register};

pub const MUST_CREATE_BLOG: &str = "You must create a blog before continuing";
pub const ALREADY_HAS_BLOG: &str = "You already have a blog.";
pub const NO_POSTS_GIVEN: &str = "You must provide at least one post to tag.";
pub const NO_POSTS_FOUND: &str = "No posts were found with those ids.";
pub const NO_TAGS_FOUND: &str = "No tags were found with those ids.";

/// Whether a user's blog is created for them the first time they need one.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provisioning {
    /// Post creation, and tag creation by superusers, call
    /// [`ensure_blog`] first.
    #[default]
    Auto,
    /// A blog must exist before posts or tags can be created.
    Explicit,
}

/// Run `f` in an immediate transaction, committing only if it succeeds.
pub(crate) fn immediate<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Transaction) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

/// A required single-line field: non-blank and at most `max` characters.
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "This field may not be blank."));
    }
    bounded_text(field, value, max)
}

pub(crate) fn bounded_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::validation(
            field,
            format!("Ensure this field has no more than {max} characters."),
        ));
    }
    Ok(())
}

fn not_found(what: &str) -> Error {
    Error::NotFound(format!("{what} not found."))
}
