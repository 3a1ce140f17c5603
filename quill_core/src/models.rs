//! Entities persisted by the store and the inputs accepted by the
//! mutation handlers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Primary key type shared by every table.
pub type Id = i64;

/// Codenames of the permissions granted to every registered staff user.
pub const BASELINE_PERMISSIONS: [&str; 12] = [
    "view_blog",
    "change_blog",
    "add_blog",
    "delete_blog",
    "view_post",
    "add_post",
    "change_post",
    "delete_post",
    "view_tag",
    "add_tag",
    "change_tag",
    "delete_tag",
];

/// A registered account. The password hash is never loaded into this type.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: Option<String>,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub permissions: Vec<String>,
}

/// The authenticated identity performing an operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Actor {
    pub id: Id,
    pub username: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub permissions: BTreeSet<String>,
}
impl Actor {
    /// Superusers implicitly hold every permission.
    pub fn has_perm(&self, codename: &str) -> bool {
        self.is_superuser || self.permissions.contains(codename)
    }
}
impl From<User> for Actor {
    fn from(user: User) -> Self {
        Actor {
            id: user.id,
            username: user.username,
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
            permissions: user.permissions.into_iter().collect(),
        }
    }
}

/// Short reference to a user, embedded in the entities they own.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct UserRef {
    pub id: Id,
    pub username: String,
}

/// One user's publishing space.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Blog {
    pub id: Id,
    pub user: UserRef,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short reference to a tag, embedded in the posts it labels.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TagRef {
    pub id: Id,
    pub name: String,
}

/// A content item belonging to exactly one blog.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Post {
    pub id: Id,
    #[serde(rename = "blog")]
    pub blog_id: Id,
    /// User owning the post's blog.
    #[serde(skip)]
    pub owner_id: Id,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<TagRef>,
}

/// A label scoped to one blog.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Tag {
    pub id: Id,
    #[serde(rename = "blog")]
    pub blog_id: Id,
    /// User owning the tag's blog.
    #[serde(skip)]
    pub owner_id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ids of the associated posts, ascending.
    pub posts: Vec<Id>,
}

/// Input for explicit blog creation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewBlog {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial blog update. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BlogChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for post creation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Tags of the actor's blog to attach.
    #[serde(default)]
    pub tag_ids: Option<Vec<Id>>,
}

/// Partial post update. `tag_ids`, when present, replaces the tag set.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PostChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tag_ids: Option<Vec<Id>>,
}

/// Input for tag creation and assignment.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewTag {
    pub name: String,
    #[serde(default)]
    pub posts: Vec<Id>,
}

/// Partial tag update. `posts`, when present, replaces the post set.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TagChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub posts: Option<Vec<Id>>,
}

/// Input for registration.
#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}
