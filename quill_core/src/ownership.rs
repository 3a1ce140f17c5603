//! Ownership predicates.
//!
//! A resource is owned directly (`resource.user == actor`), through its
//! blog (`resource.blog.user == actor`), or, for aggregates of posts, by
//! owning at least one of the posts. Each entity declares which of these
//! shapes it has through [`Resource::kind`].

use crate::models::{Actor, Blog, Id, Post, Tag, User};

/// The ownership shape of a resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// Carries a direct reference to its owning user.
    DirectOwned { owner: Id },
    /// Belongs to a blog; owned by the blog's user.
    BlogOwned { blog_owner: Id },
    /// A group of posts; each entry is the owner of one post's blog.
    PostAggregate { post_owners: Vec<Id> },
    /// No owner reference at all. Only superusers may act on it.
    Unowned,
}

/// Something ownership can be decided for.
pub trait Resource {
    fn kind(&self) -> ResourceKind;
}

impl Resource for Blog {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DirectOwned {
            owner: self.user.id,
        }
    }
}

impl Resource for Post {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BlogOwned {
            blog_owner: self.owner_id,
        }
    }
}

impl Resource for Tag {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BlogOwned {
            blog_owner: self.owner_id,
        }
    }
}

impl Resource for User {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DirectOwned { owner: self.id }
    }
}

impl Resource for [Post] {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PostAggregate {
            post_owners: self.iter().map(|p| p.owner_id).collect(),
        }
    }
}

pub fn is_superuser(actor: &Actor) -> bool {
    actor.is_superuser
}

/// True if `actor` owns `resource` directly or through its blog.
pub fn is_owner<R: Resource + ?Sized>(actor: &Actor, resource: &R) -> bool {
    match resource.kind() {
        ResourceKind::DirectOwned { owner } => owner == actor.id,
        ResourceKind::BlogOwned { blog_owner } => blog_owner == actor.id,
        ResourceKind::PostAggregate { .. } | ResourceKind::Unowned => false,
    }
}

/// True if `resource` is a group of posts and `actor` owns at least one.
pub fn owns_any_associated_post<R: Resource + ?Sized>(actor: &Actor, resource: &R) -> bool {
    match resource.kind() {
        ResourceKind::PostAggregate { post_owners } => post_owners.contains(&actor.id),
        _ => false,
    }
}
