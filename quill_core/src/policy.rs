//! Authorization policies.
//!
//! A policy is a pair of checks: a coarse one deciding whether the
//! caller may attempt an operation at all, and a fine one deciding
//! whether an actor may act on a particular resource. Object checks deny
//! with [`Error::PermissionDenied`]; list operations never deny and are
//! narrowed with a [`Scope`] instead.

use crate::models::{Actor, Id};
use crate::ownership::{is_owner, is_superuser, owns_any_associated_post, Resource, ResourceKind};
use crate::{Error, Result};

pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

/// The three object-level policies used by the adapters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Policy {
    /// Superusers, or the direct owner. Applied to blogs.
    OwnerOrAdmin,
    /// Superusers, or the owner of the resource's blog, or of any of the
    /// posts it groups. Applied to posts and tags.
    BlogOwnerOrAdmin,
    /// Same object outcome as [`Policy::OwnerOrAdmin`]. Applied to the
    /// read-only user profile endpoints.
    AuthenticatedOrReadOnlyOwner,
}

impl Policy {
    /// Coarse check: an authenticated identity is required.
    pub fn has_permission(self, identity: Option<&Actor>) -> Result<&Actor> {
        identity.ok_or(Error::AuthenticationRequired)
    }

    /// Fine check for one resource.
    pub fn has_object_permission<R: Resource + ?Sized>(self, actor: &Actor, resource: &R) -> bool {
        if is_superuser(actor) {
            return true;
        }
        match self {
            Policy::OwnerOrAdmin | Policy::AuthenticatedOrReadOnlyOwner => is_owner(actor, resource),
            Policy::BlogOwnerOrAdmin => match resource.kind() {
                ResourceKind::BlogOwned { .. } => is_owner(actor, resource),
                ResourceKind::PostAggregate { .. } => owns_any_associated_post(actor, resource),
                ResourceKind::DirectOwned { .. } | ResourceKind::Unowned => false,
            },
        }
    }

    /// Like [`Policy::has_object_permission`], but denial is an error.
    pub fn check<R: Resource + ?Sized>(self, actor: &Actor, resource: &R) -> Result<()> {
        if self.has_object_permission(actor, resource) {
            Ok(())
        } else {
            log::debug!("{self:?} denied {} ({})", actor.username, actor.id);
            Err(Error::PermissionDenied(PERMISSION_DENIED.to_string()))
        }
    }
}

/// The subset of rows an actor may list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// Every row. Superusers only.
    All,
    /// Rows transitively owned by this user.
    OwnedBy(Id),
}

impl Scope {
    pub fn for_actor(actor: &Actor) -> Scope {
        if is_superuser(actor) {
            Scope::All
        } else {
            Scope::OwnedBy(actor.id)
        }
    }

    /// The owner to filter on, or `None` for no filter.
    pub fn owner(self) -> Option<Id> {
        match self {
            Scope::All => None,
            Scope::OwnedBy(id) => Some(id),
        }
    }
}
