//! Core of the Quill blogging backend: the entity store, the ownership
//! rules deciding who may see and change what, and the handlers that
//! apply mutations.
//!
//! Everything in this crate is synchronous and works on a
//! [`rusqlite::Connection`]. The `quill` crate wraps it in REST and
//! GraphQL adapters.

use thiserror::Error as ThisError;

pub mod db;
pub mod handlers;
pub mod migrations;
pub mod models;
pub mod ownership;
pub mod policy;

pub use db::{ConnectionSpec, Store};
pub use models::{Actor, Blog, Id, Post, Tag, TagRef, User};
pub use ownership::{Resource, ResourceKind};
pub use policy::{Policy, Scope};

/// Result type that uses [`crate::Error`].
pub type Result<T> = std::result::Result<T, crate::Error>;

/// Quill errors.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Authentication credentials were not provided or are invalid.")]
    AuthenticationRequired,
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0}")]
    Conflict(String),
    #[error("Migration error {0}")]
    MigrationError(String),
    #[error("Password hashing error {0}")]
    PasswordHash(String),
    #[error("Internal logic error {0}")]
    Internal(String),
    #[error("(De)serialization error {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),
    #[error("Sqlite error {0}")]
    SQLite(#[from] rusqlite::Error),
    #[error("Connection pool error {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Tokio join error {0}")]
    TokioJoin(#[from] tokio::task::JoinError),
}

/// Broad classes of [`Error`], used by the adapters to choose a status
/// code or decide whether a failure belongs in a mutation payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// No identity, or one that could not be verified.
    AuthenticationRequired,
    /// A valid identity without the ownership or privilege needed.
    PermissionDenied,
    /// The identifier does not resolve.
    NotFound,
    /// A field failed validation.
    Validation,
    /// Duplicate blog, duplicate tag name, or posts that are not owned.
    Conflict,
    /// Anything else. Not expected during normal operation.
    Internal,
}

impl Error {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// The class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AuthenticationRequired => ErrorKind::AuthenticationRequired,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Conflict(_) => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether this is an expected business failure rather than a fault.
    pub fn is_business(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }

    /// True if this error is a violation of a `UNIQUE` constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::SQLite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            }
            _ => false,
        }
    }
}
