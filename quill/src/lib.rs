//! Quill is a multi-tenant blogging backend. Every user owns at most one
//! blog of posts and tags; ordinary users only ever see their own
//! content while superusers see everything.
//!
//! This crate exposes [`quill_core`] over two transports that share the
//! same ownership rules and mutation handlers:
//!
//! * a REST API under `/api` (see [`rest`]),
//! * a GraphQL schema at `/graphql` (see [`graphql`]).
//!
//! Both authenticate callers with bearer tokens issued by
//! [`auth::TokenService`].

use thiserror::Error as ThisError;

pub mod auth;
pub mod config;
pub mod graphql;
pub mod rest;
pub mod server;
pub mod state;

pub use config::Config;
pub use quill_core::{Actor, Error, Result};
pub use server::{router, serve};
pub use state::AppState;

/// Failures while configuring or starting the server.
#[derive(Debug, ThisError)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Core(#[from] quill_core::Error),
}
