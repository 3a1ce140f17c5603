//! Test helpers: migrated databases and ready-made users, posts and tags.
//!
//! Everything here panics on failure, which is what a test wants.

use quill_core::handlers::{self, Provisioning};
use quill_core::models::{NewPost, NewTag, NewUser};
use quill_core::{Actor, ConnectionSpec, Id, Post, Store, Tag};
use rusqlite::Connection;
use tempfile::TempDir;

/// Password given to every user created by this crate.
pub const PASSWORD: &str = "correct horse battery";

/// Initialize logging once per test binary.
pub fn common_setup() {
    env_logger::try_init().ok();
}

/// A migrated in-memory sqlite connection.
pub fn sqlite_connection() -> Connection {
    common_setup();
    let mut conn = quill_core::db::connect(&ConnectionSpec::in_memory()).unwrap();
    let applied = quill_core::migrations::migrate(&mut conn).unwrap();
    log::debug!("applied {applied} migrations");
    conn
}

/// A migrated in-memory [`Store`].
pub fn setup_store() -> Store {
    common_setup();
    let store = Store::open_in_memory().unwrap();
    store.migrate().unwrap();
    store
}

/// A migrated [`Store`] backed by a file, for tests that need more than
/// one connection. The database lives as long as the returned directory.
pub fn file_store(pool_size: u32) -> (TempDir, Store) {
    common_setup();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quill.db");
    let spec = ConnectionSpec::new(path.to_string_lossy());
    let store = Store::open(spec, pool_size).unwrap();
    store.migrate().unwrap();
    (dir, store)
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        password: PASSWORD.to_string(),
    }
}

/// Register an ordinary user.
pub fn user(conn: &mut Connection, username: &str) -> Actor {
    handlers::register(conn, new_user(username)).unwrap().into()
}

pub fn superuser(conn: &mut Connection, username: &str) -> Actor {
    handlers::create_superuser(conn, new_user(username))
        .unwrap()
        .into()
}

pub fn new_post(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: format!("All about {title}."),
        image: None,
        tag_ids: None,
    }
}

/// Create a post, provisioning the author's blog if needed.
pub fn post(conn: &mut Connection, actor: &Actor, title: &str) -> Post {
    handlers::create_post(conn, actor, new_post(title), Provisioning::Auto).unwrap()
}

pub fn tag(conn: &mut Connection, actor: &Actor, name: &str, posts: &[Id]) -> Tag {
    let input = NewTag {
        name: name.to_string(),
        posts: posts.to_vec(),
    };
    handlers::create_tag(conn, actor, input, Provisioning::Auto).unwrap()
}
