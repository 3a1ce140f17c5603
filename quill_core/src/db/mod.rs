//! SQLite storage: connection setup, pooling and the queries behind
//! each entity.
use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{migrations, Result};

pub mod blogs;
pub mod posts;
pub mod tags;
pub mod users;

mod r2;
pub use r2::ConnectionManager;

/// Connection string for a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection info. Can be serialized to and from JSON.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConnectionSpec {
    pub conn_str: String,
}
impl ConnectionSpec {
    pub fn new(conn_str: impl Into<String>) -> Self {
        ConnectionSpec {
            conn_str: conn_str.into(),
        }
    }
    pub fn in_memory() -> Self {
        ConnectionSpec::new(MEMORY)
    }
    pub fn is_memory(&self) -> bool {
        self.conn_str == MEMORY
    }
    /// Save the connection spec to the filesystem for later use.
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = conn_complete_if_dir(path);
        let mut f = fs::File::create(path)?;
        f.write_all(serde_json::to_string(self)?.as_bytes())
            .map_err(|e| e.into())
    }
    /// Load a previously saved connection spec
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = conn_complete_if_dir(path.as_ref());
        serde_json::from_reader(fs::File::open(path)?).map_err(|e| e.into())
    }
}

fn conn_complete_if_dir(path: &Path) -> Cow<'_, Path> {
    if path.is_dir() {
        Cow::from(path.join("connection.json"))
    } else {
        Cow::from(path)
    }
}

/// Open a single connection with foreign keys enforced.
pub fn connect(spec: &ConnectionSpec) -> Result<Connection> {
    let conn = Connection::open(&spec.conn_str)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    if !spec.is_memory() {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("opened {} in journal mode {mode}", spec.conn_str);
    }
    Ok(conn)
}

/// A connection checked out of the [`Store`] pool.
pub type PooledConnection = r2d2::PooledConnection<ConnectionManager>;

/// Pool of connections to one database.
#[derive(Clone, Debug)]
pub struct Store {
    pool: r2d2::Pool<ConnectionManager>,
}
impl Store {
    /// Open a pool of at most `pool_size` connections.
    ///
    /// An in-memory database lives only as long as its connection, so for
    /// [`MEMORY`] the pool holds exactly one connection that is never
    /// recycled.
    pub fn open(spec: ConnectionSpec, pool_size: u32) -> Result<Self> {
        let memory = spec.is_memory();
        let builder = r2d2::Pool::builder();
        let builder = if memory {
            builder.max_size(1).idle_timeout(None).max_lifetime(None)
        } else {
            builder.max_size(pool_size.max(1))
        };
        let pool = builder.build(ConnectionManager::new(spec))?;
        Ok(Store { pool })
    }

    /// A fresh, unmigrated in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Store::open(ConnectionSpec::in_memory(), 1)
    }

    /// Check a connection out of the pool.
    pub fn get(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Apply every migration not yet applied. Returns how many ran.
    pub fn migrate(&self) -> Result<usize> {
        let mut conn = self.get()?;
        migrations::migrate(&mut conn)
    }

    /// Run blocking database work off the async executor.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = store.get()?;
            f(&mut *conn)
        })
        .await?
    }
}

/// `?, ?, ?` with `n` placeholders, for `IN` lists.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
