//! R2D2 support for the SQLite store.

use r2d2::ManageConnection;
use rusqlite::Connection;

use super::ConnectionSpec;
use crate::Result;

/// Implements [`r2d2::ManageConnection`] for plain [`rusqlite`] connections.
#[derive(Clone, Debug)]
pub struct ConnectionManager {
    spec: ConnectionSpec,
}
impl ConnectionManager {
    pub fn new(spec: ConnectionSpec) -> Self {
        ConnectionManager { spec }
    }
}

impl ManageConnection for ConnectionManager {
    type Connection = Connection;
    type Error = crate::Error;

    fn connect(&self) -> Result<Self::Connection> {
        super::connect(&self.spec)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<()> {
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| e.into())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
