//! Database layer for the reporting replica.

pub mod schema;
pub mod source;

use crate::error::{AnalyticsError, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub use schema::{ColumnInfo, FolderShape, SchemaCapabilities, SchemaReport, TableReport, WorkItemShape};
pub use source::{DataSource, SqliteSource};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open an existing replica without write access.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA busy_timeout=5000;")?;
        Ok(Self::from_connection(conn))
    }

    /// Create (or upgrade) a replica with the reporting schema.
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self::from_connection(conn);
        db.run_migrations()?;
        info!("Reporting schema is up to date");
        Ok(db)
    }

    /// Open an in-memory database with the reporting schema (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?);
        db.run_migrations()?;
        Ok(db)
    }

    /// Wrap a connection as-is, without running migrations.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| AnalyticsError::LockPoisoned)?;
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| AnalyticsError::LockPoisoned)?;
        f(&conn)
    }
}
