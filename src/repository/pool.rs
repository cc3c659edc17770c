//! Async SQLite connections via diesel-async's SyncConnectionWrapper.
//!
//! SQLite connections are lightweight and file-backed, so connections are
//! created per request rather than pooled; the wrapper runs blocking work
//! on the runtime's blocking pool. Every writer task holds its own
//! `SqlitePool`, giving it its own connections to the shared file.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::util::to_db_error;

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// SQLite connection factory.
#[derive(Clone)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    /// Create a new pool for a database URL.
    pub fn new(database_url: &str) -> Self {
        // Strip sqlite: prefix if present
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Create a pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Get a connection with foreign-key enforcement enabled.
    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_db_error)?;

        diesel::sql_query("PRAGMA foreign_keys = ON")
            .execute(&mut conn)
            .await?;

        Ok(conn)
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
