//! Repository layer for database persistence.
//!
//! All database access uses Diesel with an async wrapper around SQLite
//! connections. Correctness under concurrent writers rests on the schema's
//! uniqueness constraints plus bounded write retries, never on
//! application-side locking.

pub mod diesel_models;
pub mod forum;
pub mod migrations;
pub mod pool;
pub mod util;

pub use forum::{ForumRepository, PostExport, StoreCounts};
pub use migrations::run_migrations;
pub use pool::{DbError, SqlitePool};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on
/// error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
