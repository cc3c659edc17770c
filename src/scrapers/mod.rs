//! Forum scraping: resilient fetching, index walking, thread
//! materialization and the markup queries they share.

pub mod extract;
pub mod http_client;
pub mod index;
pub mod thread;
pub mod timeparse;

pub use http_client::{FetchError, FetchResponse, ResilientClient};
pub use index::walk_index;
pub use thread::{fetch_topic_title, materialize_thread};

use thiserror::Error;

/// Errors surfaced by scrape operations. Transient network failures are
/// absorbed by the transport chain and the per-operation retries; whatever
/// reaches a caller has already exhausted those.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The page was fetched but did not contain the markup we rely on.
    #[error("expected markup not found: {0}")]
    Markup(String),

    /// A relative-time label did not match the site's "<n> <unit> ago"
    /// convention.
    #[error("unparseable relative-time label: {0:?}")]
    RelativeTime(String),
}
