//! Thread references discovered on the forum index.

use chrono::{DateTime, Utc};

/// One row of the index listing: a discussion thread, when it last saw
/// activity, and how many pages the listing advertises for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRef {
    /// Canonical thread URL.
    pub link: String,
    /// Last-activity time, parsed from the listing's relative-time label.
    pub last_update: DateTime<Utc>,
    /// Highest page number advertised in the row's pagination control.
    pub page_count: u32,
}
