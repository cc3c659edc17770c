//! Index walking: one listing page → thread references.

use tracing::debug;

use super::{extract, ResilientClient, ScrapeError};
use crate::models::ThreadRef;
use crate::utils::{retry, RetryPolicy};

/// Fetch one index page and return the threads it lists, newest activity
/// labels already resolved to absolute timestamps. Retried as a whole: a
/// failure anywhere (fetch or markup) re-fetches the page.
pub async fn walk_index(
    client: &ResilientClient,
    index_url: &str,
) -> Result<Vec<ThreadRef>, ScrapeError> {
    retry(&RetryPolicy::SCRAPE_OP, || walk_once(client, index_url)).await
}

async fn walk_once(
    client: &ResilientClient,
    index_url: &str,
) -> Result<Vec<ThreadRef>, ScrapeError> {
    let page = client.fetch(index_url).await?;
    let refs = extract::thread_rows(&page.body)?;
    debug!("{} threads listed on {index_url}", refs.len());
    Ok(refs)
}
