//! Crawl orchestration.
//!
//! Two pools run concurrently: scraper tasks (one per index page, bounded
//! by a semaphore) feed thread batches into a bounded queue; supervised
//! consumers drain it into the store. The driver waits for every scraper,
//! only then raises the stop flag, and consumers keep draining until the
//! queue is empty with the flag observed. No ordering is guaranteed
//! between batches; the store's uniqueness constraints make any
//! interleaving or duplication safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::models::{PostBatch, ThreadRef};
use crate::repository::{run_migrations, ForumRepository, SqlitePool};
use crate::scrapers::{materialize_thread, walk_index, ResilientClient};
use crate::services::ingest::Consumer;
use crate::services::progress::{report_loop, ProgressTracker};
use crate::services::scoring::ToxicityScorer;
use crate::utils::{retry, RetryPolicy};

/// Options for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// First index page to process.
    pub start: u32,
    /// Last index page to process (inclusive).
    pub stop: u32,
    /// Freshness window in hours.
    pub freshness_hours: i64,
    /// Scraper task parallelism.
    pub scrapers: usize,
    /// Consumer count.
    pub consumers: usize,
    /// Render the progress line.
    pub show_progress: bool,
}

/// The sole re-crawl decision: visit a thread if it has never been seen,
/// or if it saw activity within the freshness window and may have accrued
/// new posts since the last visit.
pub fn should_visit(thread: &ThreadRef, already_seen: bool, freshness_hours: i64) -> bool {
    !already_seen || is_fresh_at(thread.last_update, Utc::now(), freshness_hours)
}

/// Whole-hours freshness comparison.
fn is_fresh_at(last_update: DateTime<Utc>, now: DateTime<Utc>, freshness_hours: i64) -> bool {
    let elapsed = (now - last_update).num_seconds();
    elapsed.div_euclid(3600) <= freshness_hours
}

/// URL of the n-th index page; page 1 is the forum root itself.
pub fn index_page_url(base_url: &str, page: u32) -> String {
    if page == 1 {
        base_url.to_string()
    } else {
        format!("{base_url}page/{page}")
    }
}

/// Page number encoded in an index URL's trailing segment, if any.
fn index_page_number(index_url: &str) -> Option<u64> {
    let segment = index_url.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Run a full crawl over the given index-page range: process every page,
/// then drain the queue, then return.
pub async fn run_crawl(
    settings: &Settings,
    opts: &CrawlOptions,
    scorer: Arc<dyn ToxicityScorer>,
) -> anyhow::Result<()> {
    anyhow::ensure!(opts.start >= 1, "index pages start at 1");
    anyhow::ensure!(opts.stop >= opts.start, "empty index page range");

    let db_url = settings.database_path.display().to_string();
    run_migrations(&db_url).await?;

    let planned_pages = (opts.stop - opts.start + 1) as u64;
    let tracker = Arc::new(ProgressTracker::new(planned_pages));
    let scraping_done = Arc::new(AtomicBool::new(false));
    let all_done = Arc::new(AtomicBool::new(false));
    let client = Arc::new(ResilientClient::new(&settings.socks_proxy));

    let (tx, rx) = mpsc::channel::<PostBatch>(settings.queue_capacity);
    let queue = Arc::new(Mutex::new(rx));

    // Interrupts during the wait phases are swallowed; in-flight tasks
    // are never aborted mid-write.
    tokio::spawn(async {
        loop {
            match tokio::signal::ctrl_c().await {
                Ok(()) => warn!("interrupt ignored; crawl runs until the queue drains"),
                Err(err) => {
                    debug!("no interrupt handler available: {err}");
                    return;
                }
            }
        }
    });

    let reporter = opts
        .show_progress
        .then(|| tokio::spawn(report_loop(tracker.clone(), all_done.clone())));

    info!(
        "crawling index pages {}..={} with {} scrapers, {} consumers",
        opts.start, opts.stop, opts.scrapers, opts.consumers
    );

    let mut consumer_handles = Vec::with_capacity(opts.consumers);
    for id in 0..opts.consumers {
        let consumer = Consumer {
            id,
            repo: ForumRepository::new(SqlitePool::new(&db_url)),
            client: client.clone(),
            scorer: scorer.clone(),
            tracker: tracker.clone(),
            queue: queue.clone(),
            stop: scraping_done.clone(),
            skip_topics: settings.skip_topics.clone(),
        };
        consumer_handles.push(tokio::spawn(consumer.supervise()));
    }

    let semaphore = Arc::new(Semaphore::new(opts.scrapers.max(1)));
    let mut scraper_handles = Vec::with_capacity(planned_pages as usize);
    for page in opts.start..=opts.stop {
        let task = ScraperTask {
            client: client.clone(),
            repo: ForumRepository::new(SqlitePool::new(&db_url)),
            tx: tx.clone(),
            tracker: tracker.clone(),
            base_url: settings.base_url.clone(),
            freshness_hours: opts.freshness_hours,
        };
        let index_url = index_page_url(&settings.base_url, page);
        let semaphore = semaphore.clone();

        scraper_handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("scraper semaphore closed");
            scrape_index_page(&task, &index_url).await
        }));
    }
    drop(tx);

    for result in futures::future::join_all(scraper_handles).await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("index scraper failed: {err:#}"),
            Err(err) => error!("index scraper panicked: {err}"),
        }
    }
    info!("index scrapers finished");
    scraping_done.store(true, Ordering::SeqCst);

    for handle in consumer_handles {
        if let Err(err) = handle.await {
            error!("consumer panicked: {err}");
        }
    }
    info!("consumers finished");

    all_done.store(true, Ordering::SeqCst);
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }

    Ok(())
}

struct ScraperTask {
    client: Arc<ResilientClient>,
    repo: ForumRepository,
    tx: mpsc::Sender<PostBatch>,
    tracker: Arc<ProgressTracker>,
    base_url: String,
    freshness_hours: i64,
}

/// Process one index page: list its threads, materialize the ones worth
/// visiting, enqueue their batches. Retried as a whole; duplicate
/// enqueues from a mid-page retry are harmless because persistence is
/// idempotent.
async fn scrape_index_page(task: &ScraperTask, index_url: &str) -> anyhow::Result<()> {
    retry(&RetryPolicy::INDEX_TASK, || scrape_once(task, index_url)).await?;
    task.tracker.complete_one();
    Ok(())
}

async fn scrape_once(task: &ScraperTask, index_url: &str) -> anyhow::Result<()> {
    for thread in walk_index(&task.client, index_url).await? {
        let seen = task.repo.contains_url(&thread.link).await?;
        if !should_visit(&thread, seen, task.freshness_hours) {
            debug!("skipping {}", thread.link);
            continue;
        }

        let batch = materialize_thread(&task.client, &task.base_url, &thread.link).await?;
        debug!("thread {} produced {} posts", thread.link, batch.len());

        if task.tx.send(batch).await.is_err() {
            anyhow::bail!("ingest queue closed while scraping {index_url}");
        }

        if let Some(page) = index_page_number(index_url) {
            task.tracker.record_page(page);
        }
        task.tracker.add_total(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn thread_updated(hours_ago: i64) -> ThreadRef {
        ThreadRef {
            link: "https://forum.test/topic/example".to_string(),
            last_update: Utc::now() - Duration::hours(hours_ago),
            page_count: 1,
        }
    }

    #[test]
    fn test_never_seen_thread_is_always_visited() {
        assert!(should_visit(&thread_updated(24 * 365), false, 84));
    }

    #[test]
    fn test_seen_thread_within_window_is_revisited() {
        assert!(should_visit(&thread_updated(2), true, 84));
    }

    #[test]
    fn test_seen_thread_outside_window_is_skipped() {
        assert!(!should_visit(&thread_updated(85), true, 84));
    }

    #[test]
    fn test_freshness_compares_whole_hours() {
        let now = Utc::now();
        // 84h59m elapsed is still 84 whole hours
        let last = now - Duration::hours(84) - Duration::minutes(59);
        assert!(is_fresh_at(last, now, 84));
        let last = now - Duration::hours(85);
        assert!(!is_fresh_at(last, now, 84));
    }

    #[test]
    fn test_future_timestamps_count_as_fresh() {
        assert!(is_fresh_at(Utc::now() + Duration::hours(1), Utc::now(), 84));
    }

    #[test]
    fn test_index_page_url() {
        assert_eq!(index_page_url("https://forum.test/", 1), "https://forum.test/");
        assert_eq!(
            index_page_url("https://forum.test/", 7),
            "https://forum.test/page/7"
        );
    }

    #[test]
    fn test_index_page_number() {
        assert_eq!(index_page_number("https://forum.test/page/15"), Some(15));
        assert_eq!(index_page_number("https://forum.test/"), None);
    }
}
