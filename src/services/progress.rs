//! Shared crawl progress state and its reporting loop.
//!
//! Every worker writes to one [`ProgressTracker`]; a single reporting task
//! reads it on a fixed cadence. Observational only - nothing here gates
//! correctness.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::RwLock;

/// How often the reporting loop re-renders.
const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Shared counters: planned/completed work units, pages-scraped
/// high-water mark, and a short human-readable activity label.
pub struct ProgressTracker {
    total: AtomicU64,
    completed: AtomicU64,
    pages_scraped: AtomicU64,
    activity: RwLock<String>,
}

impl ProgressTracker {
    /// Start tracking with the planned number of index pages as the
    /// initial work-unit total.
    pub fn new(planned_units: u64) -> Self {
        Self {
            total: AtomicU64::new(planned_units),
            completed: AtomicU64::new(0),
            pages_scraped: AtomicU64::new(0),
            activity: RwLock::new("Waiting for scraped data...".to_string()),
        }
    }

    /// Grow the work-unit total (new thread discovered, batch accepted).
    pub fn add_total(&self, units: u64) {
        self.total.fetch_add(units, Ordering::Relaxed);
    }

    /// Mark one work unit complete.
    pub fn complete_one(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Raise the pages-scraped high-water mark.
    pub fn record_page(&self, page: u64) {
        self.pages_scraped.fetch_max(page, Ordering::Relaxed);
    }

    /// Replace the current-activity label.
    pub async fn set_activity(&self, text: String) {
        *self.activity.write().await = text;
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn pages_scraped(&self) -> u64 {
        self.pages_scraped.load(Ordering::Relaxed)
    }

    /// Completion percentage, one decimal.
    pub fn percent_complete(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let raw = self.completed() as f64 / total as f64 * 100.0;
        (raw * 10.0).round() / 10.0
    }

    /// One-line status render.
    pub async fn status_line(&self) -> String {
        let percent = format!("{:.1}%", self.percent_complete());
        let activity = self.activity.read().await.clone();
        format!(
            "Progress: {percent:<7} Pages Scraped: {pages:<6} {activity}",
            pages = self.pages_scraped()
        )
    }
}

/// Poll the tracker every half second and render its status until `done`
/// is raised.
pub async fn report_loop(tracker: Arc<ProgressTracker>, done: Arc<AtomicBool>) {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }

    while !done.load(Ordering::SeqCst) {
        bar.set_message(tracker.status_line().await);
        bar.tick();
        tokio::time::sleep(REPORT_INTERVAL).await;
    }

    bar.finish_with_message(tracker.status_line().await);
}
