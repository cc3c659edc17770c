//! Store-writer consumers.
//!
//! Consumers pull thread batches off the bounded queue with a short poll
//! so they can recheck the stop flag, and persist each batch through the
//! repository's idempotent get-or-create operations. A consumer whose
//! loop fails persistently (store unreachable, scorer down) is relaunched
//! by its supervisor with the same arguments - the pool never shrinks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use crate::models::PostBatch;
use crate::repository::ForumRepository;
use crate::scrapers::{fetch_topic_title, ResilientClient};
use crate::services::progress::ProgressTracker;
use crate::services::scoring::{measure_post, ToxicityScorer};
use crate::utils::shorten;

/// How long a consumer waits on the queue before rechecking the stop
/// flag.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// One store-writer worker. Each consumer owns its own connection factory
/// to the shared database file.
pub struct Consumer {
    pub id: usize,
    pub repo: ForumRepository,
    pub client: Arc<ResilientClient>,
    pub scorer: Arc<dyn ToxicityScorer>,
    pub tracker: Arc<ProgressTracker>,
    pub queue: Arc<Mutex<mpsc::Receiver<PostBatch>>>,
    pub stop: Arc<AtomicBool>,
    pub skip_topics: Vec<String>,
}

impl Consumer {
    /// Run under supervision: on internal failure the loop is relaunched
    /// fresh rather than terminating the worker.
    pub async fn supervise(self) {
        loop {
            match self.run_loop().await {
                Ok(()) => {
                    debug!("consumer {} finished", self.id);
                    return;
                }
                Err(err) => {
                    error!("consumer {} failed: {err:#}; restarting", self.id);
                }
            }
        }
    }

    async fn run_loop(&self) -> anyhow::Result<()> {
        loop {
            let received = {
                let mut queue = self.queue.lock().await;
                tokio::time::timeout(POLL_TIMEOUT, queue.recv()).await
            };

            match received {
                Ok(Some(batch)) => self.ingest_batch(batch).await?,
                // Every producer is gone and the queue is drained.
                Ok(None) => return Ok(()),
                Err(_timeout) => {
                    if self.stop.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Persist one thread's batch. An empty batch still counts toward
    /// completion, as does a skip-listed thread.
    async fn ingest_batch(&self, batch: PostBatch) -> anyhow::Result<()> {
        let Some(first) = batch.first() else {
            self.tracker.complete_one();
            return Ok(());
        };

        let first_url = first.url.trim().to_string();
        if self
            .skip_topics
            .iter()
            .any(|skip| first_url.contains(skip.as_str()))
        {
            debug!("skip-listed thread {first_url}");
            self.tracker.complete_one();
            return Ok(());
        }

        let title = fetch_topic_title(&self.client, &first_url).await?;
        self.tracker.add_total(batch.len() as u64);

        // Topic identity is (title, thread opener); each post still keeps
        // its own author.
        let topic_author_id = self
            .repo
            .get_or_create_author(first.author.trim())
            .await?;

        for post in &batch {
            let author = post.author.trim();
            let content = post.content.trim();

            let scores = measure_post(self.scorer.as_ref(), content).await?;
            let author_id = self.repo.get_or_create_author(author).await?;
            let topic_id = self
                .repo
                .get_or_create_topic(&title, topic_author_id)
                .await?;
            let topic_url_id = self
                .repo
                .get_or_create_topic_url(post.url.trim(), topic_author_id, topic_id)
                .await?;
            self.repo
                .insert_post(content, author_id, topic_id, topic_url_id, post.created_at, &scores)
                .await?;

            let total_posts = self.repo.count_posts().await?;
            let preview = shorten(content, 40);
            self.tracker
                .set_activity(format!(
                    "Total Posts: {total_posts:<7} Topic: {topic_id:<7} Author: {author:<4} [{author_id:<5}] Post: {preview:<40}"
                ))
                .await;
            self.tracker.complete_one();
        }

        self.tracker.complete_one();
        Ok(())
    }
}
