//! Forum entity repository.
//!
//! Every write is idempotent: get-or-create resolves a natural key to a
//! surrogate id with an ignore-on-conflict insert followed by a select, so
//! repeated calls with the same key (including same-key races between
//! writers) always converge on one row. Each operation runs behind the
//! store retry schedule to ride out lock contention on the shared file.

use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use super::diesel_models::{NewAuthor, NewPost, NewTopic, NewTopicUrl, PostRecord};
use super::pool::{DbError, SqlitePool};
use super::parse_datetime;
use crate::models::ToxicityScores;
use crate::schema::{authors, posts, topic_urls, topics};
use crate::utils::{retry, RetryPolicy};

/// Row counts per table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreCounts {
    pub authors: i64,
    pub topics: i64,
    pub topic_urls: i64,
    pub posts: i64,
}

/// A post joined with its topic, url and author handles.
#[derive(Debug, Clone, Serialize)]
pub struct PostExport {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub topic_url: String,
    pub topic_title: String,
    pub topic_author: String,
    pub post_author: String,
    pub scores: ToxicityScores,
}

/// Repository over the four forum tables.
#[derive(Clone)]
pub struct ForumRepository {
    pool: SqlitePool,
}

impl ForumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve an author handle to its id, creating the row on first
    /// sight.
    pub async fn get_or_create_author(&self, handle: &str) -> Result<i32, DbError> {
        retry(&RetryPolicy::STORE, || self.author_once(handle)).await
    }

    async fn author_once(&self, handle: &str) -> Result<i32, DbError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_or_ignore_into(authors::table)
            .values(NewAuthor { handle })
            .execute(&mut conn)
            .await?;

        authors::table
            .filter(authors::handle.eq(handle))
            .select(authors::id)
            .first(&mut conn)
            .await
    }

    /// Resolve a (title, opening author) pair to a topic id, creating the
    /// row on first sight.
    pub async fn get_or_create_topic(&self, title: &str, author_id: i32) -> Result<i32, DbError> {
        retry(&RetryPolicy::STORE, || self.topic_once(title, author_id)).await
    }

    async fn topic_once(&self, title: &str, author_id: i32) -> Result<i32, DbError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_or_ignore_into(topics::table)
            .values(NewTopic { title, author_id })
            .execute(&mut conn)
            .await?;

        topics::table
            .filter(topics::title.eq(title))
            .filter(topics::author_id.eq(author_id))
            .select(topics::id)
            .first(&mut conn)
            .await
    }

    /// Resolve a page link to a topic-url id, creating the row on first
    /// sight.
    pub async fn get_or_create_topic_url(
        &self,
        link: &str,
        author_id: i32,
        topic_id: i32,
    ) -> Result<i32, DbError> {
        retry(&RetryPolicy::STORE, || {
            self.topic_url_once(link, author_id, topic_id)
        })
        .await
    }

    async fn topic_url_once(
        &self,
        link: &str,
        author_id: i32,
        topic_id: i32,
    ) -> Result<i32, DbError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_or_ignore_into(topic_urls::table)
            .values(NewTopicUrl {
                link,
                author_id,
                topic_id,
            })
            .execute(&mut conn)
            .await?;

        topic_urls::table
            .filter(topic_urls::link.eq(link))
            .filter(topic_urls::author_id.eq(author_id))
            .filter(topic_urls::topic_id.eq(topic_id))
            .select(topic_urls::id)
            .first(&mut conn)
            .await
    }

    /// Insert a post, idempotent on its (content, author, topic, url)
    /// identity.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_post(
        &self,
        content: &str,
        author_id: i32,
        topic_id: i32,
        topic_url_id: i32,
        created_at: DateTime<Utc>,
        scores: &ToxicityScores,
    ) -> Result<i32, DbError> {
        let created_at = created_at.to_rfc3339();
        retry(&RetryPolicy::STORE, || {
            self.post_once(
                content,
                author_id,
                topic_id,
                topic_url_id,
                &created_at,
                scores,
            )
        })
        .await
    }

    async fn post_once(
        &self,
        content: &str,
        author_id: i32,
        topic_id: i32,
        topic_url_id: i32,
        created_at: &str,
        scores: &ToxicityScores,
    ) -> Result<i32, DbError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_or_ignore_into(posts::table)
            .values(NewPost {
                content,
                author_id,
                topic_id,
                topic_url_id,
                created_at,
                toxicity: scores.toxicity,
                severe_toxicity: scores.severe_toxicity,
                obscene: scores.obscene,
                identity_attack: scores.identity_attack,
                insult: scores.insult,
                threat: scores.threat,
                sexual_explicit: scores.sexual_explicit,
            })
            .execute(&mut conn)
            .await?;

        posts::table
            .filter(posts::content.eq(content))
            .filter(posts::author_id.eq(author_id))
            .filter(posts::topic_id.eq(topic_id))
            .filter(posts::topic_url_id.eq(topic_url_id))
            .select(posts::id)
            .first(&mut conn)
            .await
    }

    /// Whether a page link has been persisted before.
    pub async fn contains_url(&self, link: &str) -> Result<bool, DbError> {
        retry(&RetryPolicy::STORE, || self.contains_url_once(link)).await
    }

    async fn contains_url_once(&self, link: &str) -> Result<bool, DbError> {
        let mut conn = self.pool.get().await?;
        let count: i64 = topic_urls::table
            .filter(topic_urls::link.eq(link))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count > 0)
    }

    /// Total persisted posts.
    pub async fn count_posts(&self) -> Result<i64, DbError> {
        retry(&RetryPolicy::STORE, || self.count_posts_once()).await
    }

    async fn count_posts_once(&self) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;
        posts::table.select(count_star()).first(&mut conn).await
    }

    /// Row counts for all four tables.
    pub async fn table_counts(&self) -> Result<StoreCounts, DbError> {
        let mut conn = self.pool.get().await?;

        let authors: i64 = authors::table.select(count_star()).first(&mut conn).await?;
        let topics: i64 = topics::table.select(count_star()).first(&mut conn).await?;
        let topic_urls: i64 = topic_urls::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        let posts: i64 = posts::table.select(count_star()).first(&mut conn).await?;

        Ok(StoreCounts {
            authors,
            topics,
            topic_urls,
            posts,
        })
    }

    /// Read every post back joined with its topic, url and author
    /// handles.
    pub async fn export_posts(&self) -> Result<Vec<PostExport>, DbError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<PostRecord> = posts::table.load(&mut conn).await?;
        let mut exports = Vec::with_capacity(records.len());

        for record in records {
            let (link, topic_author_id, topic_id): (String, i32, i32) = topic_urls::table
                .find(record.topic_url_id)
                .select((
                    topic_urls::link,
                    topic_urls::author_id,
                    topic_urls::topic_id,
                ))
                .first(&mut conn)
                .await?;

            let topic_title: String = topics::table
                .find(topic_id)
                .select(topics::title)
                .first(&mut conn)
                .await?;

            let topic_author: String = authors::table
                .find(topic_author_id)
                .select(authors::handle)
                .first(&mut conn)
                .await?;

            let post_author: String = authors::table
                .find(record.author_id)
                .select(authors::handle)
                .first(&mut conn)
                .await?;

            exports.push(PostExport {
                content: record.content,
                created_at: parse_datetime(&record.created_at),
                topic_url: link,
                topic_title,
                topic_author,
                post_author,
                scores: ToxicityScores {
                    toxicity: record.toxicity,
                    severe_toxicity: record.severe_toxicity,
                    obscene: record.obscene,
                    identity_attack: record.identity_attack,
                    insult: record.insult,
                    threat: record.threat,
                    sexual_explicit: record.sexual_explicit,
                },
            });
        }

        Ok(exports)
    }
}
