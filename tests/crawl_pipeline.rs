//! Pipeline integration tests.
//!
//! Runs the full crawl against a fake forum served by wiremock and checks
//! what lands in the store, plus the idempotency guarantees the pipeline
//! leans on.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rumormill::config::Settings;
use rumormill::models::ToxicityScores;
use rumormill::repository::{run_migrations, ForumRepository, SqlitePool};
use rumormill::services::{run_crawl, CrawlOptions, ToxicityScorer};

struct FixedScorer(ToxicityScores);

#[async_trait]
impl ToxicityScorer for FixedScorer {
    async fn score(&self, _text: &str) -> anyhow::Result<ToxicityScores> {
        Ok(self.0)
    }
}

fn flat_scores(value: f64) -> ToxicityScores {
    ToxicityScores {
        toxicity: value,
        severe_toxicity: value,
        obscene: value,
        identity_attack: value,
        insult: value,
        threat: value,
        sexual_explicit: value,
    }
}

fn index_page(thread_url: &str) -> String {
    format!(
        r##"<html><body>
        <table id="latest"><tbody>
        <tr>
            <td><a href="{thread_url}">A thread</a></td>
            <td class="num l"><a href="#">1 minute ago #2</a></td>
        </tr>
        </tbody></table>
        </body></html>"##
    )
}

fn thread_page(title: &str) -> String {
    format!(
        r#"<html><body>
        <h2 class="topictitle">{title}</h2>
        <div class="author">
            <div class="threadauthor"><small>EA12</small></div>
            <div class="threadpost">
                <div class="post">Economist sighting at the airport</div>
                <div class="poststuff">5 minutes ago #1</div>
            </div>
        </div>
        <div class="author">
            <div class="threadauthor"><small>9bc4</small></div>
            <div class="threadpost">
                <div class="post">This thread is nonsense</div>
                <div class="poststuff">2 minutes ago #2</div>
            </div>
        </div>
        </body></html>"#
    )
}

fn test_settings(server_uri: &str, db_path: PathBuf) -> Settings {
    Settings {
        base_url: format!("{server_uri}/"),
        database_path: db_path,
        queue_capacity: 16,
        ..Settings::default()
    }
}

fn crawl_opts() -> CrawlOptions {
    CrawlOptions {
        start: 1,
        stop: 1,
        freshness_hours: 84,
        scrapers: 1,
        consumers: 1,
        show_progress: false,
    }
}

#[tokio::test]
async fn test_end_to_end_crawl_persists_every_entity() {
    let server = MockServer::start().await;
    let thread_url = format!("{}/topic/airport-sighting", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&thread_url)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topic/airport-sighting"))
        .respond_with(ResponseTemplate::new(200).set_body_string(thread_page("Airport sighting")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("posts.db");
    let settings = test_settings(&server.uri(), db_path.clone());
    let scorer = Arc::new(FixedScorer(flat_scores(0.25)));

    run_crawl(&settings, &crawl_opts(), scorer).await.unwrap();

    let repo = ForumRepository::new(SqlitePool::from_path(&db_path));
    let counts = repo.table_counts().await.unwrap();
    assert_eq!(counts.authors, 2);
    assert_eq!(counts.topics, 1);
    assert_eq!(counts.topic_urls, 1);
    assert_eq!(counts.posts, 2);
    assert_eq!(repo.count_posts().await.unwrap(), 2);

    let exports = repo.export_posts().await.unwrap();
    assert_eq!(exports.len(), 2);
    for post in &exports {
        assert_eq!(post.topic_title, "Airport sighting");
        assert_eq!(post.topic_author, "EA12");
        assert_eq!(post.topic_url, thread_url);
        assert_eq!(post.scores, flat_scores(0.25));
    }
    let authors: Vec<&str> = exports.iter().map(|p| p.post_author.as_str()).collect();
    assert!(authors.contains(&"EA12") && authors.contains(&"9bc4"));
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    let thread_url = format!("{}/topic/airport-sighting", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&thread_url)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topic/airport-sighting"))
        .respond_with(ResponseTemplate::new(200).set_body_string(thread_page("Airport sighting")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("posts.db");
    let settings = test_settings(&server.uri(), db_path.clone());

    // The listing says "1 minute ago", so the second pass revisits the
    // thread instead of skipping it - and must not duplicate anything.
    for _ in 0..2 {
        let scorer = Arc::new(FixedScorer(flat_scores(0.1)));
        run_crawl(&settings, &crawl_opts(), scorer).await.unwrap();
    }

    let repo = ForumRepository::new(SqlitePool::from_path(&db_path));
    let counts = repo.table_counts().await.unwrap();
    assert_eq!(counts.authors, 2);
    assert_eq!(counts.topics, 1);
    assert_eq!(counts.topic_urls, 1);
    assert_eq!(counts.posts, 2);
}

#[tokio::test]
async fn test_skip_listed_thread_contributes_nothing() {
    let server = MockServer::start().await;
    let thread_url = format!("{}/topic/about-ejmr", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&thread_url)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topic/about-ejmr"))
        .respond_with(ResponseTemplate::new(200).set_body_string(thread_page("About")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("posts.db");
    let mut settings = test_settings(&server.uri(), db_path.clone());
    settings.skip_topics = vec!["/topic/about-ejmr".to_string()];
    let scorer = Arc::new(FixedScorer(flat_scores(0.5)));

    run_crawl(&settings, &crawl_opts(), scorer).await.unwrap();

    let repo = ForumRepository::new(SqlitePool::from_path(&db_path));
    let counts = repo.table_counts().await.unwrap();
    assert_eq!(counts.authors, 0);
    assert_eq!(counts.topics, 0);
    assert_eq!(counts.topic_urls, 0);
    assert_eq!(counts.posts, 0);
}

#[tokio::test]
async fn test_get_or_create_is_stable_under_repeated_calls() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("posts.db");
    let db_url = db_path.display().to_string();
    run_migrations(&db_url).await.unwrap();

    let repo = ForumRepository::new(SqlitePool::from_path(&db_path));

    let first = repo.get_or_create_author("EA12").await.unwrap();
    let second = repo.get_or_create_author("EA12").await.unwrap();
    assert_eq!(first, second);

    let topic_a = repo.get_or_create_topic("Some title", first).await.unwrap();
    let topic_b = repo.get_or_create_topic("Some title", first).await.unwrap();
    assert_eq!(topic_a, topic_b);

    // Same title under a different opener is a distinct topic.
    let other_author = repo.get_or_create_author("9bc4").await.unwrap();
    let topic_c = repo
        .get_or_create_topic("Some title", other_author)
        .await
        .unwrap();
    assert_ne!(topic_a, topic_c);

    let counts = repo.table_counts().await.unwrap();
    assert_eq!(counts.authors, 2);
    assert_eq!(counts.topics, 2);
}

#[tokio::test]
async fn test_reinserting_a_post_does_not_duplicate_it() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("posts.db");
    let db_url = db_path.display().to_string();
    run_migrations(&db_url).await.unwrap();

    let repo = ForumRepository::new(SqlitePool::from_path(&db_path));
    let author = repo.get_or_create_author("EA12").await.unwrap();
    let topic = repo.get_or_create_topic("Some title", author).await.unwrap();
    let url = repo
        .get_or_create_topic_url("https://forum.test/topic/some-title", author, topic)
        .await
        .unwrap();

    let created_at = Utc::now();
    let scores = flat_scores(0.3);
    let first = repo
        .insert_post("same content", author, topic, url, created_at, &scores)
        .await
        .unwrap();
    let second = repo
        .insert_post("same content", author, topic, url, created_at, &scores)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.count_posts().await.unwrap(), 1);
}
