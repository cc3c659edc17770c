//! Main crawl command implementation.

use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::repository::{ForumRepository, SqlitePool};
use crate::services::{run_crawl, CrawlOptions, HttpScorer};

/// Crawl the given index-page range until every page is processed and the
/// ingest queue drains.
pub async fn cmd_crawl(
    settings: &Settings,
    start: u32,
    stop: u32,
    show_progress: bool,
) -> anyhow::Result<()> {
    let opts = CrawlOptions {
        start,
        stop,
        freshness_hours: settings.freshness_hours,
        scrapers: settings.effective_scrapers(),
        consumers: settings.effective_consumers(),
        show_progress,
    };

    println!(
        "{} Crawling index pages {}..={} into {}",
        style("→").cyan(),
        opts.start,
        opts.stop,
        settings.database_path.display()
    );

    let scorer = Arc::new(HttpScorer::new(&settings.scorer_url));
    run_crawl(settings, &opts, scorer).await?;

    let repo = ForumRepository::new(SqlitePool::from_path(&settings.database_path));
    match repo.table_counts().await {
        Ok(counts) => {
            println!(
                "{} Crawl complete: {} posts across {} topics ({} authors, {} page urls)",
                style("✓").green(),
                counts.posts,
                counts.topics,
                counts.authors,
                counts.topic_urls
            );
        }
        Err(err) => {
            println!(
                "{} Crawl complete (could not read final counts: {err})",
                style("✓").green()
            );
        }
    }

    Ok(())
}
