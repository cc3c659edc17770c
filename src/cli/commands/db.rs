//! Store inspection commands.

use std::io::Write;

use console::style;

use crate::config::Settings;
use crate::repository::{ForumRepository, SqlitePool};

/// Print row counts for all four tables.
pub async fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let repo = ForumRepository::new(SqlitePool::from_path(&settings.database_path));
    let counts = repo.table_counts().await?;

    println!("{}", style(settings.database_path.display()).bold());
    println!("  authors:    {}", counts.authors);
    println!("  topics:     {}", counts.topics);
    println!("  topic urls: {}", counts.topic_urls);
    println!("  posts:      {}", counts.posts);

    Ok(())
}

/// Dump every post as one JSON object per line.
pub async fn cmd_export(settings: &Settings) -> anyhow::Result<()> {
    let repo = ForumRepository::new(SqlitePool::from_path(&settings.database_path));
    let posts = repo.export_posts().await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for post in &posts {
        serde_json::to_writer(&mut out, post)?;
        writeln!(out)?;
    }

    Ok(())
}
