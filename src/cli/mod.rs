//! Command-line interface.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(
    name = "rumor",
    version,
    about = "Forum thread acquisition and toxicity research system"
)]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(short, long, global = true, env = "RUMORMILL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a range of index pages into the store.
    Crawl {
        /// First index page.
        #[arg(long, default_value_t = 1)]
        start: u32,

        /// Last index page (inclusive).
        #[arg(long)]
        stop: u32,

        /// SQLite database file.
        #[arg(short, long, env = "RUMORMILL_DATABASE")]
        database: Option<PathBuf>,

        /// Freshness window in hours for revisiting seen threads.
        #[arg(short, long)]
        freshness: Option<i64>,

        /// Scraper parallelism (default: one per core).
        #[arg(long)]
        scrapers: Option<usize>,

        /// Store-writer count (default: half the cores).
        #[arg(long)]
        consumers: Option<usize>,

        /// Toxicity scoring service endpoint.
        #[arg(long, env = "RUMORMILL_SCORER_URL")]
        scorer_url: Option<String>,

        /// Disable the progress line.
        #[arg(long)]
        no_progress: bool,
    },

    /// Print row counts for the store.
    Stats {
        /// SQLite database file.
        #[arg(short, long, env = "RUMORMILL_DATABASE")]
        database: Option<PathBuf>,
    },

    /// Dump every post as JSON lines, joined with topic and author info.
    Export {
        /// SQLite database file.
        #[arg(short, long, env = "RUMORMILL_DATABASE")]
        database: Option<PathBuf>,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Crawl {
            start,
            stop,
            database,
            freshness,
            scrapers,
            consumers,
            scorer_url,
            no_progress,
        } => {
            if let Some(database) = database {
                settings.database_path = database;
            }
            if let Some(freshness) = freshness {
                settings.freshness_hours = freshness;
            }
            if let Some(scrapers) = scrapers {
                settings.scrapers = scrapers;
            }
            if let Some(consumers) = consumers {
                settings.consumers = consumers;
            }
            if let Some(scorer_url) = scorer_url {
                settings.scorer_url = scorer_url;
            }

            commands::crawl::cmd_crawl(&settings, start, stop, !no_progress).await
        }
        Commands::Stats { database } => {
            if let Some(database) = database {
                settings.database_path = database;
            }
            commands::db::cmd_stats(&settings).await
        }
        Commands::Export { database } => {
            if let Some(database) = database {
                settings.database_path = database;
            }
            commands::db::cmd_export(&settings).await
        }
    }
}
