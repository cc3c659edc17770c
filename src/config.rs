//! Configuration management for rumormill.

use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};

/// Default forum root. Page 1 of the index is the root itself, page n>1
/// lives at `<root>page/<n>`.
pub const DEFAULT_BASE_URL: &str = "https://www.econjobrumors.com/";

/// Hours a previously-seen thread stays "fresh" and worth revisiting.
pub const DEFAULT_FRESHNESS_HOURS: i64 = 84;

/// Administrative threads that never contribute rows to the dataset.
pub const DEFAULT_SKIP_TOPICS: &[&str] = &[
    "https://www.econjobrumors.com/topic/about-ejmr",
    "https://www.econjobrumors.com/topic/request-a-thread-to-be-deleted-here",
];

/// Runtime settings, loadable from a TOML file with env/CLI overrides
/// applied on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Forum root URL (with trailing slash).
    pub base_url: String,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Freshness window in hours for re-visiting seen threads.
    pub freshness_hours: i64,
    /// Scraper task parallelism; 0 means one per available core.
    pub scrapers: usize,
    /// Store-writer parallelism; 0 means half the available cores.
    pub consumers: usize,
    /// Capacity of the post-batch queue between scrapers and writers.
    pub queue_capacity: usize,
    /// Endpoint of the external toxicity scoring service.
    pub scorer_url: String,
    /// SOCKS5 proxy used by the anonymizing fallback transport.
    pub socks_proxy: String,
    /// Thread URLs excluded from ingestion.
    pub skip_topics: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            database_path: PathBuf::from("rumormill.db"),
            freshness_hours: DEFAULT_FRESHNESS_HOURS,
            scrapers: 0,
            consumers: 0,
            queue_capacity: 128,
            scorer_url: "http://127.0.0.1:8601/score".to_string(),
            socks_proxy: "socks5h://127.0.0.1:9050".to_string(),
            skip_topics: DEFAULT_SKIP_TOPICS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, or defaults when the file is absent.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from("rumormill.toml"),
        };

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let settings = toml::from_str(&raw)?;
            tracing::info!("Loaded settings from {}", path.display());
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Effective scraper parallelism (one task slot per core by default).
    pub fn effective_scrapers(&self) -> usize {
        if self.scrapers > 0 {
            self.scrapers
        } else {
            available_cores()
        }
    }

    /// Effective consumer parallelism (half the cores by default; the store
    /// serializes writes anyway, so more buys little).
    pub fn effective_consumers(&self) -> usize {
        if self.consumers > 0 {
            self.consumers
        } else {
            (available_cores() / 2).max(1)
        }
    }
}

fn available_cores() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
