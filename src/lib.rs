//! Rumormill - forum thread acquisition and toxicity research system.
//!
//! Crawls a paginated forum index, fetches every page of every discussion
//! thread, extracts posts, scores them through an external toxicity model,
//! and persists them into SQLite with constraint-backed deduplication.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
pub mod utils;
