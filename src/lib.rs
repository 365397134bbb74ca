//! tanalyzer - local Twitter account analyzer
//!
//! Pulls an account's social graph and tweet feeds from the Twitter REST API
//! into `SQLite`, scores every tweet for sentiment and answers queries over
//! the stored data.
//!
//! # Modules
//!
//! - [`storage`] - `SQLite` storage layer and settings store
//! - [`ingest`] - create-or-update policy for API records
//! - [`sentiment`] - polarity/subjectivity scoring
//! - [`paginate`] - since-id, max-id and cursor page walking
//! - [`sync`] - the full `update` cycle
//! - [`report`] - search and the troll report
//! - [`client`] - signed HTTP client for the REST API

pub mod api;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod oauth;
pub mod paginate;
pub mod report;
pub mod sentiment;
pub mod storage;
pub mod sync;

pub use api::{Page, PageRequest, TweetFeed, TwitterApi, UserListFeed, UserLookup};
pub use cache::UserCache;
pub use cli::*;
pub use config::Config;
pub use error::{Result, TanalyzerError, format_error};
pub use ingest::{Ingestor, TweetOutcome};
pub use model::*;
pub use report::{SearchTarget, TrollThresholds};
pub use sentiment::{LexiconScorer, Sentiment, SentimentScorer};
pub use storage::Storage;
pub use sync::{SyncReport, SyncRunner};

/// Default database filename, placed in the home directory.
pub const DEFAULT_DB_NAME: &str = ".twitter-analyzer.db";

/// Standard width for content dividers in CLI output
pub const CONTENT_DIVIDER_WIDTH: usize = 60;

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(DEFAULT_DB_NAME)
}

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let abs = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(abs.len() + abs.len() / 3);

    for (idx, ch) in abs.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut formatted: String = out.chars().rev().collect();
    if value < 0 {
        formatted.insert(0, '-');
    }
    formatted
}

/// Format a score as a signed fixed-point number ("+0.250", "-0.800").
#[must_use]
pub fn format_score(value: f64) -> String {
    format!("{value:+.3}")
}
