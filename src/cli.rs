//! CLI definitions for tanalyze.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// tanalyze - Twitter account analyzer
#[derive(Parser, Debug)]
#[command(name = "tanalyze")]
#[command(version)]
#[command(about = "Collect your Twitter account's data locally and analyze it")]
#[command(long_about = r#"
tanalyze - Pulls your account, followers, friends, mentions, timelines and
favorites from the Twitter API into a local SQLite database, scores every
tweet for sentiment and lets you query the result.

Quick start:
  1. Create an app at developer.twitter.com and note its keys
  2. Run: tanalyze init
  3. Sync: tanalyze update
  4. Query: tanalyze search "rust" / tanalyze find-trolls
"#)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "TANALYZE_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and store API credentials
    Init(InitArgs),

    /// Sync account data from the Twitter API
    Update,

    /// Search stored tweets, URLs or users
    Search(SearchArgs),

    /// List accounts that keep replying negatively and subjectively
    FindTrolls(FindTrollsArgs),

    /// Show database statistics
    Stats,

    /// Show or manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// OAuth consumer key (prompted if omitted)
    #[arg(long, env = "TANALYZE_CONSUMER_KEY")]
    pub consumer_key: Option<String>,

    /// OAuth consumer secret (prompted if omitted)
    #[arg(long, env = "TANALYZE_CONSUMER_SECRET", hide_env_values = true)]
    pub consumer_secret: Option<String>,

    /// OAuth access token (prompted if omitted)
    #[arg(long, env = "TANALYZE_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// OAuth access token secret (prompted if omitted)
    #[arg(long, env = "TANALYZE_ACCESS_SECRET", hide_env_values = true)]
    pub access_secret: Option<String>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for (substring match)
    pub query: String,

    /// Search expanded URLs instead of tweet text
    #[arg(long, conflicts_with = "user")]
    pub url: bool,

    /// Search user screen names and display names
    #[arg(long)]
    pub user: bool,
}

#[derive(Args, Debug)]
pub struct FindTrollsArgs {
    /// Average polarity below which a replier is listed
    #[arg(long, allow_negative_numbers = true)]
    pub polarity: Option<f64>,

    /// Average subjectivity above which a replier is listed
    #[arg(long)]
    pub subjectivity: Option<f64>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Write a default configuration file
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

impl SearchArgs {
    #[must_use]
    pub const fn target(&self) -> crate::report::SearchTarget {
        if self.url {
            crate::report::SearchTarget::Urls
        } else if self.user {
            crate::report::SearchTarget::Users
        } else {
            crate::report::SearchTarget::Tweets
        }
    }
}
