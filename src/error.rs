//! Custom error types for tanalyzer.
//!
//! Provides structured error handling with detailed context for better
//! diagnostics and user experience.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for tanalyzer operations.
///
/// Each variant provides specific context about what went wrong,
/// enabling better error messages and programmatic error handling.
#[derive(Error, Debug)]
pub enum TanalyzerError {
    // =========================================================================
    // Settings Errors
    // =========================================================================
    /// A required setting (credential) has not been stored yet.
    #[error("Missing setting '{name}'")]
    MissingSetting { name: String },

    /// No authenticated account has been synced yet.
    #[error("No account data found. Run 'tanalyze update' first.")]
    NotInitialized,

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database file not found (not yet initialized).
    #[error(
        "No database found. Run 'tanalyze init' first.\nExpected database at: {path}"
    )]
    DatabaseNotFound { path: PathBuf },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    // =========================================================================
    // API Errors
    // =========================================================================
    /// The API answered with an error status.
    #[error("Twitter API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("Invalid response: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Request could not be signed.
    #[error("Failed to sign request: {reason}")]
    Signing { reason: String },

    // =========================================================================
    // IO Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    /// Invalid command-line argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for tanalyzer operations.
pub type Result<T> = std::result::Result<T, TanalyzerError>;

impl TanalyzerError {
    /// Create a missing setting error.
    pub fn missing_setting(name: impl Into<String>) -> Self {
        Self::MissingSetting { name: name.into() }
    }

    /// Create a database not found error.
    pub fn database_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DatabaseNotFound { path: path.into() }
    }

    /// Create an API error from a status code and optional error payload.
    pub fn api(status: u16, code: Option<i64>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (user can fix it).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingSetting { .. }
                | Self::NotInitialized
                | Self::DatabaseNotFound { .. }
                | Self::ConfigError { .. }
                | Self::InvalidArgument { .. }
        )
    }

    /// Check if the API rejected the stored credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::MissingSetting { .. } => {
                Some("Run 'tanalyze init' to store your API credentials.")
            }
            Self::DatabaseNotFound { .. } => Some("Run 'tanalyze init' to create the database."),
            Self::NotInitialized => Some("Run 'tanalyze update' to fetch your account data."),
            Self::Api { status: 401, .. } => {
                Some("Check your credentials and re-run 'tanalyze init'.")
            }
            Self::Api { status: 429, .. } => {
                Some("Rate limit reached. Wait 15 minutes and run 'tanalyze update' again.")
            }
            _ => None,
        }
    }
}

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
///
/// # Arguments
/// * `title` - Brief error title (e.g., "Missing credentials")
/// * `explanation` - What went wrong and why
/// * `suggestions` - List of actionable suggestions
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}
