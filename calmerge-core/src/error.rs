//! Error types for calmerge.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading feeds and expanding their events.
#[derive(Error, Debug)]
pub enum CalMergeError {
    #[error("Calendar configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch feed: {0}")]
    Fetch(String),

    #[error("Feed responded with status {status}: {reason}")]
    FetchStatus { status: u16, reason: String },

    #[error("Feed request timed out after {0}s")]
    FetchTimeout(u64),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Recurrence rule error: {0}")]
    Recurrence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calmerge operations.
pub type CalMergeResult<T> = Result<T, CalMergeError>;
