//! Feed list configuration.

use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CONFIG_FILE;
use crate::error::{CalMergeError, CalMergeResult};

/// One remote calendar feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeed {
    pub name: String,
    pub url: String,
    pub color: String,
}

/// Contents of `calendar-locations.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub calendars: Vec<CalendarFeed>,
}

impl FeedConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load the feed list. A missing file is reported as `ConfigNotFound` so
    /// callers can tell "not set up" apart from "broken".
    pub fn load(path: &Path) -> CalMergeResult<Self> {
        if !path.exists() {
            return Err(CalMergeError::ConfigNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => FileFormat::Toml,
            _ => FileFormat::Json,
        };

        let config: FeedConfig = Config::builder()
            .add_source(File::from(path).format(format))
            .build()
            .map_err(|e| CalMergeError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalMergeError::Config(e.to_string()))?;

        tracing::debug!(path = %path.display(), feeds = config.calendars.len(), "Loaded feed list");
        Ok(config)
    }
}
