use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use calmerge_core::{Aggregator, CalMergeResult, FeedConfig, HttpFeedSource};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    // The feed list is re-read on each request so edits apply without a restart
    config_path: PathBuf,
    aggregator: Arc<Aggregator<HttpFeedSource>>,
}

impl AppState {
    pub fn new(config_path: PathBuf, fetch_timeout: Duration) -> Result<Self> {
        let source = HttpFeedSource::new(fetch_timeout)?;
        Ok(AppState {
            config_path,
            aggregator: Arc::new(Aggregator::new(source)),
        })
    }

    pub fn feed_config(&self) -> CalMergeResult<FeedConfig> {
        FeedConfig::load(&self.config_path)
    }

    pub fn aggregator(&self) -> &Aggregator<HttpFeedSource> {
        &self.aggregator
    }
}
