//! Retrieval of raw feed text.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::constants::DEFAULT_FETCH_TIMEOUT;
use crate::error::{CalMergeError, CalMergeResult};

/// Anything that can turn a feed URL into iCalendar text.
pub trait FeedSource: Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = CalMergeResult<String>> + Send;
}

/// Fetches feeds over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(fetch_timeout: Duration) -> CalMergeResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("calmerge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CalMergeError::Fetch(e.to_string()))?;

        Ok(HttpFeedSource {
            client,
            timeout: fetch_timeout,
        })
    }

    pub fn with_default_timeout() -> CalMergeResult<Self> {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }

    async fn fetch_raw(&self, url: &str) -> CalMergeResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CalMergeError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalMergeError::FetchStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| CalMergeError::Fetch(e.to_string()))
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> CalMergeResult<String> {
        let url = http_url(url);
        timeout(self.timeout, self.fetch_raw(&url))
            .await
            .map_err(|_| CalMergeError::FetchTimeout(self.timeout.as_secs()))?
    }
}

/// Subscription links use `webcal://`; the feed itself is served over HTTPS.
fn http_url(url: &str) -> String {
    let url = url.trim();
    for scheme in ["webcals://", "webcal://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            return format!("https://{rest}");
        }
    }
    url.to_string()
}
