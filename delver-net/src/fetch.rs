//! Byte downloader for source URLs.

use std::time::Duration;

use async_trait::async_trait;
use delver_core::capability::WebFetcher;
use delver_core::error::FetchError;

const USER_AGENT: &str = concat!("delver/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads raw page bytes with a per-request timeout.
pub struct PageFetcher {
    http: reqwest::Client,
}

impl PageFetcher {
    /// Build with the default 10-second timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Build with an explicit per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for PageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebFetcher for PageFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::DownloadFailed {
                url: url.to_string(),
                message: format!("status {status}"),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if bytes.is_empty() {
            return Err(FetchError::Empty(url.to_string()));
        }
        tracing::debug!(%url, bytes = bytes.len(), "downloaded");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unresolvable_host_is_a_download_failure() {
        let fetcher = PageFetcher::with_timeout(Duration::from_millis(500));
        let result = fetcher
            .fetch_bytes("http://delver-test.invalid/page")
            .await;
        assert!(matches!(result, Err(FetchError::DownloadFailed { .. })));
    }
}
