//! Scripted capability implementations for tests.
//!
//! Enabled with the `test-utils` feature. Each type replays queued or fixed
//! data so pipeline behavior can be exercised without network access.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::capability::{SearchHit, SearchProvider, WebFetcher};
use crate::error::{FetchError, SearchError};

/// Search provider that replays queued result pages.
///
/// Each call pops one page; an exhausted queue yields an empty page. The
/// call counter lets tests assert whether an upstream request happened.
pub struct StaticSearch {
    pages: Mutex<Vec<Vec<SearchHit>>>,
    calls: AtomicU32,
}

impl StaticSearch {
    /// Queue pages of results, first page served first.
    pub fn new(pages: Vec<Vec<SearchHit>>) -> Self {
        let mut pages = pages;
        pages.reverse();
        Self {
            pages: Mutex::new(pages),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of `search` calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<(Vec<SearchHit>, u32), SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut page = self.pages.lock().unwrap().pop().unwrap_or_default();
        page.truncate(max_results);
        Ok((page, 1))
    }
}

/// Fetcher serving fixed bytes per URL; unknown URLs fail the download.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    /// Create an empty fetcher (every URL fails).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body served for a URL.
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl WebFetcher for StaticFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(FetchError::DownloadFailed {
                url: url.to_string(),
                message: "no fixture registered".into(),
            }),
        }
    }
}

/// Convenience constructor for a [`SearchHit`].
pub fn hit(title: &str, url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        snippet: snippet.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_search_replays_pages_then_empties() {
        let search = StaticSearch::new(vec![vec![hit("A", "https://a", "s")], vec![]]);
        let (page, _) = search.search("q", 10).await.unwrap();
        assert_eq!(page.len(), 1);
        let (page, _) = search.search("q", 10).await.unwrap();
        assert!(page.is_empty());
        let (page, _) = search.search("q", 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(search.calls(), 3);
    }

    #[tokio::test]
    async fn static_fetcher_serves_and_fails() {
        let fetcher = StaticFetcher::new().with_page("https://a", b"body".to_vec());
        assert_eq!(fetcher.fetch_bytes("https://a").await.unwrap(), b"body");
        assert!(fetcher.fetch_bytes("https://b").await.is_err());
    }
}
