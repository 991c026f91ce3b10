//! SERP client for the Oxylabs realtime API.

use async_trait::async_trait;
use delver_core::capability::{SearchHit, SearchProvider};
use delver_core::error::SearchError;
use serde::Deserialize;

const REALTIME_ENDPOINT: &str = "https://realtime.oxylabs.io/v1/queries";

/// Google search via the Oxylabs realtime API.
pub struct SerpClient {
    http: reqwest::Client,
    username: String,
    password: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct RealtimeResponse {
    #[serde(default)]
    results: Vec<RealtimePage>,
}

#[derive(Deserialize)]
struct RealtimePage {
    content: Option<PageContent>,
}

#[derive(Deserialize)]
struct PageContent {
    results: Option<OrganicSection>,
}

#[derive(Deserialize)]
struct OrganicSection {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    desc: String,
}

impl SerpClient {
    /// Build from explicit credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            username: username.into(),
            password: password.into(),
            endpoint: REALTIME_ENDPOINT.to_string(),
        }
    }

    /// Build from `OXYLABS_USERNAME` / `OXYLABS_PASSWORD`.
    pub fn from_env() -> Result<Self, SearchError> {
        let username = std::env::var("OXYLABS_USERNAME").map_err(|_| {
            SearchError::AuthFailed("OXYLABS_USERNAME is not set".into())
        })?;
        let password = std::env::var("OXYLABS_PASSWORD").map_err(|_| {
            SearchError::AuthFailed("OXYLABS_PASSWORD is not set".into())
        })?;
        Ok(Self::new(username, password))
    }

    /// Override the endpoint (tests point this at a local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for SerpClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<(Vec<SearchHit>, u32), SearchError> {
        tracing::info!(%query, "performing google search");
        let body = serde_json::json!({
            "source": "google_search",
            "query": query,
            "pages": 1,
            "parse": true,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SearchError::AuthFailed(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(SearchError::RequestFailed(format!("status {status}")));
        }

        let parsed: RealtimeResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let mut hits = Vec::new();
        for page in parsed.results {
            let organic = page
                .content
                .and_then(|c| c.results)
                .map(|r| r.organic)
                .unwrap_or_default();
            for result in organic {
                if result.url.trim().is_empty() {
                    continue;
                }
                hits.push(SearchHit {
                    title: result.title,
                    url: result.url,
                    snippet: result.desc,
                });
            }
        }
        hits.truncate(max_results);
        Ok((hits, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_parses_organic_results() {
        let json = serde_json::json!({
            "results": [{
                "content": {
                    "results": {
                        "organic": [
                            {"title": "A", "url": "https://a", "desc": "snippet a"},
                            {"title": "No url", "url": "", "desc": "dropped"}
                        ]
                    }
                }
            }]
        });
        let parsed: RealtimeResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.results.len(), 1);
        let organic = parsed.results[0]
            .content
            .as_ref()
            .unwrap()
            .results
            .as_ref()
            .unwrap();
        assert_eq!(organic.organic.len(), 2);
        assert_eq!(organic.organic[0].url, "https://a");
    }

    #[test]
    fn from_env_requires_credentials() {
        // Only assert the error path; the success path would leak env state
        // across tests.
        if std::env::var("OXYLABS_USERNAME").is_err() {
            assert!(matches!(
                SerpClient::from_env(),
                Err(SearchError::AuthFailed(_))
            ));
        }
    }
}
