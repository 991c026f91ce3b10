//! The per-turn evidence pipeline.
//!
//! download → upload → parse → analyze → budget & assemble. Every stage is
//! concurrent within itself; failures are classified per URL and aggregated
//! — a single bad URL never aborts the batch. Documents that analysis finds
//! uninformative are dropped, not failed. Items are assembled in completion
//! order; callers must not depend on the input URL order.

use std::collections::BTreeSet;
use std::sync::Arc;

use delver_core::capability::{
    Asset, DocumentParser, FileStore, ParsedDocument, TokenCounter, WebFetcher,
};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use super::analysis::ContentAnalysisService;
use crate::state::EvidenceItem;

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct EvidenceOutcome {
    /// Accepted items in completion order.
    pub items: Vec<EvidenceItem>,
    /// Failed URLs, sorted.
    pub failures: Vec<String>,
    /// Whether the token budget stopped further acceptance.
    pub budget_exhausted: bool,
}

/// The evidence pipeline over injected capabilities.
pub struct EvidenceService {
    fetcher: Arc<dyn WebFetcher>,
    files: Arc<dyn FileStore>,
    parser: Arc<dyn DocumentParser>,
    analysis: Arc<ContentAnalysisService>,
    tokens: Arc<dyn TokenCounter>,
    max_item_tokens: Option<usize>,
}

impl EvidenceService {
    /// Wire the pipeline.
    pub fn new(
        fetcher: Arc<dyn WebFetcher>,
        files: Arc<dyn FileStore>,
        parser: Arc<dyn DocumentParser>,
        analysis: Arc<ContentAnalysisService>,
        tokens: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            fetcher,
            files,
            parser,
            analysis,
            tokens,
            max_item_tokens: None,
        }
    }

    /// Truncate each item's content to at most this many tokens.
    pub fn with_max_item_tokens(mut self, max: usize) -> Self {
        self.max_item_tokens = Some(max);
        self
    }

    /// Run the pipeline for a batch of URLs under a total token budget.
    ///
    /// `existing_total_tokens` is what the current turn has already
    /// accumulated; the budget check is
    /// `existing + accepted + next ≤ max_total_tokens`.
    pub async fn generate_evidence(
        &self,
        urls: Vec<String>,
        directive: &str,
        max_total_tokens: usize,
        existing_total_tokens: usize,
    ) -> EvidenceOutcome {
        let mut failures: BTreeSet<String> = BTreeSet::new();

        // 1. Download.
        let downloads = urls.iter().map(|url| {
            let fetcher = Arc::clone(&self.fetcher);
            async move { (url.clone(), fetcher.fetch_bytes(url).await) }
        });
        let mut fetched = Vec::new();
        for (url, result) in futures_util::future::join_all(downloads).await {
            match result {
                Ok(bytes) if !bytes.is_empty() => fetched.push((url, bytes)),
                Ok(_) => {
                    tracing::warn!(url = %url, "empty download");
                    failures.insert(url);
                }
                Err(error) => {
                    tracing::warn!(url = %url, error = %error, "download failed");
                    failures.insert(url);
                }
            }
        }

        // 2. Upload.
        let uploads = fetched.into_iter().map(|(url, bytes)| {
            let files = Arc::clone(&self.files);
            async move {
                let filename = filename_for(&url);
                let result = files.upload(bytes, &filename).await;
                (url, result)
            }
        });
        let mut stored = Vec::new();
        for (url, result) in futures_util::future::join_all(uploads).await {
            match result {
                Ok(file_id) => stored.push((file_id, url)),
                Err(error) => {
                    tracing::warn!(url = %url, error = %error, "upload failed");
                    failures.insert(url);
                }
            }
        }

        // 3. Parse.
        let mut documents = Vec::new();
        if !stored.is_empty() {
            match self.parser.parse_files(stored).await {
                Ok((docs, failed_urls)) => {
                    failures.extend(failed_urls);
                    documents = docs;
                }
                Err(error) => {
                    tracing::warn!(error = %error, "parse batch failed");
                    // A batch-level parser failure fails every document in it.
                    return EvidenceOutcome {
                        items: vec![],
                        failures: failures.into_iter().collect(),
                        budget_exhausted: false,
                    };
                }
            }
        }

        // 4. Analyze, consuming results in completion order.
        let mut analyses: FuturesUnordered<_> = documents
            .into_iter()
            .filter(|doc| !doc.markdown.trim().is_empty())
            .map(|doc| {
                let analysis = Arc::clone(&self.analysis);
                let directive = directive.to_string();
                async move {
                    let result = analysis.analyze_parsed_document(&doc, &directive).await;
                    (doc, result)
                }
            })
            .collect();

        // 5. Budget & assemble.
        let mut items = Vec::new();
        let mut accepted_tokens = 0usize;
        let mut budget_exhausted = false;
        while let Some((doc, result)) = analyses.next().await {
            let response = match result {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(url = %doc.source_url, error = %error, "analysis failed");
                    failures.insert(doc.source_url);
                    continue;
                }
            };
            if response.insights.is_empty() {
                // Uninformative source: dropped, not failed.
                tracing::debug!(url = %doc.source_url, "no insights; dropping document");
                continue;
            }
            if budget_exhausted {
                continue;
            }

            let mut item = self.assemble_item(doc, &response);
            if let Some(max) = self.max_item_tokens {
                item.content = self.tokens.truncate(&item.content, max);
            }
            let cost = self.tokens.count(&item.content);
            if existing_total_tokens + accepted_tokens + cost > max_total_tokens {
                budget_exhausted = true;
                tracing::debug!(url = %item.url, "token budget exhausted; item not accepted");
                continue;
            }
            accepted_tokens += cost;
            items.push(item);
        }

        EvidenceOutcome {
            items,
            failures: failures.into_iter().collect(),
            budget_exhausted,
        }
    }

    fn assemble_item(
        &self,
        doc: ParsedDocument,
        response: &super::analysis::InsightExtractionResponse,
    ) -> EvidenceItem {
        let summary = response
            .insights
            .iter()
            .map(|i| format!("- {} (Relevance: {:.2})", i.content, i.relevance_score))
            .collect::<Vec<_>>()
            .join("\n");
        let bullets = response.insights.iter().map(|i| i.content.clone()).collect();
        let relevance = response
            .insights
            .iter()
            .map(|i| i.relevance_score)
            .fold(0.0f64, f64::max);

        let selected: Vec<Asset> = doc
            .assets
            .into_iter()
            .filter(|a| response.selected_asset_ids.contains(&a.id))
            .map(|mut a| {
                a.is_selected = true;
                a
            })
            .collect();

        let title = doc
            .metadata
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::to_string);
        let content_type = doc
            .metadata
            .get("content_type")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .or_else(|| infer_content_type(&doc.source_url));

        EvidenceItem {
            url: doc.source_url,
            title,
            content_type,
            metadata: doc.metadata,
            content: doc.markdown,
            summary,
            bullets,
            relevance,
            assets: selected,
        }
    }
}

fn filename_for(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let rest = rest.trim_end_matches('/');
    match rest.rsplit_once('/') {
        Some((_, tail)) => {
            let tail = tail.split(['?', '#']).next().unwrap_or_default();
            if tail.is_empty() {
                "download.bin".to_string()
            } else {
                tail.to_string()
            }
        }
        None => "download.bin".to_string(),
    }
}

fn infer_content_type(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let ext = path.rsplit('.').next()?;
    match ext {
        "pdf" => Some("pdf".into()),
        "csv" => Some("csv".into()),
        "html" | "htm" => Some("html".into()),
        _ => None,
    }
}
