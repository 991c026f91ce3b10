//! Tools exposed to the searcher agent.
//!
//! `web_search` owns the no-progress accounting: URLs already seen or
//! failed are filtered out (and counted), empty result streaks increment
//! `no_new_results_count`, and at three consecutive no-progress searches
//! the tool short-circuits with `MAX_NO_NEW_RESULTS_REACHED` without
//! touching the upstream provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use delver_core::capability::{AssetKind, SearchHit, SearchProvider, TokenCounter};
use delver_tool::{ToolDyn, ToolError, ToolRegistry};
use delver_workflow::RunContext;
use serde_json::json;

use crate::config::ResearchConfig;
use crate::services::{EvidenceService, QueryService};
use crate::state::ResearchState;

/// Consecutive no-progress searches after which `web_search` refuses to
/// call upstream and instructs the agent to finalize.
pub const MAX_NO_NEW_RESULTS: u32 = 3;

fn state_err(e: delver_core::error::StateError) -> ToolError {
    ToolError::ExecutionFailed(e.to_string())
}

fn string_arg(input: &serde_json::Value, key: &str) -> Result<String, ToolError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidInput(format!("missing required string field '{key}'")))
}

/// `plan_search_queries(query)` — decompose a goal into engine-ready queries.
pub struct PlanSearchQueriesTool {
    query_service: Arc<QueryService>,
}

impl PlanSearchQueriesTool {
    /// Build over the query service.
    pub fn new(query_service: Arc<QueryService>) -> Self {
        Self { query_service }
    }
}

impl ToolDyn for PlanSearchQueriesTool {
    fn name(&self) -> &str {
        "plan_search_queries"
    }

    fn description(&self) -> &str {
        "Generates one or more search-engine-ready queries derived from the research goal. \
         When refining, keep the original goal present and append what you already tried and what is missing."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The exact research goal from the orchestrator/user, plus any 'already tried / missing' annotations."
                }
            },
            "required": ["query"]
        })
    }

    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let query = string_arg(&input, "query")?;
            let queries = self
                .query_service
                .decompose_query(&query)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok(json!(queries.join("\n")))
        })
    }
}

/// `web_search(query)` — SERP with dedup and no-progress sentinels.
pub struct WebSearchTool {
    ctx: Arc<RunContext>,
    search: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl WebSearchTool {
    /// Build over the run context and search capability.
    pub fn new(ctx: Arc<RunContext>, search: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            ctx,
            search,
            max_results,
        }
    }

    fn max_reached_message() -> String {
        "MAX_NO_NEW_RESULTS_REACHED\n\
         web_search has returned NO_NEW_RESULTS too many times in this turn.\n\n\
         You must choose one:\n\
         1) Call generate_evidences using URLs from previous web_search outputs\n\
         2) Call finalize_research if evidence is already sufficient"
            .to_string()
    }

    fn hoarding_message(seen_count: usize) -> String {
        format!(
            "NO_NEW_RESULTS\n\
             However, you have discovered {seen_count} URLs in previous searches but have generated 0 evidence items.\n\
             You MUST call generate_evidences on the URLs from your previous web_search outputs before searching again.\n\
             The answers you need are likely in those unread sources."
        )
    }

    fn no_new_results_message(seen: usize, failed: usize) -> String {
        format!(
            "NO_NEW_RESULTS\n\
             All results for this query are already seen/failed.\n\
             Seen URLs: {seen} | Failed URLs: {failed}\n\n\
             You must choose one:\n\
             1) Call generate_evidences using URLs from previous web_search outputs\n\
             2) Or refine by calling plan_search_queries(query='<ORIGINAL GOAL>\\n\\nAlready tried queries:\\n- ...\\n\\nWhat is missing:\\n- ...') and then web_search using one of the new planned queries verbatim\n\
             3) Call finalize_research if evidence is already sufficient"
        )
    }

    fn format_results(results: &[SearchHit], ignored_count: usize) -> String {
        let mut formatted: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "[{}] Title: {}\n    URL: {}\n    Snippet: {}",
                    i + 1,
                    hit.title.trim(),
                    hit.url.trim(),
                    hit.snippet.trim()
                )
            })
            .collect();
        if ignored_count > 0 {
            formatted.push(format!("(Ignored {ignored_count} already seen/failed results)"));
        }
        formatted.join("\n\n")
    }
}

impl ToolDyn for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Performs a web search and returns new results (title, URL, snippet). \
         Already seen or failed URLs are filtered out. Does NOT access page content; \
         use generate_evidences with the returned URLs to read the pages."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query to run."}
            },
            "required": ["query"]
        })
    }

    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let query = string_arg(&input, "query")?;
            let state = ResearchState::get(&self.ctx).await.map_err(state_err)?;

            // Three consecutive no-progress searches: refuse upstream.
            if state.research_turn.no_new_results_count + 1 >= MAX_NO_NEW_RESULTS {
                ResearchState::edit(&self.ctx, |s| {
                    s.research_turn.no_new_results_count = MAX_NO_NEW_RESULTS;
                })
                .await
                .map_err(state_err)?;
                return Ok(json!(Self::max_reached_message()));
            }

            let (hits, _requests) = self
                .search
                .search(&query, self.max_results)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            if hits.is_empty() {
                ResearchState::edit(&self.ctx, |s| {
                    s.research_turn.no_new_results_count += 1;
                })
                .await
                .map_err(state_err)?;
                return Ok(json!("No results found for this query."));
            }

            let mut new_results = Vec::new();
            let mut ignored_count = 0usize;
            for hit in hits {
                let url = hit.url.trim();
                if url.is_empty() {
                    continue;
                }
                if state.research_turn.knows_url(url) {
                    ignored_count += 1;
                    continue;
                }
                new_results.push(hit);
            }

            if new_results.is_empty() {
                ResearchState::edit(&self.ctx, |s| {
                    s.research_turn.no_new_results_count += 1;
                })
                .await
                .map_err(state_err)?;

                let seen = state.research_turn.seen_urls.len();
                let failed = state.research_turn.failed_urls.len();
                let evidence_count = state.research_turn.evidence.items.len();
                if seen > 0 && evidence_count == 0 {
                    return Ok(json!(Self::hoarding_message(seen)));
                }
                return Ok(json!(Self::no_new_results_message(seen, failed)));
            }

            let new_urls: Vec<String> = new_results.iter().map(|h| h.url.clone()).collect();
            ResearchState::edit(&self.ctx, |s| {
                s.research_turn.add_seen_urls(new_urls);
                s.research_turn.no_new_results_count = 0;
            })
            .await
            .map_err(state_err)?;

            Ok(json!(Self::format_results(&new_results, ignored_count)))
        })
    }
}

/// `generate_evidences(urls, directive)` — run the evidence pipeline.
pub struct GenerateEvidencesTool {
    ctx: Arc<RunContext>,
    evidence: Arc<EvidenceService>,
    tokens: Arc<dyn TokenCounter>,
    max_total_tokens: usize,
}

impl GenerateEvidencesTool {
    /// Build over the run context, pipeline, and token budget.
    pub fn new(
        ctx: Arc<RunContext>,
        evidence: Arc<EvidenceService>,
        tokens: Arc<dyn TokenCounter>,
        max_total_tokens: usize,
    ) -> Self {
        Self {
            ctx,
            evidence,
            tokens,
            max_total_tokens,
        }
    }
}

impl ToolDyn for GenerateEvidencesTool {
    fn name(&self) -> &str {
        "generate_evidences"
    }

    fn description(&self) -> &str {
        "Reads content from a list of URLs in parallel, analyzes each for insights relevant \
         to a directive, and returns a concise summary for each."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "urls": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "URLs to read."
                },
                "directive": {
                    "type": "string",
                    "description": "What to extract and why it matters."
                }
            },
            "required": ["urls", "directive"]
        })
    }

    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let directive = string_arg(&input, "directive")?;
            let urls: Vec<String> = input
                .get("urls")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .ok_or_else(|| {
                    ToolError::InvalidInput("missing required array field 'urls'".into())
                })?;

            let state = ResearchState::get(&self.ctx).await.map_err(state_err)?;

            // Idempotence by URL: drop duplicates within the batch and URLs
            // already ingested or known-failed.
            let mut unique: Vec<String> = Vec::new();
            for url in urls {
                let already_item = state
                    .research_turn
                    .evidence
                    .items
                    .iter()
                    .any(|i| i.url == url);
                let already_failed = state.research_turn.failed_urls.iter().any(|u| u == &url);
                if !already_item && !already_failed && !unique.contains(&url) {
                    unique.push(url);
                }
            }
            if unique.is_empty() {
                return Ok(json!(
                    "All provided URLs were already processed in this turn."
                ));
            }

            let existing_total = self.tokens.count(
                &state
                    .research_turn
                    .evidence
                    .items
                    .iter()
                    .map(|i| i.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            );

            let outcome = self
                .evidence
                .generate_evidence(unique, &directive, self.max_total_tokens, existing_total)
                .await;

            let summaries: Vec<String> = outcome
                .items
                .iter()
                .map(|item| {
                    let mut text = format!("--- Analysis for {} ---\n{}", item.url, item.summary);
                    if !item.assets.is_empty() {
                        let assets = item
                            .assets
                            .iter()
                            .map(|a| {
                                format!(
                                    "- [{}] {} (ID: {}) -> {}",
                                    crate::state::asset_kind_label(a.kind),
                                    a.description.as_deref().unwrap_or("No desc"),
                                    a.id,
                                    a.url
                                )
                            })
                            .collect::<Vec<_>>()
                            .join("\n");
                        text.push_str(&format!("\n\nSelected Assets:\n{assets}"));
                    }
                    text
                })
                .collect();

            let item_urls: Vec<String> = outcome.items.iter().map(|i| i.url.clone()).collect();
            let failures = outcome.failures.clone();
            let has_items = !outcome.items.is_empty();
            let items = outcome.items;
            ResearchState::edit(&self.ctx, move |s| {
                s.research_turn.add_failed_urls(failures);
                s.research_turn.add_seen_urls(item_urls);
                s.research_turn.add_evidence_items(items);
                if has_items {
                    s.research_turn.no_new_results_count = 0;
                }
            })
            .await
            .map_err(state_err)?;

            if summaries.is_empty() {
                return Ok(json!("No content could be analyzed from the provided URLs."));
            }
            let mut message = summaries.join("\n\n");
            if outcome.budget_exhausted {
                message.push_str(
                    "\n\n[NOTE] Reached the configured max pending evidence token budget for this turn. \
                     Additional sources were not added.",
                );
            }
            Ok(json!(message))
        })
    }
}

/// `finalize_research()` — return-direct compact summary of the turn.
pub struct FinalizeResearchTool {
    ctx: Arc<RunContext>,
}

impl FinalizeResearchTool {
    /// Build over the run context.
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }
}

impl ToolDyn for FinalizeResearchTool {
    fn name(&self) -> &str {
        "finalize_research"
    }

    fn description(&self) -> &str {
        "Finishes the research turn and reports totals of gathered evidence. \
         Call when the collected evidence is sufficient for the goal."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    fn return_direct(&self) -> bool {
        true
    }

    fn call(
        &self,
        _input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let state = ResearchState::get(&self.ctx).await.map_err(state_err)?;
            let turn = &state.research_turn;

            let mut image_assets = 0usize;
            let mut other_assets = 0usize;
            for item in &turn.evidence.items {
                for asset in &item.assets {
                    if asset.kind == AssetKind::Image {
                        image_assets += 1;
                    } else {
                        other_assets += 1;
                    }
                }
            }

            Ok(json!(format!(
                "Searcher agent has finished collecting evidences.\n\n\
                 Evidence\n\
                 - Total items: {}\n\
                 - Seen URLs: {}\n\
                 - Failed URLs: {}\n\n\
                 Assets\n\
                 - Images selected: {}\n\
                 - Other assets selected: {}",
                turn.evidence.items.len(),
                turn.seen_urls.len(),
                turn.failed_urls.len(),
                image_assets,
                other_assets
            )))
        })
    }
}

/// Build the searcher's tool registry bound to one run context.
pub fn searcher_tool_registry(
    ctx: Arc<RunContext>,
    search: Arc<dyn SearchProvider>,
    query_service: Arc<QueryService>,
    evidence: Arc<EvidenceService>,
    tokens: Arc<dyn TokenCounter>,
    config: &ResearchConfig,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(PlanSearchQueriesTool::new(query_service)));
    registry.register(Arc::new(WebSearchTool::new(
        Arc::clone(&ctx),
        search,
        config.searcher.max_results_per_query,
    )));
    registry.register(Arc::new(GenerateEvidencesTool::new(
        Arc::clone(&ctx),
        evidence,
        tokens,
        config.settings.max_pending_evidence_tokens,
    )));
    registry.register(Arc::new(FinalizeResearchTool::new(ctx)));
    registry
}
