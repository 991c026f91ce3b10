//! Run a full plan-to-report research session with scripted models over
//! in-memory capabilities. No network access required.
//!
//! ```sh
//! cargo run --example research_session
//! ```

use std::sync::Arc;

use delver::delver_core::memory::{HeuristicTokenCounter, MemoryFileStore, Utf8Parser};
use delver::delver_llm::scripted::ScriptedLlm;
use delver::delver_research::searcher::SearcherRunner;
use delver::delver_research::services::{ContentAnalysisService, EvidenceService, QueryService};
use delver::delver_research::writer::WriterRunner;
use delver::prelude::*;
use serde_json::json;

struct FixtureSearch;

#[async_trait::async_trait]
impl SearchProvider for FixtureSearch {
    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<(Vec<SearchHit>, u32), delver::delver_core::error::SearchError> {
        Ok((
            vec![SearchHit {
                title: "Grid storage economics".into(),
                url: "https://example.org/grid-storage".into(),
                snippet: "levelized cost of storage by technology".into(),
            }],
            1,
        ))
    }
}

struct FixtureFetcher;

#[async_trait::async_trait]
impl WebFetcher for FixtureFetcher {
    async fn fetch_bytes(
        &self,
        _url: &str,
    ) -> Result<Vec<u8>, delver::delver_core::error::FetchError> {
        Ok(b"# Grid storage\n\nFlow batteries undercut Li-ion past 6 hours of discharge.".to_vec())
    }
}

#[tokio::main]
async fn main() {
    let config = ResearchConfig::for_tests();

    let files = Arc::new(MemoryFileStore::new());
    let evidence = Arc::new(EvidenceService::new(
        Arc::new(FixtureFetcher),
        Arc::clone(&files) as _,
        Arc::new(Utf8Parser::new(files)),
        Arc::new(ContentAnalysisService::new(Arc::new(ScriptedLlm::new(
            vec![ScriptedLlm::structured_response(&json!({
                "insights": [{
                    "content": "Flow batteries undercut Li-ion beyond 6h discharge",
                    "relevance_score": 0.9
                }]
            }))],
        )))),
        Arc::new(HeuristicTokenCounter),
    ));

    let searcher = Arc::new(SearcherRunner::new(
        Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::tool_call_response("tu_1", "web_search", json!({"query": "grid storage"})),
            ScriptedLlm::tool_call_response(
                "tu_2",
                "generate_evidences",
                json!({"urls": ["https://example.org/grid-storage"], "directive": "cost crossover"}),
            ),
            ScriptedLlm::tool_call_response("tu_3", "finalize_research", json!({})),
        ])),
        Arc::new(FixtureSearch),
        Arc::new(QueryService::new(Arc::new(ScriptedLlm::new(vec![])))),
        evidence,
        Arc::new(HeuristicTokenCounter),
        config.clone(),
    ));

    let diff = "*** Begin Patch\n\
                *** Update File: artifacts/report.md\n\
                @@\n\
                +# Grid Storage Report\n\
                +\n\
                +## Cost Crossover\n\
                +Flow batteries undercut Li-ion beyond six hours ([source](https://example.org/grid-storage)).\n\
                *** End Patch";
    let writer = Arc::new(WriterRunner::new(
        Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::tool_call_response("tu_1", "apply_patch", json!({"diff": diff})),
            ScriptedLlm::tool_call_response("tu_2", "finish_writing", json!({})),
        ])),
        config.clone(),
        Default::default(),
    ));

    let orchestrator_llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call_response(
            "tu_1",
            "call_research_agent",
            json!({"prompt": "cost crossover point for flow vs li-ion"}),
        ),
        ScriptedLlm::tool_call_response(
            "tu_2",
            "call_write_agent",
            json!({"instruction": "write the Cost Crossover section"}),
        ),
        ScriptedLlm::text_response("Report complete."),
    ]));

    let workflow = research_workflow(ResearchAgents {
        llm: orchestrator_llm,
        searcher,
        writer,
        config,
    });
    let mut handler = workflow.run(ResearchStartEvent {
        research_id: None,
        plan: "1. find the cost crossover point".into(),
        text_config: Default::default(),
    });

    while let Some(event) = handler.next_event().await {
        println!("Event: {}", event.name());
    }
    let result = handler.finish().await.expect("research run failed");
    println!("\n{}", result["report"].as_str().unwrap_or_default());
}
