//! The searcher agent: query planning, SERP, and evidence generation for a
//! single research goal.

pub mod prompts;
pub mod tools;

use std::sync::Arc;

use async_trait::async_trait;
use delver_agent::{Agent, AgentConfig, AgentError, ChatMemory};
use delver_core::capability::{SearchProvider, TokenCounter};
use delver_llm::provider::Llm;
use delver_workflow::RunContext;

use crate::config::ResearchConfig;
use crate::services::{EvidenceService, QueryService};
use crate::subagent::SubAgentRunner;

pub use prompts::build_searcher_system_prompt;
pub use tools::{
    FinalizeResearchTool, GenerateEvidencesTool, MAX_NO_NEW_RESULTS, PlanSearchQueriesTool,
    WebSearchTool, searcher_tool_registry,
};

/// Factory-built searcher exposed to the orchestrator by capability.
pub struct SearcherRunner {
    llm: Arc<dyn Llm>,
    search: Arc<dyn SearchProvider>,
    query_service: Arc<QueryService>,
    evidence: Arc<EvidenceService>,
    tokens: Arc<dyn TokenCounter>,
    config: ResearchConfig,
}

impl SearcherRunner {
    /// Wire the searcher's dependencies.
    pub fn new(
        llm: Arc<dyn Llm>,
        search: Arc<dyn SearchProvider>,
        query_service: Arc<QueryService>,
        evidence: Arc<EvidenceService>,
        tokens: Arc<dyn TokenCounter>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            llm,
            search,
            query_service,
            evidence,
            tokens,
            config,
        }
    }
}

#[async_trait]
impl SubAgentRunner for SearcherRunner {
    fn name(&self) -> &str {
        "searcher"
    }

    async fn run(&self, ctx: Arc<RunContext>, user_message: String) -> Result<String, AgentError> {
        let registry = searcher_tool_registry(
            Arc::clone(&ctx),
            Arc::clone(&self.search),
            Arc::clone(&self.query_service),
            Arc::clone(&self.evidence),
            Arc::clone(&self.tokens),
            &self.config,
        );
        let agent = Agent::new(
            Arc::clone(&self.llm),
            registry,
            build_searcher_system_prompt(&self.config),
            AgentConfig {
                name: "searcher".into(),
                model: Some(self.config.searcher.main_llm.model.clone()),
                temperature: Some(self.config.searcher.main_llm.temperature),
                ..Default::default()
            },
        );
        let mut memory = ChatMemory::new();
        let output = agent.run(&mut memory, user_message).await?;
        Ok(output.response)
    }
}
