//! The writer agent: patch-based edits to the single report artifact.

pub mod prompts;
pub mod tools;

use std::sync::Arc;

use async_trait::async_trait;
use delver_agent::{
    Agent, AgentConfig, AgentError, ChatMemory, SystemPromptSource,
};
use delver_llm::provider::Llm;
use delver_tool::ToolRegistry;
use delver_workflow::RunContext;

use crate::config::ResearchConfig;
use crate::patch::ReportPatcher;
use crate::planner::models::TextSynthesizerConfig;
use crate::state::ResearchState;
use crate::subagent::SubAgentRunner;

pub use prompts::{build_writer_hot_system_prompt, word_count_feedback};
pub use tools::{ApplyPatchTool, FinishWritingTool};

/// Hot prompt source rendering the writer's view of artifact state.
pub struct WriterPromptSource {
    ctx: Arc<RunContext>,
    target_words: Option<u32>,
}

impl WriterPromptSource {
    /// Build over the run context and the configured word target.
    pub fn new(ctx: Arc<RunContext>, target_words: Option<u32>) -> Self {
        Self { ctx, target_words }
    }
}

#[async_trait]
impl SystemPromptSource for WriterPromptSource {
    async fn render(&self) -> Result<String, AgentError> {
        let state = ResearchState::get(&self.ctx).await?;
        let original = state.research_artifact.content.clone();
        let draft = state
            .research_artifact
            .turn_draft
            .clone()
            .unwrap_or_else(|| original.clone());
        let evidences = state.research_turn.evidence.content_for_writing();
        let feedback = word_count_feedback(&draft, self.target_words);
        Ok(build_writer_hot_system_prompt(
            &original, &evidences, &draft, &feedback,
        ))
    }
}

/// Build the writer's tool registry bound to one run context.
pub fn writer_tool_registry(ctx: Arc<RunContext>) -> ToolRegistry {
    let patcher = Arc::new(ReportPatcher::default());
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ApplyPatchTool::new(Arc::clone(&ctx), patcher)));
    registry.register(Arc::new(FinishWritingTool::new(ctx)));
    registry
}

/// Factory-built writer exposed to the orchestrator by capability.
pub struct WriterRunner {
    llm: Arc<dyn Llm>,
    config: ResearchConfig,
    text_config: TextSynthesizerConfig,
}

impl WriterRunner {
    /// Wire the writer's dependencies.
    pub fn new(
        llm: Arc<dyn Llm>,
        config: ResearchConfig,
        text_config: TextSynthesizerConfig,
    ) -> Self {
        Self {
            llm,
            config,
            text_config,
        }
    }
}

#[async_trait]
impl SubAgentRunner for WriterRunner {
    fn name(&self) -> &str {
        "writer"
    }

    async fn run(&self, ctx: Arc<RunContext>, user_message: String) -> Result<String, AgentError> {
        let registry = writer_tool_registry(Arc::clone(&ctx));
        let prompt = Arc::new(WriterPromptSource::new(
            Arc::clone(&ctx),
            self.text_config.target_words,
        ));
        let agent = Agent::with_prompt_source(
            Arc::clone(&self.llm),
            registry,
            prompt,
            AgentConfig {
                name: "writer".into(),
                model: Some(self.config.writer.main_llm.model.clone()),
                temperature: Some(self.config.writer.main_llm.temperature),
                ..Default::default()
            },
        );
        let mut memory = ChatMemory::new();
        let output = agent.run(&mut memory, user_message).await?;
        Ok(output.response)
    }
}
