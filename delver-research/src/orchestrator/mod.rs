//! The orchestrator agent: a principal investigator driving the
//! plan-to-report loop through exactly two tool-agents.

pub mod prompts;
pub mod tools;

use std::sync::Arc;

use async_trait::async_trait;
use delver_agent::{Agent, AgentConfig, AgentError, SystemPromptSource};
use delver_llm::provider::Llm;
use delver_tool::ToolRegistry;
use delver_workflow::RunContext;

use crate::config::ResearchConfig;
use crate::state::ResearchState;
use crate::subagent::SubAgentRunner;

pub use prompts::build_orchestrator_system_prompt;
pub use tools::{CallResearchAgentTool, CallWriteAgentTool};

/// Hot prompt source rendering plan, report, and evidence summary.
pub struct OrchestratorPromptSource {
    ctx: Arc<RunContext>,
}

impl OrchestratorPromptSource {
    /// Build over the run context.
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SystemPromptSource for OrchestratorPromptSource {
    async fn render(&self) -> Result<String, AgentError> {
        let state = ResearchState::get(&self.ctx).await?;
        Ok(build_orchestrator_system_prompt(
            &state.orchestrator.research_plan,
            &state.research_artifact.content,
            &state.research_turn.evidence.summary(),
        ))
    }
}

/// Build the orchestrator agent bound to one run context.
pub fn orchestrator_agent(
    ctx: Arc<RunContext>,
    llm: Arc<dyn Llm>,
    searcher: Arc<dyn SubAgentRunner>,
    writer: Arc<dyn SubAgentRunner>,
    config: &ResearchConfig,
) -> Agent {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CallResearchAgentTool::new(
        Arc::clone(&ctx),
        searcher,
    )));
    registry.register(Arc::new(CallWriteAgentTool::new(Arc::clone(&ctx), writer)));

    Agent::with_prompt_source(
        llm,
        registry,
        Arc::new(OrchestratorPromptSource::new(ctx)),
        AgentConfig {
            name: "orchestrator".into(),
            model: Some(config.orchestrator.main_llm.model.clone()),
            temperature: Some(config.orchestrator.main_llm.temperature),
            max_iterations: 40,
            ..Default::default()
        },
    )
}

/// An orchestrator agent error, kept exported for workflow steps.
pub type OrchestratorError = AgentError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EvidenceItem, ResearchTurnState};
    use delver_tool::ToolDyn;
    use serde_json::json;
    use std::sync::Mutex;

    fn item(url: &str) -> EvidenceItem {
        EvidenceItem {
            url: url.into(),
            title: None,
            content_type: None,
            metadata: serde_json::Value::Null,
            content: "full content".into(),
            summary: "- point (Relevance: 0.90)".into(),
            bullets: vec!["point".into()],
            relevance: 0.9,
            assets: vec![],
        }
    }

    /// Sub-agent that populates its child context's research turn and
    /// records what state it could see on entry.
    struct RecordingSearcher {
        observed_plan: Mutex<Option<String>>,
        observed_messages: Mutex<Vec<String>>,
    }

    impl RecordingSearcher {
        fn new() -> Self {
            Self {
                observed_plan: Mutex::new(None),
                observed_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SubAgentRunner for RecordingSearcher {
        fn name(&self) -> &str {
            "recording-searcher"
        }

        async fn run(
            &self,
            ctx: Arc<RunContext>,
            user_message: String,
        ) -> Result<String, AgentError> {
            let state = ResearchState::get(&ctx).await?;
            *self.observed_plan.lock().unwrap() = Some(state.orchestrator.research_plan.clone());
            self.observed_messages.lock().unwrap().push(user_message);

            ResearchState::edit(&ctx, |s| {
                s.research_turn.add_evidence_items(vec![item("https://found")]);
                s.research_turn.add_failed_urls(["https://broken"]);
            })
            .await?;
            Ok("notes written".into())
        }
    }

    /// Sub-agent that commits a report into its child context.
    struct RecordingWriter {
        observed_turns: Mutex<Vec<ResearchTurnState>>,
        observed_messages: Mutex<Vec<String>>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self {
                observed_turns: Mutex::new(Vec::new()),
                observed_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SubAgentRunner for RecordingWriter {
        fn name(&self) -> &str {
            "recording-writer"
        }

        async fn run(
            &self,
            ctx: Arc<RunContext>,
            user_message: String,
        ) -> Result<String, AgentError> {
            let state = ResearchState::get(&ctx).await?;
            self.observed_turns
                .lock()
                .unwrap()
                .push(state.research_turn.clone());
            self.observed_messages.lock().unwrap().push(user_message);

            ResearchState::edit(&ctx, |s| {
                s.research_artifact.content = "# Report\n\nwritten\n".into();
                s.research_artifact.turn_draft = None;
                s.research_turn.clear();
            })
            .await?;
            Ok("Report updated.".into())
        }
    }

    #[tokio::test]
    async fn research_handoff_merges_turn_into_parent() {
        let (ctx, _rx) = RunContext::detached();
        ResearchState::edit(&ctx, |s| {
            s.orchestrator.research_plan = "1. find energy density".into();
        })
        .await
        .unwrap();

        let searcher = Arc::new(RecordingSearcher::new());
        let tool = CallResearchAgentTool::new(Arc::clone(&ctx), Arc::clone(&searcher) as _);

        let out = tool.call(json!({"prompt": "energy density"})).await.unwrap();
        let summary = out.as_str().unwrap();
        assert!(summary.contains("https://found"));

        // The child saw a snapshot including the plan.
        assert_eq!(
            searcher.observed_plan.lock().unwrap().as_deref(),
            Some("1. find energy density")
        );
        // The goal is framed for note-taking.
        assert!(
            searcher.observed_messages.lock().unwrap()[0]
                .starts_with("Write some notes about the following:")
        );

        // The parent turn was replaced wholesale.
        let state = ResearchState::get(&ctx).await.unwrap();
        assert_eq!(state.research_turn.evidence.items.len(), 1);
        assert!(state.research_turn.knows_url("https://broken"));
    }

    #[tokio::test]
    async fn parent_state_is_isolated_until_merge() {
        let (ctx, _rx) = RunContext::detached();

        struct MutatingButFailing;
        #[async_trait]
        impl SubAgentRunner for MutatingButFailing {
            fn name(&self) -> &str {
                "failing"
            }
            async fn run(&self, ctx: Arc<RunContext>, _m: String) -> Result<String, AgentError> {
                ResearchState::edit(&ctx, |s| {
                    s.research_turn.add_seen_urls(["https://partial"]);
                })
                .await?;
                Err(AgentError::Invariant("searcher died".into()))
            }
        }

        let tool = CallResearchAgentTool::new(Arc::clone(&ctx), Arc::new(MutatingButFailing));
        let result = tool.call(json!({"prompt": "x"})).await;
        assert!(result.is_err());

        // The failed child's partial writes never reached the parent.
        let state = ResearchState::get(&ctx).await.unwrap();
        assert!(!state.research_turn.knows_url("https://partial"));
    }

    #[tokio::test]
    async fn write_handoff_replaces_report_and_clears_turn() {
        let (ctx, _rx) = RunContext::detached();
        ResearchState::edit(&ctx, |s| {
            s.research_turn.add_evidence_items(vec![item("https://found")]);
        })
        .await
        .unwrap();

        let writer = Arc::new(RecordingWriter::new());
        let tool = CallWriteAgentTool::new(Arc::clone(&ctx), Arc::clone(&writer) as _);

        let out = tool
            .call(json!({"instruction": "add the energy density section"}))
            .await
            .unwrap();
        assert_eq!(out.as_str().unwrap(), "Report updated.");

        let state = ResearchState::get(&ctx).await.unwrap();
        assert_eq!(state.research_artifact.content, "# Report\n\nwritten\n");
        assert!(state.research_artifact.turn_draft.is_none());
        assert!(state.research_turn.evidence.items.is_empty());
        assert!(state.research_turn.seen_urls.is_empty());

        // The writer received the evidence through its message and snapshot,
        // never through the searcher's conversation.
        let messages = writer.observed_messages.lock().unwrap();
        assert!(messages[0].contains("<research_notes>"));
        assert!(messages[0].contains("full content"));
        assert!(messages[0].contains("Instruction: add the energy density section"));
    }

    #[tokio::test]
    async fn hot_prompt_renders_live_state() {
        let (ctx, _rx) = RunContext::detached();
        ResearchState::edit(&ctx, |s| {
            s.orchestrator.research_plan = "PLAN".into();
            s.research_artifact.content = "REPORT".into();
        })
        .await
        .unwrap();

        let prompt = OrchestratorPromptSource::new(Arc::clone(&ctx));
        let first = prompt.render().await.unwrap();
        assert!(first.contains("PLAN"));
        assert!(first.contains("REPORT"));
        assert!(first.contains("No evidence gathered yet."));

        ResearchState::edit(&ctx, |s| {
            s.research_artifact.content = "REPORT v2".into();
        })
        .await
        .unwrap();
        let second = prompt.render().await.unwrap();
        assert!(second.contains("REPORT v2"));
    }
}
