//! The orchestrator's two tools: its sub-agents.
//!
//! Each call builds a fresh child run context, copies the deep-research
//! state snapshot into it, runs the sub-agent there, and merges back only
//! the declared slices: the Searcher returns its whole `research_turn`, the
//! Writer its committed `research_artifact.content` (clearing the draft and
//! the turn). Sub-agents never share conversational memory — state is the
//! only channel between them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use delver_tool::{ToolDyn, ToolError};
use delver_workflow::RunContext;
use serde_json::json;

use crate::state::ResearchState;
use crate::subagent::SubAgentRunner;

fn state_err(e: delver_core::error::StateError) -> ToolError {
    ToolError::ExecutionFailed(e.to_string())
}

async fn child_with_snapshot(parent: &Arc<RunContext>) -> Result<Arc<RunContext>, ToolError> {
    let child = parent.child();
    let snapshot = ResearchState::get(parent).await.map_err(state_err)?;
    child
        .store()
        .set_json(ResearchState::KEY, &snapshot)
        .await
        .map_err(state_err)?;
    Ok(child)
}

/// `call_research_agent(prompt)` — delegate evidence collection.
pub struct CallResearchAgentTool {
    ctx: Arc<RunContext>,
    searcher: Arc<dyn SubAgentRunner>,
}

impl CallResearchAgentTool {
    /// Build over the parent context and the searcher capability.
    pub fn new(ctx: Arc<RunContext>, searcher: Arc<dyn SubAgentRunner>) -> Self {
        Self { ctx, searcher }
    }
}

impl ToolDyn for CallResearchAgentTool {
    fn name(&self) -> &str {
        "call_research_agent"
    }

    fn description(&self) -> &str {
        "Asks the Searcher for evidence needed to satisfy a specific missing plan item. \
         Updates the CURRENT EVIDENCE SUMMARY."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Focused research goal targeting one missing plan item."
                }
            },
            "required": ["prompt"]
        })
    }

    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let prompt = input
                .get("prompt")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ToolError::InvalidInput("missing required string field 'prompt'".into())
                })?;
            tracing::info!(target_agent = %self.searcher.name(), %prompt, "orchestrator delegating research");

            let child = child_with_snapshot(&self.ctx).await?;
            self.searcher
                .run(
                    Arc::clone(&child),
                    format!("Write some notes about the following: {prompt}"),
                )
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            // Merge back: the searcher owns the research turn, nothing else.
            let child_state = ResearchState::get(&child).await.map_err(state_err)?;
            let summary = ResearchState::edit(&self.ctx, move |s| {
                s.research_turn = child_state.research_turn;
                s.research_turn.evidence.summary()
            })
            .await
            .map_err(state_err)?;

            Ok(json!(summary))
        })
    }
}

/// `call_write_agent(instruction)` — delegate a report update.
pub struct CallWriteAgentTool {
    ctx: Arc<RunContext>,
    writer: Arc<dyn SubAgentRunner>,
}

impl CallWriteAgentTool {
    /// Build over the parent context and the writer capability.
    pub fn new(ctx: Arc<RunContext>, writer: Arc<dyn SubAgentRunner>) -> Self {
        Self { ctx, writer }
    }
}

impl ToolDyn for CallWriteAgentTool {
    fn name(&self) -> &str {
        "call_write_agent"
    }

    fn description(&self) -> &str {
        "Asks the Writer to update the report from the current evidence. \
         The instruction must say which plan items it satisfies and exactly what to change."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": "Specific editorial instruction for the report update."
                }
            },
            "required": ["instruction"]
        })
    }

    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let instruction = input
                .get("instruction")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ToolError::InvalidInput("missing required string field 'instruction'".into())
                })?;
            tracing::info!(target_agent = %self.writer.name(), "orchestrator delegating writing");

            let parent_state = ResearchState::get(&self.ctx).await.map_err(state_err)?;
            let evidence_text = parent_state.research_turn.evidence.content_for_writing();

            let child = child_with_snapshot(&self.ctx).await?;
            let user_msg = format!(
                "Update the report based on the following research notes and instructions.\n\n\
                 Research Notes:\n<research_notes>{evidence_text}</research_notes>\n\n\
                 Instruction: {instruction}"
            );
            let response = self
                .writer
                .run(Arc::clone(&child), user_msg)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            // Merge back: the writer owns the committed report. The turn's
            // evidence is consumed by the commit.
            let child_state = ResearchState::get(&child).await.map_err(state_err)?;
            ResearchState::edit(&self.ctx, move |s| {
                s.research_artifact.content = child_state.research_artifact.content;
                s.research_artifact.turn_draft = None;
                s.research_turn.clear();
            })
            .await
            .map_err(state_err)?;

            Ok(json!(response))
        })
    }
}
