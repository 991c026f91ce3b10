//! Tools exposed to the writer agent.
//!
//! `apply_patch` validates and applies a patch envelope against the turn
//! draft; `finish_writing` commits the draft and clears the research turn.
//! The catastrophic-delete guard lives here at the tool boundary: a patch
//! shrinking a >100-character draft below half its prior length is rejected
//! and the draft is left untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use delver_tool::{ToolDyn, ToolError};
use delver_workflow::RunContext;
use serde_json::json;

use crate::patch::ReportPatcher;
use crate::state::ResearchState;
use crate::writer::prompts::PATCH_FORMAT_INSTRUCTIONS;

/// Prior draft length above which the shrink guard applies, in characters.
const SHRINK_GUARD_MIN_LEN: usize = 100;

fn state_err(e: delver_core::error::StateError) -> ToolError {
    ToolError::ExecutionFailed(e.to_string())
}

/// `apply_patch(diff)` — validate and apply one patch to the turn draft.
pub struct ApplyPatchTool {
    ctx: Arc<RunContext>,
    patcher: Arc<ReportPatcher>,
}

impl ApplyPatchTool {
    /// Build over the run context and report patcher.
    pub fn new(ctx: Arc<RunContext>, patcher: Arc<ReportPatcher>) -> Self {
        Self { ctx, patcher }
    }
}

impl ToolDyn for ApplyPatchTool {
    fn name(&self) -> &str {
        "apply_patch"
    }

    fn description(&self) -> &str {
        "Edits the report by applying a patch to the working draft. \
         The patch language is a stripped-down, file-oriented diff format: \
         an envelope with one or more file operations."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "diff": {
                    "type": "string",
                    "description": PATCH_FORMAT_INSTRUCTIONS
                }
            },
            "required": ["diff"]
        })
    }

    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let diff = input
                .get("diff")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ToolError::InvalidInput("missing required string field 'diff'".into())
                })?
                .trim()
                .to_string();
            if diff.is_empty() {
                return Err(ToolError::PatchRejected("empty patch".into()));
            }

            let state = ResearchState::get(&self.ctx).await.map_err(state_err)?;
            // The draft seeds from the committed report on first patch.
            let prior = state
                .research_artifact
                .turn_draft
                .clone()
                .unwrap_or_else(|| state.research_artifact.content.clone());

            let outcome = self
                .patcher
                .apply(&prior, &diff)
                .map_err(|e| ToolError::PatchRejected(e.to_string()))?;

            let prior_len = prior.chars().count();
            let new_len = outcome.text.chars().count();
            if prior_len > SHRINK_GUARD_MIN_LEN && new_len * 2 < prior_len {
                return Err(ToolError::PatchRejected(format!(
                    "patch would shrink the draft from {prior_len} to {new_len} characters; \
                     removing more than half of the report in one patch is not allowed"
                )));
            }

            ResearchState::edit(&self.ctx, |s| {
                s.research_artifact.turn_draft = Some(outcome.text.clone());
            })
            .await
            .map_err(state_err)?;

            tracing::debug!(added = outcome.added, removed = outcome.removed, "patch applied");
            Ok(json!(format!(
                "added {} lines, removed {} lines",
                outcome.added, outcome.removed
            )))
        })
    }
}

/// `finish_writing()` — return-direct commit of the draft.
pub struct FinishWritingTool {
    ctx: Arc<RunContext>,
}

impl FinishWritingTool {
    /// Build over the run context.
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }
}

impl ToolDyn for FinishWritingTool {
    fn name(&self) -> &str {
        "finish_writing"
    }

    fn description(&self) -> &str {
        "Commits the working draft into the main report and ends the writing session. \
         Call only when the instruction is fully satisfied."
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
            let committed = ResearchState::edit(&self.ctx, |s| {
                let Some(draft) = s.research_artifact.turn_draft.take() else {
                    return None;
                };
                s.research_artifact.content = draft;
                s.research_turn.clear();
                Some(s.research_artifact.content.clone())
            })
            .await
            .map_err(state_err)?;

            match committed {
                Some(report) => Ok(json!(report)),
                None => Err(ToolError::ExecutionFailed(
                    "no draft to commit; apply a patch first".into(),
                )),
            }
        })
    }
}
