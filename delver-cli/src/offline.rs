//! Offline planner model for demo runs without provider credentials.
//!
//! Proposes a plan derived from the user's query on every call; the HITL
//! accept path finalizes without a further model call, so the full planning
//! loop is exercisable from a terminal with no network access.

use std::sync::Arc;

use async_trait::async_trait;
use delver_llm::provider::{Llm, LlmError, Retrying};
use delver_llm::types::{ContentPart, LlmRequest, LlmResponse, Role, StopReason, TokenUsage};
use delver_research::ResearchConfig;

struct OfflinePlannerLlm;

#[async_trait]
impl Llm for OfflinePlannerLlm {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let user_message = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.as_text())
            .unwrap_or_default();

        let plan = format!(
            "1. What are the key dimensions of: {user_message}?\n\
             2. What does recent evidence say about each dimension?\n\
             3. What trade-offs and open questions remain?"
        );
        let output = serde_json::json!({
            "decision": "propose_plan",
            "response": "Here is a proposed research plan. Reply with edits, or type 'accept'.",
            "plan": plan,
        });

        Ok(LlmResponse {
            content: vec![ContentPart::Text {
                text: output.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
            model: "offline-planner".into(),
            cost: None,
        })
    }
}

/// The planning model for this process: offline unless a provider is wired.
pub fn planner_llm(config: &ResearchConfig) -> Arc<dyn Llm> {
    tracing::debug!(model = %config.planner.main_llm.model, "using offline planner model");
    Arc::new(Retrying::new(OfflinePlannerLlm))
}
