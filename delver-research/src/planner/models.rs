//! Structured-output models for the planning agent.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output-shaping guidelines for downstream agents. Values are free-form
/// strings, not a closed list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TextSynthesizerConfig {
    /// The intended output type. Examples: Report, Blog post, Email.
    pub synthesis_type: String,
    /// Overall tone guideline. Examples: Objective, Formal, Conversational.
    pub tone: String,
    /// Point of view guideline. Examples: First person, Third person.
    pub point_of_view: String,
    /// Output language guideline.
    pub language: String,
    /// Intended audience guideline.
    pub target_audience: String,
    /// Approximate target total word count. A guide, not a hard limit.
    pub target_words: Option<u32>,
    /// Output format guideline. Examples: Markdown, Plaintext.
    pub output_format: String,
    /// Free-form extra requirements not captured by other fields.
    pub custom_instructions: String,
}

impl Default for TextSynthesizerConfig {
    fn default() -> Self {
        Self {
            synthesis_type: "report".into(),
            tone: "objective".into(),
            point_of_view: "third_person".into(),
            language: "english".into(),
            target_audience: "general_audience".into(),
            target_words: Some(4000),
            output_format: "markdown".into(),
            custom_instructions: String::new(),
        }
    }
}

/// Planner decision per turn. `Finalize` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlannerDecision {
    /// Present a plan (initial or revised) for user review.
    ProposePlan,
    /// The user agreed with the plan; end the workflow.
    Finalize,
}

/// Structured output contract for the planning agent per turn.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannerAgentOutput {
    /// What to do with this turn's output.
    pub decision: PlannerDecision,
    /// The message to show to the user (question or plan explanation).
    pub response: String,
    /// The current research plan as raw text. Always required.
    pub plan: String,
    /// Output configuration guidelines for downstream agents.
    #[serde(default)]
    pub text_config: TextSynthesizerConfig,
}

/// Planner run state persisted in the run's context store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchPlanState {
    /// The query that started the session.
    pub initial_query: Option<String>,
    /// Session identifier (uuid).
    pub research_id: Option<String>,
    /// The plan as of the latest planner turn.
    pub plan_text: Option<String>,
    /// Latest output-shaping config.
    pub text_config: TextSynthesizerConfig,
    /// Session lifecycle.
    pub status: PlanStatus,
}

/// Lifecycle of a planning session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Still negotiating the plan with the human.
    #[default]
    Planning,
    /// The plan was accepted and persisted.
    Finalized,
    /// The session failed before finalization.
    Failed,
}

impl PlanStatus {
    /// Stable serialized name.
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Planning => "planning",
            PlanStatus::Finalized => "finalized",
            PlanStatus::Failed => "failed",
        }
    }
}

impl From<PlanStatus> for delver_core::capability::SessionStatus {
    fn from(status: PlanStatus) -> Self {
        match status {
            PlanStatus::Planning => Self::Planning,
            PlanStatus::Finalized => Self::Finalized,
            PlanStatus::Failed => Self::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_output_parses_from_model_json() {
        let json = serde_json::json!({
            "decision": "propose_plan",
            "response": "Here is a plan.",
            "plan": "1. compare energy density\n2. compare safety",
            "text_config": {"tone": "formal", "target_words": 2500}
        });
        let output: PlannerAgentOutput = serde_json::from_value(json).unwrap();
        assert_eq!(output.decision, PlannerDecision::ProposePlan);
        assert_eq!(output.text_config.tone, "formal");
        assert_eq!(output.text_config.target_words, Some(2500));
        // Unspecified fields fall back to defaults.
        assert_eq!(output.text_config.language, "english");
    }

    #[test]
    fn decision_serde_names() {
        assert_eq!(
            serde_json::to_string(&PlannerDecision::Finalize).unwrap(),
            "\"finalize\""
        );
    }

    #[test]
    fn plan_status_maps_to_session_status() {
        let status: delver_core::capability::SessionStatus = PlanStatus::Finalized.into();
        assert_eq!(status, delver_core::capability::SessionStatus::Finalized);
    }
}
