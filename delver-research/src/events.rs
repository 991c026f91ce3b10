//! Workflow events for the planning and research runs.

use serde::{Deserialize, Serialize};

use crate::planner::models::{PlannerAgentOutput, TextSynthesizerConfig};

/// Starts a deep-research planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStartEvent {
    /// The user's research goal.
    pub initial_query: String,
}

/// A user message in the planning conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerTurnEvent {
    /// The message to feed the planner LLM.
    pub message: String,
}

/// Internal event carrying the planner output for a single user turn.
#[derive(Debug, Clone)]
pub struct PlannerOutputEvent {
    /// The structured planner output.
    pub output: PlannerAgentOutput,
    /// The user message that produced it.
    pub user_message: String,
}

/// Severity of a user-visible planner status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    /// Informational.
    Info,
    /// Something degraded but the run continues.
    Warning,
    /// A user-visible failure.
    Error,
}

/// User-visible status line streamed to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerStatusEvent {
    /// Severity.
    pub level: StatusLevel,
    /// Message text.
    pub message: String,
}

/// Starts a deep-research execution run from an approved plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchStartEvent {
    /// Session id carried over from planning, if any.
    pub research_id: Option<String>,
    /// The approved research plan.
    pub plan: String,
    /// Output-shaping config carried over from planning.
    #[serde(default)]
    pub text_config: TextSynthesizerConfig,
}

/// Kicks the orchestrator loop for a research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorTurnEvent {
    /// Instruction handed to the orchestrator agent.
    pub instruction: String,
}
