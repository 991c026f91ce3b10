//! The HITL planning agent and its workflow.

pub mod models;
pub mod prompts;
pub mod workflow;

pub use models::{
    PlanStatus, PlannerAgentOutput, PlannerDecision, ResearchPlanState, TextSynthesizerConfig,
};
pub use prompts::{build_planner_system_prompt, format_text_config};
pub use workflow::{
    PLAN_STATE_KEY, PLANNER_MEMORY_KEY, PLANNER_WAITER_ID, PlannerLlm, PlannerSessions,
    planner_workflow,
};
