#![deny(missing_docs)]
//! # delver-research — the deep-research agents
//!
//! Turns a user's research goal into a cited markdown report:
//!
//! | Module | Agent / concern |
//! |--------|-----------------|
//! | [`planner`] | HITL planning loop producing an approved plan |
//! | [`orchestrator`] | Principal investigator driving searcher + writer |
//! | [`searcher`] | Query planning, SERP, evidence generation |
//! | [`writer`] | Patch-based edits to the single report artifact |
//! | [`services`] | Evidence pipeline, query planning, content analysis |
//! | [`patch`] | The patch-envelope parser and applier |
//! | [`state`] | The cross-agent state model and accessor |
//! | [`config`] | JSON configuration model and loader |
//!
//! The orchestrator exchanges state with its sub-agents through deep-copied
//! snapshots in child run contexts; the single event stream reaches the
//! user from every level.

pub mod config;
pub mod events;
pub mod orchestrator;
pub mod patch;
pub mod planner;
pub mod searcher;
pub mod services;
pub mod state;
pub mod subagent;
pub mod workflow;
pub mod writer;

pub use config::{ConfigError, LlmModelConfig, ResearchConfig};
pub use events::{
    OrchestratorTurnEvent, PlanStartEvent, PlannerStatusEvent, PlannerTurnEvent,
    ResearchStartEvent, StatusLevel,
};
pub use patch::{ApplyOutcome, PatchError, ReportPatcher};
pub use planner::{PlannerAgentOutput, PlannerDecision, TextSynthesizerConfig, planner_workflow};
pub use state::{
    ArtifactStatus, DeepResearchState, EvidenceBundle, EvidenceItem, REPORT_PATH, ResearchState,
};
pub use subagent::SubAgentRunner;
pub use workflow::{ResearchAgents, research_workflow};
