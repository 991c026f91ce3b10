#![deny(missing_docs)]
//! # delver — umbrella crate
//!
//! Provides a single import surface for the delver workspace. Re-exports
//! every member crate plus a `prelude` for the happy path.

pub use delver_agent;
pub use delver_core;
pub use delver_llm;
pub use delver_net;
pub use delver_research;
pub use delver_tool;
pub use delver_workflow;

/// Happy-path imports for composing delver systems.
pub mod prelude {
    pub use delver_agent::{Agent, AgentConfig, AgentError, ChatMemory, SystemPromptSource};
    pub use delver_core::{
        Asset, AssetKind, DocumentParser, FileStore, HumanResponseEvent, InputRequiredEvent,
        ParsedDocument, ResearchId, RunId, SearchHit, SearchProvider, SessionRecord, SessionStore,
        StopEvent, TokenCounter, WebFetcher, WorkflowError, WorkflowEvent,
    };
    pub use delver_llm::{ChatMessage, Llm, LlmError, LlmRequest, LlmResponse, structured_predict};
    pub use delver_net::{PageFetcher, SerpClient};
    pub use delver_research::{
        DeepResearchState, PlanStartEvent, ResearchAgents, ResearchConfig, ResearchStartEvent,
        ResearchState, SubAgentRunner, planner_workflow, research_workflow,
    };
    pub use delver_tool::{ToolDyn, ToolError, ToolRegistry};
    pub use delver_workflow::{RunContext, Workflow, WorkflowHandler, emit};
}
