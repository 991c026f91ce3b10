//! The capability boundary between the orchestrator and its sub-agents.
//!
//! The orchestrator never names the searcher or writer types directly — it
//! holds `Arc<dyn SubAgentRunner>` built by each agent's factory. This
//! breaks the module cycle and lets tests substitute scripted sub-agents.

use std::sync::Arc;

use async_trait::async_trait;
use delver_agent::AgentError;
use delver_workflow::RunContext;

/// A sub-agent that runs to completion inside a child run context.
#[async_trait]
pub trait SubAgentRunner: Send + Sync {
    /// Stable name for logging and handoff accounting.
    fn name(&self) -> &str;

    /// Run the sub-agent against `ctx` with one user message, returning its
    /// final response text. All state exchange happens through `ctx`.
    async fn run(&self, ctx: Arc<RunContext>, user_message: String) -> Result<String, AgentError>;
}
