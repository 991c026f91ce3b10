#![deny(missing_docs)]
//! # delver-agent — the tool-calling loop
//!
//! A ReAct-style agent: reason (model call), act (tool execution), observe
//! (tool results into memory), repeat. Two features distinguish it from a
//! plain function-calling loop:
//!
//! 1. **Hot system prompts** — the system message is re-rendered from a
//!    [`SystemPromptSource`] before every model call, so agents whose
//!    decisions depend on fast-moving state (a growing report, a fresh
//!    evidence batch) never reason over a stale prompt.
//! 2. **Return-direct tools** — a tool may terminate the loop with its
//!    output as the agent's final response, skipping a last model call.

pub mod agent;
pub mod memory;
pub mod prompt;

pub use agent::{
    Agent, AgentConfig, AgentError, AgentExit, AgentMetadata, AgentOutput, ToolCallRecord,
};
pub use memory::ChatMemory;
pub use prompt::{StaticPrompt, SystemPromptSource};
