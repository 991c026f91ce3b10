#![deny(missing_docs)]
//! # delver-llm — the LLM capability for delver
//!
//! Conversation types, the object-safe [`Llm`] trait with chat / complete /
//! structured prediction, a one-shot [`Retrying`] wrapper for transient
//! failures, and a [`scripted::ScriptedLlm`] replay for tests and offline
//! runs. Concrete providers live outside the core and implement [`Llm`] at
//! their boundary.

pub mod provider;
pub mod scripted;
pub mod structured;
pub mod types;

pub use provider::{Llm, LlmError, Retrying};
pub use structured::{schema_of, structured_predict};
pub use types::{
    ChatMessage, ContentPart, LlmRequest, LlmResponse, Role, StopReason, TokenUsage, ToolSchema,
};
