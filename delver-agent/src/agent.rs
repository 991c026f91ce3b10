//! The tool-calling agent loop.
//!
//! One iteration: render the system message (hot or static), send
//! `[system] + memory` to the model, then either finish on a text answer
//! or execute the requested tool calls (concurrently when the model asks
//! for several) and loop. A tool marked return-direct short-circuits the
//! loop with its output as the agent's final response.

use std::sync::Arc;
use std::time::Instant;

use delver_core::error::StateError;
use delver_llm::provider::{Llm, LlmError};
use delver_llm::types::{
    ChatMessage, ContentPart, LlmRequest, LlmResponse, Role, StopReason, ToolSchema,
};
use delver_tool::{ToolError, ToolRegistry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::ChatMemory;
use crate::prompt::{StaticPrompt, SystemPromptSource};

/// Agent loop errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model call failed.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    /// The loop hit its iteration cap.
    #[error("iteration limit exceeded after {limit} iterations")]
    IterationLimitExceeded {
        /// The configured cap.
        limit: u32,
    },

    /// Reading state for a hot prompt failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Programmer error — broken loop contract.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Static configuration for an [`Agent`].
pub struct AgentConfig {
    /// Agent name, used in tracing spans.
    pub name: String,
    /// Model identifier override (None = capability default).
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum output tokens per model call.
    pub max_tokens: Option<u32>,
    /// Iteration cap for the loop.
    pub max_iterations: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".into(),
            model: None,
            temperature: None,
            max_tokens: None,
            max_iterations: 20,
        }
    }
}

/// How an agent run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentExit {
    /// The model produced a final text answer.
    Complete,
    /// A return-direct tool terminated the loop.
    ReturnDirect,
}

/// Record of a single tool invocation within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name.
    pub name: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the call succeeded.
    pub success: bool,
}

/// Execution metadata for one agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Input tokens consumed across all iterations.
    pub tokens_in: u64,
    /// Output tokens generated across all iterations.
    pub tokens_out: u64,
    /// Accumulated cost in USD (zero when the provider reports none).
    pub cost: Decimal,
    /// Loop iterations used.
    pub iterations: u32,
    /// Every tool call made, in completion order.
    pub tools_called: Vec<ToolCallRecord>,
}

/// Output of one agent run.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    /// The agent's final response text.
    pub response: String,
    /// How the run ended.
    pub exit: AgentExit,
    /// Execution metadata.
    pub metadata: AgentMetadata,
}

/// A tool-calling agent bound to an LLM, a tool set, and a prompt source.
pub struct Agent {
    llm: Arc<dyn Llm>,
    tools: ToolRegistry,
    prompt: Arc<dyn SystemPromptSource>,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent with a static system prompt.
    pub fn new(
        llm: Arc<dyn Llm>,
        tools: ToolRegistry,
        system_prompt: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            tools,
            prompt: Arc::new(StaticPrompt(system_prompt.into())),
            config,
        }
    }

    /// Create an agent whose system prompt re-renders every iteration.
    pub fn with_prompt_source(
        llm: Arc<dyn Llm>,
        tools: ToolRegistry,
        prompt: Arc<dyn SystemPromptSource>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            tools,
            prompt,
            config,
        }
    }

    fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Run the loop for one user message, mutating `memory` in place.
    pub async fn run(
        &self,
        memory: &mut ChatMemory,
        user_message: impl Into<String>,
    ) -> Result<AgentOutput, AgentError> {
        memory.push_user(user_message);

        let schemas = self.tool_schemas();
        let mut metadata = AgentMetadata::default();

        loop {
            if metadata.iterations >= self.config.max_iterations {
                return Err(AgentError::IterationLimitExceeded {
                    limit: self.config.max_iterations,
                });
            }
            metadata.iterations += 1;

            // 1. Hot system prompt: rendered immediately before the call.
            let system = self.prompt.render().await?;
            let mut messages = Vec::with_capacity(memory.len() + 1);
            messages.push(ChatMessage::system(system));
            messages.extend(memory.history().iter().cloned());
            if messages.first().map(|m| m.role) != Some(Role::System) {
                return Err(AgentError::Invariant(
                    "agent input must start with a system message".into(),
                ));
            }

            let request = LlmRequest {
                model: self.config.model.clone(),
                messages,
                tools: schemas.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                response_schema: None,
            };

            tracing::debug!(
                agent = %self.config.name,
                iteration = metadata.iterations,
                "calling model"
            );
            let response = self.llm.chat(request).await?;
            metadata.tokens_in += response.usage.input_tokens;
            metadata.tokens_out += response.usage.output_tokens;
            if let Some(cost) = response.cost {
                metadata.cost += cost;
            }

            match response.stop_reason {
                StopReason::MaxTokens => {
                    return Err(AgentError::Llm(LlmError::InvalidResponse(
                        "output truncated (max_tokens)".into(),
                    )));
                }
                StopReason::ContentFilter => {
                    return Err(AgentError::Llm(LlmError::InvalidResponse(
                        "content filtered".into(),
                    )));
                }
                StopReason::EndTurn => {
                    let text = response.text();
                    memory.push_assistant(text.clone());
                    return Ok(AgentOutput {
                        response: text,
                        exit: AgentExit::Complete,
                        metadata,
                    });
                }
                StopReason::ToolUse => {
                    if let Some(direct) = self.execute_tools(memory, &response, &mut metadata).await
                    {
                        return Ok(AgentOutput {
                            response: direct,
                            exit: AgentExit::ReturnDirect,
                            metadata,
                        });
                    }
                }
            }
        }
    }

    /// Execute all tool calls from one response concurrently, append the
    /// exchange to memory, and return the output of a return-direct tool
    /// if one ran.
    async fn execute_tools(
        &self,
        memory: &mut ChatMemory,
        response: &LlmResponse,
        metadata: &mut AgentMetadata,
    ) -> Option<String> {
        let uses = response.tool_uses();
        memory.push(ChatMessage {
            role: Role::Assistant,
            content: response.content.clone(),
        });

        let calls = uses.into_iter().map(|(id, name, input)| {
            let tool = self.tools.get(&name).cloned();
            async move {
                let started = Instant::now();
                let direct = tool.as_ref().is_some_and(|t| t.return_direct());
                let result = match tool {
                    Some(tool) => tool.call(input).await,
                    None => Err(ToolError::NotFound(name.clone())),
                };
                (id, name, direct, result, started.elapsed())
            }
        });
        let outcomes = futures_util::future::join_all(calls).await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut direct_output = None;
        for (id, name, direct, result, elapsed) in outcomes {
            let (content, is_error) = match &result {
                Ok(value) => (render_tool_output(value), false),
                Err(error) => (error.to_string(), true),
            };
            tracing::debug!(
                agent = %self.config.name,
                tool = %name,
                success = !is_error,
                "tool call finished"
            );
            metadata.tools_called.push(ToolCallRecord {
                name: name.clone(),
                duration_ms: elapsed.as_millis() as u64,
                success: !is_error,
            });
            if direct && !is_error && direct_output.is_none() {
                direct_output = Some(content.clone());
            }
            results.push(ContentPart::ToolResult {
                tool_use_id: id,
                content,
                is_error,
            });
        }

        // Results append atomically before the next model call.
        memory.push(ChatMessage {
            role: Role::User,
            content: results,
        });

        direct_output
    }
}

/// Tool outputs are JSON values; strings pass through unquoted.
fn render_tool_output(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
