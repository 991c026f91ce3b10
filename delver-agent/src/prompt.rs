//! The hot-system-prompt hook.
//!
//! An agent renders its system message from a [`SystemPromptSource`]
//! immediately before every model call. The static default returns a fixed
//! string; state-reading sources (orchestrator, writer) re-render from the
//! live run state so a changed report or evidence set is visible on the
//! very next iteration instead of a stale cached prompt.

use async_trait::async_trait;

use crate::agent::AgentError;

/// Renders the system message for the next model call.
#[async_trait]
pub trait SystemPromptSource: Send + Sync {
    /// Produce the system message text from current state.
    async fn render(&self) -> Result<String, AgentError>;
}

/// Fixed system prompt; the default for agents without live state.
pub struct StaticPrompt(pub String);

#[async_trait]
impl SystemPromptSource for StaticPrompt {
    async fn render(&self) -> Result<String, AgentError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_prompt_renders_itself() {
        let prompt = StaticPrompt("You are a researcher.".into());
        assert_eq!(prompt.render().await.unwrap(), "You are a researcher.");
    }
}
