//! The object-safe [`Llm`] capability and its error type.
//!
//! Unlike a provider SDK surface, this trait is deliberately object-safe:
//! agents and services hold `Arc<dyn Llm>` so runs can swap providers (or a
//! scripted replay) through the resource registry.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChatMessage, LlmRequest, LlmResponse};

/// Errors from LLM providers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Authentication/authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// Could not parse the provider's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The response did not satisfy a declared result schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl LlmError {
    /// Whether retrying this request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited | LlmError::RequestFailed(_))
    }
}

/// Structured-prediction LLM capability.
///
/// `chat` is the single required operation; `complete` and
/// `structured_predict` are provided conveniences layered on top of it.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Send one conversation turn to the model.
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// One-shot text completion for a bare prompt.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = LlmRequest::from_messages(vec![ChatMessage::user(prompt)]);
        let response = self.chat(request).await?;
        Ok(response.text())
    }

    /// Ask for a response conforming to `schema` and parse it as JSON.
    async fn structured_predict(
        &self,
        schema: &serde_json::Value,
        messages: Vec<ChatMessage>,
    ) -> Result<serde_json::Value, LlmError> {
        let mut request = LlmRequest::from_messages(messages);
        request.response_schema = Some(schema.clone());
        let response = self.chat(request).await?;
        let text = response.text();
        serde_json::from_str(strip_code_fences(&text))
            .map_err(|e| LlmError::SchemaMismatch(format!("{e}: {text}")))
    }
}

/// Models often wrap JSON in markdown fences; tolerate that.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Wrapper retrying the inner capability once on transient failures.
pub struct Retrying<L> {
    inner: L,
}

impl<L: Llm> Retrying<L> {
    /// Wrap an LLM with one-shot retry semantics.
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: Llm> Llm for Retrying<L> {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        match self.inner.chat(request.clone()).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "transient LLM failure, retrying once");
                self.inner.chat(request).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentPart, StopReason, TokenUsage};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyLlm {
        calls: AtomicU32,
        fail_times: u32,
        error: fn() -> LlmError,
    }

    #[async_trait]
    impl Llm for FlakyLlm {
        async fn chat(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err((self.error)());
            }
            Ok(LlmResponse {
                content: vec![ContentPart::Text {
                    text: "ok".into(),
                }],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
                model: "flaky".into(),
                cost: None,
            })
        }
    }

    fn request() -> LlmRequest {
        LlmRequest::from_messages(vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn retrying_retries_transient_failures_once() {
        let llm = Retrying::new(FlakyLlm {
            calls: AtomicU32::new(0),
            fail_times: 1,
            error: || LlmError::RateLimited,
        });
        let response = llm.chat(request()).await.unwrap();
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn retrying_gives_up_after_one_retry() {
        let llm = Retrying::new(FlakyLlm {
            calls: AtomicU32::new(0),
            fail_times: 2,
            error: || LlmError::RateLimited,
        });
        assert!(llm.chat(request()).await.is_err());
    }

    #[tokio::test]
    async fn retrying_passes_through_permanent_failures() {
        let flaky = FlakyLlm {
            calls: AtomicU32::new(0),
            fail_times: 1,
            error: || LlmError::AuthFailed("bad key".into()),
        };
        let llm = Retrying::new(flaky);
        assert!(llm.chat(request()).await.is_err());
        assert_eq!(llm.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_retryability() {
        assert!(LlmError::RateLimited.is_retryable());
        assert!(LlmError::RequestFailed("timeout".into()).is_retryable());
        assert!(!LlmError::AuthFailed("bad key".into()).is_retryable());
        assert!(!LlmError::SchemaMismatch("x".into()).is_retryable());
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
