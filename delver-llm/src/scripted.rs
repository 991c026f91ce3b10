//! Scripted LLM for tests and offline runs.
//!
//! Replays a queue of canned responses in order. An exhausted queue is an
//! invalid-response error rather than a panic so misconfigured scripts show
//! up as failures in the calling code path.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::{Llm, LlmError};
use crate::types::{ContentPart, LlmRequest, LlmResponse, StopReason, TokenUsage};

/// LLM that replays queued responses in order.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<LlmResponse>>,
    requests: Mutex<Vec<LlmRequest>>,
    calls: AtomicU32,
}

impl ScriptedLlm {
    /// Queue responses, first queued served first.
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of `chat` calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// A plain end-turn text response.
    pub fn text_response(text: &str) -> LlmResponse {
        LlmResponse {
            content: vec![ContentPart::Text {
                text: text.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
            model: "scripted".into(),
            cost: None,
        }
    }

    /// A response requesting a single tool call.
    pub fn tool_call_response(id: &str, name: &str, input: Value) -> LlmResponse {
        Self::tool_calls_response(vec![(id.to_string(), name.to_string(), input)])
    }

    /// A response requesting several tool calls at once.
    pub fn tool_calls_response(calls: Vec<(String, String, Value)>) -> LlmResponse {
        LlmResponse {
            content: calls
                .into_iter()
                .map(|(id, name, input)| ContentPart::ToolUse { id, name, input })
                .collect(),
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 15,
            },
            model: "scripted".into(),
            cost: None,
        }
    }

    /// A structured response: the value serialized as the response text.
    pub fn structured_response(value: &Value) -> LlmResponse {
        Self::text_response(&value.to_string())
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("scripted response queue exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use serde_json::json;

    #[tokio::test]
    async fn replays_in_order_then_errors() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::text_response("first"),
            ScriptedLlm::tool_call_response("tu_1", "web_search", json!({"query": "q"})),
        ]);

        let r1 = llm
            .chat(LlmRequest::from_messages(vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(r1.text(), "first");

        let r2 = llm
            .chat(LlmRequest::from_messages(vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(r2.stop_reason, StopReason::ToolUse);
        assert_eq!(r2.tool_uses()[0].1, "web_search");

        assert!(
            llm.chat(LlmRequest::from_messages(vec![ChatMessage::user("hi")]))
                .await
                .is_err()
        );
        assert_eq!(llm.calls(), 3);
    }
}
