//! Agent loop behavior against a scripted model.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use delver_agent::{Agent, AgentConfig, AgentError, AgentExit, ChatMemory, SystemPromptSource};
use delver_llm::scripted::ScriptedLlm;
use delver_llm::types::{ContentPart, Role};
use delver_tool::{ToolDyn, ToolError, ToolRegistry};
use serde_json::json;

struct EchoTool;

impl ToolDyn for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echoes input"
    }
    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object"})
    }
    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move { Ok(json!({"echoed": input})) })
    }
}

struct FinalizeTool;

impl ToolDyn for FinalizeTool {
    fn name(&self) -> &str {
        "finalize_research"
    }
    fn description(&self) -> &str {
        "Summarizes and ends the run"
    }
    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object"})
    }
    fn return_direct(&self) -> bool {
        true
    }
    fn call(
        &self,
        _input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move { Ok(json!("final summary")) })
    }
}

struct FailingTool;

impl ToolDyn for FailingTool {
    fn name(&self) -> &str {
        "flaky"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object"})
    }
    fn call(
        &self,
        _input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
        Box::pin(async move { Err(ToolError::ExecutionFailed("backend down".into())) })
    }
}

fn tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool));
    registry.register(Arc::new(FinalizeTool));
    registry.register(Arc::new(FailingTool));
    registry
}

#[tokio::test]
async fn plain_completion_ends_the_loop() {
    let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::text_response("Hello!")]));
    let agent = Agent::new(llm, tools(), "be helpful", AgentConfig::default());

    let mut memory = ChatMemory::new();
    let output = agent.run(&mut memory, "Hi").await.unwrap();

    assert_eq!(output.exit, AgentExit::Complete);
    assert_eq!(output.response, "Hello!");
    assert_eq!(output.metadata.iterations, 1);
    // user + assistant
    assert_eq!(memory.len(), 2);
}

#[tokio::test]
async fn tool_call_then_followup() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call_response("tu_1", "echo", json!({"msg": "test"})),
        ScriptedLlm::text_response("Done."),
    ]));
    let agent = Agent::new(llm, tools(), "be helpful", AgentConfig::default());

    let mut memory = ChatMemory::new();
    let output = agent.run(&mut memory, "Use echo").await.unwrap();

    assert_eq!(output.exit, AgentExit::Complete);
    assert_eq!(output.metadata.iterations, 2);
    assert_eq!(output.metadata.tools_called.len(), 1);
    assert_eq!(output.metadata.tools_called[0].name, "echo");
    assert!(output.metadata.tools_called[0].success);
    // user, assistant(tool_use), user(tool_result), assistant
    assert_eq!(memory.len(), 4);
}

#[tokio::test]
async fn parallel_tool_calls_all_recorded_before_next_call() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_calls_response(vec![
            ("tu_1".into(), "echo".into(), json!({"n": 1})),
            ("tu_2".into(), "echo".into(), json!({"n": 2})),
        ]),
        ScriptedLlm::text_response("Both done."),
    ]));
    let llm_probe = Arc::clone(&llm);
    let agent = Agent::new(llm, tools(), "be helpful", AgentConfig::default());

    let mut memory = ChatMemory::new();
    let output = agent.run(&mut memory, "two at once").await.unwrap();

    assert_eq!(output.metadata.tools_called.len(), 2);
    // The second request carries both tool results in a single message.
    let requests = llm_probe.requests();
    let results_msg = &requests[1].messages[requests[1].messages.len() - 1];
    assert_eq!(results_msg.role, Role::User);
    let result_count = results_msg
        .content
        .iter()
        .filter(|p| matches!(p, ContentPart::ToolResult { .. }))
        .count();
    assert_eq!(result_count, 2);
}

#[tokio::test]
async fn return_direct_tool_short_circuits() {
    let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::tool_call_response(
        "tu_1",
        "finalize_research",
        json!({}),
    )]));
    let llm_probe = Arc::clone(&llm);
    let agent = Agent::new(llm, tools(), "be helpful", AgentConfig::default());

    let mut memory = ChatMemory::new();
    let output = agent.run(&mut memory, "wrap it up").await.unwrap();

    assert_eq!(output.exit, AgentExit::ReturnDirect);
    assert_eq!(output.response, "final summary");
    // No second model call after a return-direct tool.
    assert_eq!(llm_probe.calls(), 1);
}

#[tokio::test]
async fn tool_errors_are_reported_to_the_model_not_fatal() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call_response("tu_1", "flaky", json!({})),
        ScriptedLlm::text_response("Saw the error."),
    ]));
    let llm_probe = Arc::clone(&llm);
    let agent = Agent::new(llm, tools(), "be helpful", AgentConfig::default());

    let mut memory = ChatMemory::new();
    let output = agent.run(&mut memory, "try it").await.unwrap();

    assert_eq!(output.exit, AgentExit::Complete);
    assert!(!output.metadata.tools_called[0].success);

    let requests = llm_probe.requests();
    let results_msg = requests[1].messages.last().unwrap();
    assert!(results_msg.content.iter().any(|p| matches!(
        p,
        ContentPart::ToolResult { is_error: true, .. }
    )));
}

#[tokio::test]
async fn unknown_tool_becomes_an_error_result() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call_response("tu_1", "nonexistent", json!({})),
        ScriptedLlm::text_response("ok"),
    ]));
    let agent = Agent::new(llm, tools(), "be helpful", AgentConfig::default());

    let mut memory = ChatMemory::new();
    let output = agent.run(&mut memory, "call it").await.unwrap();
    assert_eq!(output.metadata.tools_called.len(), 1);
    assert!(!output.metadata.tools_called[0].success);
}

#[tokio::test]
async fn iteration_limit_is_enforced() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call_response("tu_1", "echo", json!({})),
        ScriptedLlm::tool_call_response("tu_2", "echo", json!({})),
        ScriptedLlm::tool_call_response("tu_3", "echo", json!({})),
    ]));
    let agent = Agent::new(
        llm,
        tools(),
        "be helpful",
        AgentConfig {
            max_iterations: 2,
            ..Default::default()
        },
    );

    let mut memory = ChatMemory::new();
    let result = agent.run(&mut memory, "loop forever").await;
    assert!(matches!(
        result,
        Err(AgentError::IterationLimitExceeded { limit: 2 })
    ));
}

#[tokio::test]
async fn hot_prompt_is_rerendered_every_iteration() {
    struct CountingPrompt(AtomicU32);

    #[async_trait::async_trait]
    impl SystemPromptSource for CountingPrompt {
        async fn render(&self) -> Result<String, AgentError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("iteration {n}"))
        }
    }

    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call_response("tu_1", "echo", json!({})),
        ScriptedLlm::text_response("done"),
    ]));
    let llm_probe = Arc::clone(&llm);
    let agent = Agent::with_prompt_source(
        llm,
        tools(),
        Arc::new(CountingPrompt(AtomicU32::new(0))),
        AgentConfig::default(),
    );

    let mut memory = ChatMemory::new();
    agent.run(&mut memory, "go").await.unwrap();

    let requests = llm_probe.requests();
    assert_eq!(requests[0].messages[0].as_text().unwrap(), "iteration 0");
    assert_eq!(requests[1].messages[0].as_text().unwrap(), "iteration 1");
    // Memory never stores the system message; it is injected per call.
    assert_eq!(requests[1].messages[0].role, Role::System);
    assert!(memory.history().iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn usage_accumulates_across_iterations() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call_response("tu_1", "echo", json!({})),
        ScriptedLlm::text_response("done"),
    ]));
    let agent = Agent::new(llm, tools(), "be helpful", AgentConfig::default());

    let mut memory = ChatMemory::new();
    let output = agent.run(&mut memory, "go").await.unwrap();
    assert_eq!(output.metadata.tokens_in, 20);
    assert_eq!(output.metadata.tokens_out, 20);
}
