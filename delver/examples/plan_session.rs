//! Run the HITL planning workflow against a scripted model.
//!
//! ```sh
//! cargo run --example plan_session
//! ```

use std::sync::Arc;

use delver::prelude::*;
use delver::delver_core::memory::MemorySessionStore;
use delver::delver_llm::scripted::ScriptedLlm;
use serde_json::json;

#[tokio::main]
async fn main() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::structured_response(&json!({
            "decision": "propose_plan",
            "response": "Here is a three-question plan.",
            "plan": "1. How do solid-state and Li-ion energy densities compare?\n\
                     2. What does the safety record say for each chemistry?\n\
                     3. Which applications favor which chemistry?",
        })),
    ]));
    let sessions = Arc::new(MemorySessionStore::new());
    let config = ResearchConfig::for_tests();
    let collection = config.collections.research_collection.clone();

    let workflow = planner_workflow(llm, Arc::clone(&sessions) as _, config);
    let mut handler = workflow.run(PlanStartEvent {
        initial_query: "Compare solid-state and Li-ion batteries".into(),
    });

    while let Some(event) = handler.next_event().await {
        if let Some(input) = event.as_any().downcast_ref::<InputRequiredEvent>() {
            println!("--- plan review requested ---\n{}\n", input.prefix);
            // A real driver reads stdin here; the example approves directly.
            handler.send_event(HumanResponseEvent {
                waiter_id: input.waiter_id.clone(),
                response: "accept".into(),
            });
        } else {
            println!("Event: {} {:?}", event.name(), event);
        }
    }

    let result = handler.finish().await.expect("planning run failed");
    println!("Result: {result}");
    println!(
        "Persisted sessions: {}",
        sessions.records(&collection).await.len()
    );
}
