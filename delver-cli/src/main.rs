//! Command-line driver for the deep-research planning workflow.
//!
//! Reads a research query, streams workflow events to stdout as
//! `Event: <name> <fields>`, prompts on every `InputRequired`, and prints
//! the final result on `Stop`. Exit code 0 on completion; non-zero on
//! `Cancelled` / `Timeout` / `StepFailed`.

mod offline;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use delver_core::error::WorkflowError;
use delver_core::event::{HumanResponseEvent, InputRequiredEvent, StopEvent};
use delver_core::memory::MemorySessionStore;
use delver_research::events::PlanStartEvent;
use delver_research::planner::planner_workflow;
use delver_research::ResearchConfig;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "configs/config.json";
const CONFIG_SELECTOR: &str = "research";

fn load_config() -> ResearchConfig {
    match ResearchConfig::load(CONFIG_PATH, CONFIG_SELECTOR) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(%error, "falling back to built-in config");
            ResearchConfig::for_tests()
        }
    }
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim_end().to_string()),
        Err(_) => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = load_config();

    let query = match std::env::args().nth(1) {
        Some(query) => query,
        None => match read_line("You: ") {
            Some(query) if !query.trim().is_empty() => query,
            _ => {
                eprintln!("no query provided");
                return ExitCode::from(1);
            }
        },
    };

    let llm = offline::planner_llm(&config);
    let sessions = Arc::new(MemorySessionStore::new());

    let workflow = planner_workflow(llm, sessions, config);
    let mut handler = workflow.run(PlanStartEvent {
        initial_query: query,
    });

    while let Some(event) = handler.next_event().await {
        if let Some(input) = event.as_any().downcast_ref::<InputRequiredEvent>() {
            println!("\n{}", input.prefix);
            let Some(response) = read_line("You: ") else {
                handler.cancel();
                continue;
            };
            handler.send_event(HumanResponseEvent {
                waiter_id: input.waiter_id.clone(),
                response,
            });
        } else if let Some(stop) = event.as_any().downcast_ref::<StopEvent>() {
            println!("Event: StopEvent {}", stop.result);
        } else {
            println!("Event: {} {:?}", event.name(), event);
        }
    }

    match handler.finish().await {
        Ok(result) => {
            println!("\nWorkflow finished. Result: {result}");
            ExitCode::SUCCESS
        }
        Err(WorkflowError::Cancelled) => {
            eprintln!("workflow cancelled");
            ExitCode::from(2)
        }
        Err(WorkflowError::Timeout) => {
            eprintln!("workflow timed out");
            ExitCode::from(3)
        }
        Err(error) => {
            eprintln!("workflow failed: {error}");
            ExitCode::from(1)
        }
    }
}
