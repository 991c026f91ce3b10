//! The research execution workflow: approved plan in, cited report out.

use std::sync::Arc;
use std::time::Duration;

use delver_core::error::WorkflowError;
use delver_core::event::StopEvent;
use delver_llm::provider::Llm;
use delver_workflow::{RunContext, StepOutput, Workflow, emit};

use crate::config::ResearchConfig;
use crate::events::{OrchestratorTurnEvent, ResearchStartEvent};
use crate::orchestrator::orchestrator_agent;
use crate::state::{ArtifactStatus, ResearchState};
use crate::subagent::SubAgentRunner;

/// Everything the research workflow needs to build its agents.
#[derive(Clone)]
pub struct ResearchAgents {
    /// Orchestrator model.
    pub llm: Arc<dyn Llm>,
    /// Searcher sub-agent.
    pub searcher: Arc<dyn SubAgentRunner>,
    /// Writer sub-agent.
    pub writer: Arc<dyn SubAgentRunner>,
    /// Shared research configuration.
    pub config: ResearchConfig,
}

/// Build the research workflow around an orchestrator run.
pub fn research_workflow(agents: ResearchAgents) -> Workflow {
    let timeout = Duration::from_secs(agents.config.settings.timeout_seconds);
    let mut wf = Workflow::new().with_timeout(timeout);
    wf.resources_mut().provide_value(agents);
    wf.add_step("init_research", init_research);
    wf.add_step("run_orchestrator", run_orchestrator);
    wf
}

async fn init_research(
    ctx: Arc<RunContext>,
    ev: ResearchStartEvent,
) -> Result<StepOutput, WorkflowError> {
    tracing::info!(research_id = ev.research_id.as_deref(), "research run started");
    ResearchState::edit(&ctx, |s| {
        s.orchestrator.research_plan = ev.plan.clone();
        s.research_artifact.status = ArtifactStatus::Running;
    })
    .await?;
    Ok(emit(OrchestratorTurnEvent {
        instruction: "Produce the report by following the research plan until every item is satisfied."
            .to_string(),
    }))
}

async fn run_orchestrator(
    ctx: Arc<RunContext>,
    ev: OrchestratorTurnEvent,
) -> Result<StepOutput, WorkflowError> {
    let agents = ctx.resource::<ResearchAgents>().await?;
    let agent = orchestrator_agent(
        Arc::clone(&ctx),
        Arc::clone(&agents.llm),
        Arc::clone(&agents.searcher),
        Arc::clone(&agents.writer),
        &agents.config,
    );

    let mut memory = delver_agent::ChatMemory::new();
    let result = agent.run(&mut memory, ev.instruction).await;

    match result {
        Ok(output) => {
            let report = ResearchState::edit(&ctx, |s| {
                s.research_artifact.status = ArtifactStatus::Completed;
                s.research_artifact.content.clone()
            })
            .await?;
            tracing::info!(iterations = output.metadata.iterations, "research run completed");
            Ok(emit(StopEvent::new(serde_json::json!({
                "status": "completed",
                "report": report,
                "response": output.response,
            }))))
        }
        Err(error) => {
            ResearchState::edit(&ctx, |s| {
                s.research_artifact.status = ArtifactStatus::Failed;
            })
            .await?;
            Err(WorkflowError::Other(Box::new(error)))
        }
    }
}
