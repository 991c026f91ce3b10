//! The HITL planning workflow.
//!
//! Four steps: `init_session` seeds state and memory, `run_planner_llm`
//! asks the structured model for a [`PlannerAgentOutput`],
//! `apply_plan_update` either asks the human for review or finalizes, and
//! `on_human_response` routes the human's reply. Finalization persists the
//! session record idempotently and stops the run.

use std::sync::Arc;

use delver_agent::ChatMemory;
use delver_core::capability::{SessionRecord, SessionStore};
use delver_core::error::WorkflowError;
use delver_core::event::{HumanResponseEvent, InputRequiredEvent, StopEvent};
use delver_llm::provider::Llm;
use delver_llm::structured::structured_predict;
use delver_llm::types::ChatMessage;
use delver_workflow::{RunContext, StepOutput, Workflow, emit};

use super::models::{PlanStatus, PlannerAgentOutput, PlannerDecision, ResearchPlanState};
use super::prompts::build_planner_system_prompt;
use crate::config::ResearchConfig;
use crate::events::{
    PlanStartEvent, PlannerOutputEvent, PlannerStatusEvent, PlannerTurnEvent, StatusLevel,
};

/// Store key for the planner's run state.
pub const PLAN_STATE_KEY: &str = "research_plan_state";
/// Store key for the planner's chat memory.
pub const PLANNER_MEMORY_KEY: &str = "planner_memory";
/// Waiter id correlating plan-review responses.
pub const PLANNER_WAITER_ID: &str = "planner";

/// The planning LLM resource.
pub struct PlannerLlm(pub Arc<dyn Llm>);

/// The session persistence resource.
pub struct PlannerSessions(pub Arc<dyn SessionStore>);

async fn load_plan_state(ctx: &RunContext) -> Result<ResearchPlanState, WorkflowError> {
    Ok(ctx
        .store()
        .get_json::<ResearchPlanState>(PLAN_STATE_KEY)
        .await?
        .unwrap_or_default())
}

async fn load_memory(ctx: &RunContext) -> Result<ChatMemory, WorkflowError> {
    Ok(ctx
        .store()
        .get_json::<ChatMemory>(PLANNER_MEMORY_KEY)
        .await?
        .unwrap_or_default())
}

/// Build the planning workflow over its three injected resources.
///
/// No run timeout: the workflow legitimately idles while a human thinks.
pub fn planner_workflow(
    llm: Arc<dyn Llm>,
    sessions: Arc<dyn SessionStore>,
    config: ResearchConfig,
) -> Workflow {
    let mut wf = Workflow::new();

    wf.resources_mut().provide::<PlannerLlm, _, _>(move |_| {
        let llm = Arc::clone(&llm);
        async move { Ok(PlannerLlm(llm)) }
    });
    wf.resources_mut().provide::<PlannerSessions, _, _>(move |_| {
        let sessions = Arc::clone(&sessions);
        async move { Ok(PlannerSessions(sessions)) }
    });
    wf.resources_mut().provide_value(config);

    wf.add_step("init_session", init_session);
    wf.add_step("run_planner_llm", run_planner_llm);
    wf.add_step("apply_plan_update", apply_plan_update);
    wf.add_step("on_human_response", on_human_response);
    wf
}

async fn init_session(
    ctx: Arc<RunContext>,
    ev: PlanStartEvent,
) -> Result<StepOutput, WorkflowError> {
    let state = ResearchPlanState {
        initial_query: Some(ev.initial_query.clone()),
        research_id: Some(uuid::Uuid::new_v4().to_string()),
        plan_text: None,
        text_config: Default::default(),
        status: PlanStatus::Planning,
    };
    tracing::info!(research_id = state.research_id.as_deref(), "planning session started");
    ctx.store().set_json(PLAN_STATE_KEY, &state).await?;
    ctx.store()
        .set_json(PLANNER_MEMORY_KEY, &ChatMemory::new())
        .await?;
    Ok(emit(PlannerTurnEvent {
        message: ev.initial_query,
    }))
}

async fn run_planner_llm(
    ctx: Arc<RunContext>,
    ev: PlannerTurnEvent,
) -> Result<StepOutput, WorkflowError> {
    let llm = ctx.resource::<PlannerLlm>().await?;
    let state = load_plan_state(&ctx).await?;
    let memory = load_memory(&ctx).await?;

    let system = build_planner_system_prompt(
        state.plan_text.as_deref().unwrap_or(""),
        &state.text_config,
    );
    let mut messages = vec![ChatMessage::system(system)];
    messages.extend(memory.history().iter().cloned());
    messages.push(ChatMessage::user(ev.message.clone()));

    let output: PlannerAgentOutput = match structured_predict(llm.0.as_ref(), messages).await {
        Ok(output) => output,
        Err(error) => {
            ctx.write_event_to_stream(PlannerStatusEvent {
                level: StatusLevel::Error,
                message: format!("planner model call failed: {error}"),
            });
            return Err(WorkflowError::Other(Box::new(error)));
        }
    };

    Ok(emit(PlannerOutputEvent {
        output,
        user_message: ev.message,
    }))
}

async fn apply_plan_update(
    ctx: Arc<RunContext>,
    ev: PlannerOutputEvent,
) -> Result<StepOutput, WorkflowError> {
    let mut memory = load_memory(&ctx).await?;
    memory.push_user(&ev.user_message);
    memory.push_assistant(&ev.output.response);
    ctx.store().set_json(PLANNER_MEMORY_KEY, &memory).await?;

    let mut state = load_plan_state(&ctx).await?;
    state.plan_text = Some(ev.output.plan.clone());
    state.text_config = ev.output.text_config.clone();
    ctx.store().set_json(PLAN_STATE_KEY, &state).await?;

    if ev.output.decision != PlannerDecision::Finalize {
        let prefix = format!(
            "Current Plan:\n{}\n\n-----------------------\n\n{}\n\n\
             If the actual plan is good enough, type 'accept' to approve, or reply with edits.",
            ev.output.plan, ev.output.response
        );
        return Ok(emit(InputRequiredEvent {
            waiter_id: PLANNER_WAITER_ID.to_string(),
            prefix,
        }));
    }

    finalize_run(&ctx).await
}

async fn on_human_response(
    ctx: Arc<RunContext>,
    ev: HumanResponseEvent,
) -> Result<StepOutput, WorkflowError> {
    let normalized = ev.response.trim().to_lowercase();
    if normalized == "accept" {
        let state = load_plan_state(&ctx).await?;
        if state
            .plan_text
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
        {
            return finalize_run(&ctx).await;
        }
        // Nothing to accept yet: treat the reply as another planning turn.
    }
    Ok(emit(PlannerTurnEvent {
        message: ev.response,
    }))
}

async fn finalize_run(ctx: &Arc<RunContext>) -> Result<StepOutput, WorkflowError> {
    let sessions = ctx.resource::<PlannerSessions>().await?;
    let config = ctx.resource::<ResearchConfig>().await?;

    let mut state = load_plan_state(ctx).await?;
    state.status = PlanStatus::Finalized;
    ctx.store().set_json(PLAN_STATE_KEY, &state).await?;

    let research_id = state.research_id.clone().ok_or_else(|| {
        WorkflowError::Invariant("research_id must be set before persistence".into())
    })?;
    let plan = state.plan_text.clone().unwrap_or_default();
    let record = SessionRecord {
        research_id: research_id.clone(),
        status: state.status.into(),
        initial_query: state.initial_query.clone().unwrap_or_default(),
        plan: plan.clone(),
        text_config: serde_json::to_value(&state.text_config)
            .unwrap_or(serde_json::Value::Null),
    };

    let item_id = match sessions
        .0
        .upsert(&config.collections.research_collection, record)
        .await
    {
        Ok(item_id) => item_id,
        Err(error) => {
            ctx.write_event_to_stream(PlannerStatusEvent {
                level: StatusLevel::Error,
                message: format!("failed to persist session: {error}"),
            });
            return Err(WorkflowError::Other(Box::new(error)));
        }
    };
    tracing::info!(%research_id, %item_id, "planning session finalized");

    Ok(emit(StopEvent::new(serde_json::json!({
        "research_id": research_id,
        "status": state.status.as_str(),
        "plan": plan,
        "session_item_id": item_id,
    }))))
}
