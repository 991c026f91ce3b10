//! Step registration and the run loop.
//!
//! A workflow is a set of steps, each keyed by the event type it consumes.
//! The runtime routes every dispatched event to all steps whose input type
//! matches, running them as independent tasks. A step returns at most one
//! event; returning `None` ends that branch. The run completes when a
//! [`StopEvent`] is produced, fails when a step errors, and suspends while
//! an [`InputRequiredEvent`] awaits an external response.

use std::any::TypeId;
use std::sync::Arc;
use std::time::Duration;

use delver_core::error::WorkflowError;
use delver_core::event::{InputRequiredEvent, StepFailedEvent, StopEvent, WorkflowEvent};
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::context::{Dispatched, RunContext};
use crate::resources::ResourceRegistry;
use crate::stream::EventStream;

/// A step's produced event, or `None` to end the branch.
pub type StepOutput = Option<Box<dyn WorkflowEvent>>;

/// Box an event for return from a step.
pub fn emit<E: WorkflowEvent>(event: E) -> StepOutput {
    Some(Box::new(event))
}

type StepFn = Arc<
    dyn Fn(Arc<RunContext>, Arc<dyn WorkflowEvent>) -> BoxFuture<'static, Result<StepOutput, WorkflowError>>
        + Send
        + Sync,
>;

struct StepEntry {
    name: String,
    input: TypeId,
    run: StepFn,
}

/// A workflow definition: steps, resource factories, optional timeout.
#[derive(Default)]
pub struct Workflow {
    steps: Vec<StepEntry>,
    resources: ResourceRegistry,
    timeout: Option<Duration>,
}

impl Workflow {
    /// Create an empty workflow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-run timeout. Exceeding it cancels all in-flight steps.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mutable access to the resource registry.
    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    /// Register a step consuming events of type `E`.
    pub fn add_step<E, F, Fut>(&mut self, name: impl Into<String>, step: F) -> &mut Self
    where
        E: WorkflowEvent + Clone,
        F: Fn(Arc<RunContext>, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput, WorkflowError>> + Send + 'static,
    {
        let step = Arc::new(step);
        let run: StepFn = Arc::new(move |ctx, event| {
            let step = Arc::clone(&step);
            let typed = event.as_any().downcast_ref::<E>().cloned();
            Box::pin(async move {
                let typed = typed.ok_or_else(|| {
                    WorkflowError::Invariant("dispatched event type does not match step input".into())
                })?;
                step(ctx, typed).await
            })
        });
        self.steps.push(StepEntry {
            name: name.into(),
            input: TypeId::of::<E>(),
            run,
        });
        self
    }

    /// Start the workflow with `start` as the initial event.
    pub fn run<E: WorkflowEvent>(self, start: E) -> WorkflowHandler {
        let (stream, stream_rx) = EventStream::channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let ctx = Arc::new(RunContext::new(
            stream.clone(),
            dispatch_tx.clone(),
            self.resources.into_resources(),
            cancel.clone(),
        ));

        let timed_out = Arc::new(std::sync::atomic::AtomicBool::new(false));
        if let Some(timeout) = self.timeout {
            let cancel = cancel.clone();
            let timed_out = Arc::clone(&timed_out);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        timed_out.store(true, std::sync::atomic::Ordering::SeqCst);
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            });
        }

        let _ = dispatch_tx.send(Dispatched::Internal(Box::new(start)));

        let loop_ctx = Arc::clone(&ctx);
        let join = tokio::spawn(run_loop(
            self.steps,
            loop_ctx,
            dispatch_rx,
            stream,
            cancel,
            timed_out,
        ));

        WorkflowHandler {
            ctx,
            events: stream_rx,
            join,
        }
    }
}

/// Handle to a running workflow: event stream consumer, HITL input, result.
pub struct WorkflowHandler {
    ctx: Arc<RunContext>,
    events: mpsc::UnboundedReceiver<Box<dyn WorkflowEvent>>,
    join: tokio::task::JoinHandle<Result<serde_json::Value, WorkflowError>>,
}

impl WorkflowHandler {
    /// The run context (for state inspection and direct event delivery).
    pub fn ctx(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// Next streamed event, or `None` once the run closed the stream.
    pub async fn next_event(&mut self) -> Option<Box<dyn WorkflowEvent>> {
        self.events.recv().await
    }

    /// Deliver an external event (HITL driver path).
    pub fn send_event<E: WorkflowEvent>(&self, event: E) {
        self.ctx.send_event(event);
    }

    /// Cancel the run.
    pub fn cancel(&self) {
        self.ctx.cancellation().cancel();
    }

    /// Await the run's result.
    pub async fn finish(self) -> Result<serde_json::Value, WorkflowError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(WorkflowError::Invariant(format!("run loop task failed: {e}"))),
        }
    }
}

async fn run_loop(
    steps: Vec<StepEntry>,
    ctx: Arc<RunContext>,
    mut dispatch_rx: mpsc::UnboundedReceiver<Dispatched>,
    stream: EventStream,
    cancel: CancellationToken,
    timed_out: Arc<std::sync::atomic::AtomicBool>,
) -> Result<serde_json::Value, WorkflowError> {
    let steps = Arc::new(steps);
    let mut in_flight: JoinSet<(String, Result<StepOutput, WorkflowError>)> = JoinSet::new();
    let mut pending_inputs: usize = 0;

    let finish = |result: Result<serde_json::Value, WorkflowError>,
                  in_flight: &mut JoinSet<_>| {
        in_flight.abort_all();
        cancel.cancel();
        stream.close();
        result
    };

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let error = if timed_out.load(std::sync::atomic::Ordering::SeqCst) {
                    WorkflowError::Timeout
                } else {
                    WorkflowError::Cancelled
                };
                tracing::debug!(error = %error, "run cancelled");
                in_flight.abort_all();
                stream.close();
                return Err(error);
            }

            Some(dispatched) = dispatch_rx.recv() => {
                let event = match dispatched {
                    Dispatched::Internal(event) => event,
                    Dispatched::External(event) => {
                        pending_inputs = pending_inputs.saturating_sub(1);
                        event
                    }
                };

                if let Some(stop) = event.as_any().downcast_ref::<StopEvent>() {
                    let result = stop.result.clone();
                    stream.send(event);
                    return finish(Ok(result), &mut in_flight);
                }

                if let Some(input) = event.as_any().downcast_ref::<InputRequiredEvent>() {
                    tracing::debug!(waiter_id = %input.waiter_id, "run awaiting human input");
                    pending_inputs += 1;
                    stream.send(event);
                    continue;
                }

                let type_id = event.as_any().type_id();
                let matching: Vec<_> = steps
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.input == type_id)
                    .map(|(i, _)| i)
                    .collect();
                if matching.is_empty() {
                    tracing::trace!(event = event.name(), "no step consumes event; branch ends");
                    if in_flight.is_empty() && dispatch_rx.is_empty() && pending_inputs == 0 {
                        return finish(
                            Err(WorkflowError::Invariant(
                                "workflow became idle without producing a StopEvent".into(),
                            )),
                            &mut in_flight,
                        );
                    }
                } else {
                    let shared: Arc<dyn WorkflowEvent> = Arc::from(event);
                    for index in matching {
                        let steps = Arc::clone(&steps);
                        let ctx = Arc::clone(&ctx);
                        let shared = Arc::clone(&shared);
                        in_flight.spawn(async move {
                            let entry = &steps[index];
                            tracing::debug!(step = %entry.name, event = shared.name(), "step start");
                            let output = (entry.run)(ctx, shared).await;
                            (entry.name.clone(), output)
                        });
                    }
                }
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                match joined {
                    Ok((_, Ok(Some(event)))) => {
                        ctx_internal_dispatch(&ctx, event);
                    }
                    Ok((_, Ok(None))) => {}
                    Ok((name, Err(error))) => {
                        let failed = StepFailedEvent {
                            step: name.clone(),
                            kind: error_kind(&error).to_string(),
                            message: error.to_string(),
                        };
                        tracing::warn!(step = %name, error = %error, "step failed");
                        stream.send(Box::new(failed));
                        return finish(
                            Err(WorkflowError::Step { step: name, message: error.to_string() }),
                            &mut in_flight,
                        );
                    }
                    Err(join_error) if join_error.is_cancelled() => {}
                    Err(join_error) => {
                        return finish(
                            Err(WorkflowError::Step {
                                step: "<unknown>".into(),
                                message: format!("step task panicked: {join_error}"),
                            }),
                            &mut in_flight,
                        );
                    }
                }

                if in_flight.is_empty() && dispatch_rx.is_empty() && pending_inputs == 0 {
                    return finish(
                        Err(WorkflowError::Invariant(
                            "workflow became idle without producing a StopEvent".into(),
                        )),
                        &mut in_flight,
                    );
                }
            }
        }
    }
}

fn ctx_internal_dispatch(ctx: &Arc<RunContext>, event: Box<dyn WorkflowEvent>) {
    // Step outputs re-enter through the context's internal queue so waiters
    // never intercept them.
    ctx.dispatch_internal(event);
}

/// Stable error-kind labels for StepFailedEvent.
fn error_kind(error: &WorkflowError) -> &'static str {
    match error {
        WorkflowError::Cancelled => "Cancelled",
        WorkflowError::Timeout => "Timeout",
        WorkflowError::Step { .. } => "StepFailed",
        WorkflowError::ResourceMissing(_) => "ResourceMissing",
        WorkflowError::Invariant(_) => "Invariant",
        WorkflowError::State(_) => "State",
        _ => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_core::event::HumanResponseEvent;

    #[derive(Debug, Clone)]
    struct BeginEvent {
        query: String,
    }

    #[derive(Debug, Clone)]
    struct MiddleEvent {
        text: String,
    }

    fn linear_workflow() -> Workflow {
        let mut wf = Workflow::new();
        wf.add_step("first", |_ctx, ev: BeginEvent| async move {
            Ok(emit(MiddleEvent {
                text: format!("got {}", ev.query),
            }))
        });
        wf.add_step("second", |_ctx, ev: MiddleEvent| async move {
            Ok(emit(StopEvent::new(serde_json::json!({"text": ev.text}))))
        });
        wf
    }

    #[tokio::test]
    async fn linear_run_completes_with_stop_result() {
        let handler = linear_workflow().run(BeginEvent { query: "q".into() });
        let result = handler.finish().await.unwrap();
        assert_eq!(result["text"], "got q");
    }

    #[tokio::test]
    async fn stop_event_is_streamed_then_stream_closes() {
        let mut handler = linear_workflow().run(BeginEvent { query: "q".into() });
        let mut saw_stop = false;
        while let Some(ev) = handler.next_event().await {
            if ev.name() == "StopEvent" {
                saw_stop = true;
            }
        }
        assert!(saw_stop);
        handler.finish().await.unwrap();
    }

    #[tokio::test]
    async fn fan_out_runs_all_matching_steps() {
        let mut wf = Workflow::new();
        wf.add_step("a", |ctx: Arc<RunContext>, _ev: BeginEvent| async move {
            ctx.store().set("a", serde_json::json!(true)).await;
            Ok(None)
        });
        wf.add_step("b", |ctx: Arc<RunContext>, _ev: BeginEvent| async move {
            ctx.store().set("b", serde_json::json!(true)).await;
            Ok(emit(StopEvent::new(serde_json::Value::Null)))
        });

        let handler = wf.run(BeginEvent { query: "x".into() });
        let ctx = Arc::clone(handler.ctx());
        handler.finish().await.unwrap();
        assert_eq!(ctx.store().get("b").await, Some(serde_json::json!(true)));
    }

    #[tokio::test]
    async fn step_failure_is_terminal_and_streamed() {
        let mut wf = Workflow::new();
        wf.add_step("boom", |_ctx, _ev: BeginEvent| async move {
            Err::<StepOutput, _>(WorkflowError::Invariant("broken".into()))
        });

        let mut handler = wf.run(BeginEvent { query: "x".into() });
        let mut saw_failure = false;
        while let Some(ev) = handler.next_event().await {
            if let Some(failed) = ev.as_any().downcast_ref::<StepFailedEvent>() {
                assert_eq!(failed.step, "boom");
                assert_eq!(failed.kind, "Invariant");
                saw_failure = true;
            }
        }
        assert!(saw_failure);
        assert!(matches!(
            handler.finish().await,
            Err(WorkflowError::Step { step, .. }) if step == "boom"
        ));
    }

    #[tokio::test]
    async fn timeout_cancels_the_run() {
        let mut wf = Workflow::new();
        wf.add_step("sleepy", |_ctx, _ev: BeginEvent| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        });
        let wf = wf.with_timeout(Duration::from_millis(30));

        let handler = wf.run(BeginEvent { query: "x".into() });
        assert!(matches!(
            handler.finish().await,
            Err(WorkflowError::Timeout)
        ));
    }

    #[tokio::test]
    async fn idle_without_stop_is_an_invariant_error() {
        let mut wf = Workflow::new();
        wf.add_step("dead_end", |_ctx, _ev: BeginEvent| async move { Ok(None) });

        let handler = wf.run(BeginEvent { query: "x".into() });
        assert!(matches!(
            handler.finish().await,
            Err(WorkflowError::Invariant(_))
        ));
    }

    #[tokio::test]
    async fn input_required_suspends_until_external_response() {
        let mut wf = Workflow::new();
        wf.add_step("ask", |_ctx, _ev: BeginEvent| async move {
            Ok(emit(InputRequiredEvent {
                waiter_id: "approval".into(),
                prefix: "ok?".into(),
            }))
        });
        wf.add_step("answer", |_ctx, ev: HumanResponseEvent| async move {
            Ok(emit(StopEvent::new(serde_json::json!({
                "response": ev.response,
            }))))
        });

        let mut handler = wf.run(BeginEvent { query: "x".into() });
        while let Some(ev) = handler.next_event().await {
            if let Some(input) = ev.as_any().downcast_ref::<InputRequiredEvent>() {
                handler.send_event(HumanResponseEvent {
                    waiter_id: input.waiter_id.clone(),
                    response: "yes".into(),
                });
            }
        }
        let result = handler.finish().await.unwrap();
        assert_eq!(result["response"], "yes");
    }

    #[tokio::test]
    async fn steps_fetch_injected_resources() {
        #[derive(Debug)]
        struct Greeting(String);

        let mut wf = Workflow::new();
        wf.resources_mut()
            .provide::<Greeting, _, _>(|_| async { Ok(Greeting("hello".into())) });
        wf.add_step("greet", |ctx: Arc<RunContext>, _ev: BeginEvent| async move {
            let greeting = ctx.resource::<Greeting>().await?;
            Ok(emit(StopEvent::new(serde_json::json!(greeting.0.clone()))))
        });

        let handler = wf.run(BeginEvent { query: "x".into() });
        assert_eq!(handler.finish().await.unwrap(), serde_json::json!("hello"));
    }

    #[tokio::test]
    async fn cancel_terminates_a_suspended_run() {
        let mut wf = Workflow::new();
        wf.add_step("ask", |_ctx, _ev: BeginEvent| async move {
            Ok(emit(InputRequiredEvent {
                waiter_id: "w".into(),
                prefix: String::new(),
            }))
        });

        let handler = wf.run(BeginEvent { query: "x".into() });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handler.cancel();
        assert!(matches!(
            handler.finish().await,
            Err(WorkflowError::Cancelled)
        ));
    }
}
