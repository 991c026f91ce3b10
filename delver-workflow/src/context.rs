//! The per-run context: state store, event stream, waiters, resources,
//! cancellation.
//!
//! One [`RunContext`] exists per workflow execution. Sub-agents get a
//! [`RunContext::child`]: a fresh store and waiter table sharing the
//! parent's stream and a linked cancellation token, so sub-agent events
//! reach the user while sub-agent state stays isolated until an explicit
//! merge.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use delver_core::error::WorkflowError;
use delver_core::event::{HumanResponseEvent, WorkflowEvent, downcast_event};
use delver_core::id::RunId;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::resources::Resources;
use crate::store::ContextStore;
use crate::stream::EventStream;

/// An event that carries a correlation id for HITL waiter matching.
pub trait CorrelatedEvent: WorkflowEvent {
    /// The waiter id this event answers.
    fn correlation_id(&self) -> &str;
}

impl CorrelatedEvent for HumanResponseEvent {
    fn correlation_id(&self) -> &str {
        &self.waiter_id
    }
}

/// How an event entered the dispatch queue. External events (sent by the
/// HITL driver) release the run's pending-input hold.
pub(crate) enum Dispatched {
    /// Produced by a step inside the run.
    Internal(Box<dyn WorkflowEvent>),
    /// Delivered from outside via [`RunContext::send_event`].
    External(Box<dyn WorkflowEvent>),
}

struct Waiter {
    seq: u64,
    matcher: Box<dyn Fn(&dyn WorkflowEvent) -> bool + Send>,
    tx: oneshot::Sender<Box<dyn WorkflowEvent>>,
}

static WAITER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Per-run execution context.
pub struct RunContext {
    run_id: RunId,
    store: ContextStore,
    stream: EventStream,
    dispatch: mpsc::UnboundedSender<Dispatched>,
    waiters: Mutex<Vec<Waiter>>,
    resources: Resources,
    cancel: CancellationToken,
}

impl RunContext {
    pub(crate) fn new(
        stream: EventStream,
        dispatch: mpsc::UnboundedSender<Dispatched>,
        resources: Resources,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: RunId::generate(),
            store: ContextStore::new(),
            stream,
            dispatch,
            waiters: Mutex::new(Vec::new()),
            resources,
            cancel,
        }
    }

    /// Build a standalone context with its own stream consumer.
    ///
    /// For agent runs and tests that need a context without a workflow
    /// around it. The dispatch queue has no consumer; `send_event` outside
    /// a waiter is a no-op.
    pub fn detached() -> (
        std::sync::Arc<Self>,
        mpsc::UnboundedReceiver<Box<dyn WorkflowEvent>>,
    ) {
        let (stream, stream_rx) = EventStream::channel();
        let (dispatch_tx, _dispatch_rx) = mpsc::unbounded_channel();
        let ctx = Self::new(
            stream,
            dispatch_tx,
            crate::resources::ResourceRegistry::new().into_resources(),
            CancellationToken::new(),
        );
        (std::sync::Arc::new(ctx), stream_rx)
    }

    /// This run's identifier.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// The run's keyed state store.
    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// The run's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch an injected resource by type.
    pub async fn resource<T: Send + Sync + 'static>(
        &self,
    ) -> Result<std::sync::Arc<T>, WorkflowError> {
        self.resources.get::<T>().await
    }

    /// Publish an event to the run's stream. Non-blocking, never fails.
    pub fn write_event_to_stream<E: WorkflowEvent>(&self, event: E) {
        self.stream.send(Box::new(event));
    }

    /// Deliver an event into the run. A pending waiter with a matching
    /// correlation consumes it; otherwise it is dispatched to steps.
    pub fn send_event<E: WorkflowEvent>(&self, event: E) {
        self.send_boxed(Box::new(event));
    }

    pub(crate) fn dispatch_internal(&self, event: Box<dyn WorkflowEvent>) {
        let _ = self.dispatch.send(Dispatched::Internal(event));
    }

    fn send_boxed(&self, event: Box<dyn WorkflowEvent>) {
        {
            let mut waiters = self.waiters.lock().expect("waiter lock poisoned");
            if let Some(pos) = waiters.iter().position(|w| (w.matcher)(event.as_ref())) {
                let waiter = waiters.remove(pos);
                let _ = waiter.tx.send(event);
                return;
            }
        }
        let _ = self.dispatch.send(Dispatched::External(event));
    }

    /// Publish `waiter_event` to the stream, then suspend until an event of
    /// type `E` arrives whose correlation id equals `waiter_id`.
    ///
    /// Fails with `Cancelled` on context cancel and `Timeout` when the
    /// optional deadline expires. The waiter is deregistered on every exit
    /// path.
    pub async fn wait_for_event<E>(
        &self,
        waiter_id: &str,
        waiter_event: impl WorkflowEvent,
        timeout: Option<Duration>,
    ) -> Result<E, WorkflowError>
    where
        E: CorrelatedEvent,
    {
        let seq = WAITER_SEQ.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let wanted = waiter_id.to_string();
        {
            let mut waiters = self.waiters.lock().expect("waiter lock poisoned");
            waiters.push(Waiter {
                seq,
                matcher: Box::new(move |ev| {
                    ev.as_any()
                        .downcast_ref::<E>()
                        .is_some_and(|e| e.correlation_id() == wanted)
                }),
                tx,
            });
        }

        self.stream.send(Box::new(waiter_event));

        let deadline = async {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(WorkflowError::Cancelled),
            _ = deadline => Err(WorkflowError::Timeout),
            received = rx => match received {
                Ok(event) => downcast_event::<E>(event).map(|e| *e).map_err(|_| {
                    WorkflowError::Invariant("waiter matched an event of the wrong type".into())
                }),
                Err(_) => Err(WorkflowError::Cancelled),
            },
        };

        if outcome.is_err() {
            let mut waiters = self.waiters.lock().expect("waiter lock poisoned");
            waiters.retain(|w| w.seq != seq);
        }
        outcome
    }

    /// Build a child context for a sub-agent run.
    ///
    /// The child has a fresh store and waiter table, shares the parent's
    /// event stream (child events reach the user verbatim), and is
    /// cancelled when the parent is.
    pub fn child(&self) -> std::sync::Arc<RunContext> {
        let (dispatch_tx, _dispatch_rx) = mpsc::unbounded_channel();
        std::sync::Arc::new(Self::new(
            self.stream.clone(),
            dispatch_tx,
            self.resources.clone(),
            self.cancel.child_token(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_core::event::InputRequiredEvent;
    use std::sync::Arc;

    #[tokio::test]
    async fn wait_for_event_resumes_on_matching_response() {
        let (ctx, mut stream_rx) = RunContext::detached();

        let waiter_ctx = Arc::clone(&ctx);
        let waiter = tokio::spawn(async move {
            waiter_ctx
                .wait_for_event::<HumanResponseEvent>(
                    "w1",
                    InputRequiredEvent {
                        waiter_id: "w1".into(),
                        prefix: "approve?".into(),
                    },
                    None,
                )
                .await
        });

        // The waiter event is published before suspension.
        let published = stream_rx.recv().await.unwrap();
        assert_eq!(published.name(), "InputRequiredEvent");

        // A response for a different waiter is not consumed by this waiter.
        ctx.send_event(HumanResponseEvent {
            waiter_id: "other".into(),
            response: "nope".into(),
        });
        ctx.send_event(HumanResponseEvent {
            waiter_id: "w1".into(),
            response: "accept".into(),
        });

        let resumed = waiter.await.unwrap().unwrap();
        assert_eq!(resumed.response, "accept");
    }

    #[tokio::test]
    async fn wait_for_event_times_out() {
        let (ctx, _stream_rx) = RunContext::detached();
        let result = ctx
            .wait_for_event::<HumanResponseEvent>(
                "w1",
                InputRequiredEvent {
                    waiter_id: "w1".into(),
                    prefix: String::new(),
                },
                Some(Duration::from_millis(20)),
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::Timeout)));
    }

    #[tokio::test]
    async fn wait_for_event_honors_cancellation() {
        let (ctx, _stream_rx) = RunContext::detached();
        let waiter_ctx = Arc::clone(&ctx);
        let waiter = tokio::spawn(async move {
            waiter_ctx
                .wait_for_event::<HumanResponseEvent>(
                    "w1",
                    InputRequiredEvent {
                        waiter_id: "w1".into(),
                        prefix: String::new(),
                    },
                    None,
                )
                .await
        });
        tokio::task::yield_now().await;
        ctx.cancellation().cancel();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(WorkflowError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn child_shares_stream_but_not_store() {
        let (parent, mut stream_rx) = RunContext::detached();
        parent.store().set("k", serde_json::json!("parent")).await;

        let child = parent.child();
        assert!(child.store().get("k").await.is_none());

        child.write_event_to_stream(InputRequiredEvent {
            waiter_id: "w".into(),
            prefix: "from child".into(),
        });
        assert_eq!(stream_rx.recv().await.unwrap().name(), "InputRequiredEvent");
    }

    #[tokio::test]
    async fn child_is_cancelled_with_parent() {
        let (parent, _rx) = RunContext::detached();
        let child = parent.child();
        parent.cancellation().cancel();
        assert!(child.cancellation().is_cancelled());
    }
}
