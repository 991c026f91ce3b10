//! The event envelope and the distinguished workflow events.
//!
//! Workflow steps communicate through boxed [`WorkflowEvent`] values. The
//! runtime routes events to steps by their concrete type; the streaming bus
//! carries them to the UI by their [`WorkflowEvent::name`]. Three events are
//! distinguished because the runtime itself reacts to them: input-required
//! (suspends the run for a human), human-response (resumes it), and stop
//! (completes it).

use std::any::Any;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// Object-safe envelope for workflow events.
///
/// Implemented automatically for every `Any + Debug + Send + Sync` type, so
/// an event is just a plain struct. The runtime downcasts by `TypeId` when
/// dispatching to steps.
pub trait WorkflowEvent: Any + Debug + Send + Sync {
    /// Short display name, derived from the type name. Used by the
    /// streaming bus and the CLI driver (`Event: <name> ...`).
    fn name(&self) -> &'static str;

    /// Upcast for downcasting by the dispatcher.
    fn as_any(&self) -> &dyn Any;

    /// Consume the box for owned downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: Any + Debug + Send + Sync> WorkflowEvent for T {
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<T>();
        full.rsplit("::").next().unwrap_or(full)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// Downcast a boxed event to a concrete type, returning the box on mismatch.
pub fn downcast_event<E: WorkflowEvent>(
    event: Box<dyn WorkflowEvent>,
) -> Result<Box<E>, Box<dyn Any + Send + Sync>> {
    event.into_any().downcast::<E>()
}

/// Emitted when the run needs a human message to continue.
///
/// `waiter_id` correlates the eventual [`HumanResponseEvent`] back to the
/// suspension point that asked for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRequiredEvent {
    /// Correlation id for the matching human response.
    pub waiter_id: String,
    /// Text shown to the human before reading their reply.
    pub prefix: String,
}

/// A human message delivered into a suspended run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanResponseEvent {
    /// Correlation id copied from the [`InputRequiredEvent`] being answered.
    pub waiter_id: String,
    /// The human's reply, verbatim.
    pub response: String,
}

/// Terminal event: the run is complete and `result` is its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopEvent {
    /// Arbitrary JSON result of the run.
    pub result: serde_json::Value,
}

impl StopEvent {
    /// Build a stop event from any serializable result.
    pub fn new(result: impl Serialize) -> Self {
        Self {
            result: serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Emitted when a step errors; terminal for the run by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedEvent {
    /// Name of the failed step.
    pub step: String,
    /// Error kind (stable, machine-readable).
    pub kind: String,
    /// Human-readable error message.
    pub message: String,
}
