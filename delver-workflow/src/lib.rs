#![deny(missing_docs)]
//! # delver-workflow — the step workflow runtime
//!
//! Organizes work as steps that consume and produce typed events:
//!
//! | Piece | What it does |
//! |-------|--------------|
//! | [`ContextStore`] | Per-run keyed state with scoped atomic edits |
//! | [`EventStream`] | Multi-producer/single-consumer streaming bus |
//! | [`RunContext`] | Store + stream + waiters + resources + cancellation |
//! | [`Workflow`] | Step registry, event-typed dispatch, timeout |
//! | [`WorkflowHandler`] | Event consumption, HITL input, run result |
//!
//! HITL works in two equivalent ways: a step may return an
//! [`delver_core::event::InputRequiredEvent`] and let a sibling step consume
//! the eventual [`delver_core::event::HumanResponseEvent`], or it may call
//! [`RunContext::wait_for_event`] to suspend in place until the correlated
//! response arrives.

pub mod context;
pub mod resources;
pub mod store;
pub mod stream;
pub mod workflow;

pub use context::{CorrelatedEvent, RunContext};
pub use resources::{ResourceRegistry, Resources};
pub use store::{ContextStore, StoreGuard};
pub use stream::EventStream;
pub use workflow::{StepOutput, Workflow, WorkflowHandler, emit};
