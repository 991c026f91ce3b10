#![deny(missing_docs)]
//! # delver-core — protocol types for the delver deep-research engine
//!
//! This crate defines the shared vocabulary the rest of the workspace is
//! built on:
//!
//! | Module | What it holds |
//! |--------|---------------|
//! | [`event`] | The event envelope and the distinguished HITL events |
//! | [`error`] | Error enums for each protocol boundary |
//! | [`id`] | Run and research identifiers |
//! | [`capability`] | Traits for the external capabilities the core consumes |
//! | [`memory`] | In-memory capability implementations |
//!
//! ## Design principle
//!
//! Capability traits are operation-defined, not mechanism-defined.
//! [`capability::SearchProvider::search`] means "produce a SERP for this
//! query" — not "call a particular vendor." A hosted API client, a fixture
//! replay, and a future backend that doesn't exist yet all implement the
//! same trait.

pub mod capability;
pub mod error;
pub mod event;
pub mod id;
pub mod memory;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use capability::{
    Asset, AssetKind, DocumentParser, FileId, FileStore, ParsedDocument, SearchHit,
    SearchProvider, SessionRecord, SessionStatus, SessionStore, TokenCounter, WebFetcher,
};
pub use error::{FetchError, ParseError, SearchError, SessionStoreError, StateError, StoreError, WorkflowError};
pub use event::{
    downcast_event, HumanResponseEvent, InputRequiredEvent, StepFailedEvent, StopEvent,
    WorkflowEvent,
};
pub use id::{ResearchId, RunId};
