#![deny(missing_docs)]
//! # delver-net — HTTP adapters
//!
//! Thin reqwest-backed implementations of the core's search and fetch
//! capabilities. Credentials come from the environment at construction;
//! the core never reads them.

pub mod fetch;
pub mod serp;

pub use fetch::PageFetcher;
pub use serp::SerpClient;
