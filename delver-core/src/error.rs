//! Error types for each protocol boundary.
//!
//! The taxonomy distinguishes structural failures that end a run
//! (`Cancelled`, `Timeout`, `Invariant`, step errors) from per-item
//! failures that are aggregated and reported onward (download, upload,
//! parse). The latter never abort a batch.

use thiserror::Error;

/// Workflow runtime errors. Terminal for the run unless noted.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The run context was cancelled; propagates from any suspension.
    #[error("cancelled")]
    Cancelled,

    /// A deadline expired (per call, per step, or per run).
    #[error("timeout")]
    Timeout,

    /// A step failed with an unrecoverable error.
    #[error("step '{step}' failed: {message}")]
    Step {
        /// Name of the failed step.
        step: String,
        /// Error message from the step.
        message: String,
    },

    /// A required resource was never registered with the run.
    #[error("resource not registered: {0}")]
    ResourceMissing(String),

    /// Programmer error — broken internal contract, with a diagnostic.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// State (de)serialization failed inside a step.
    #[error(transparent)]
    State(#[from] StateError),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Context store errors.
///
/// Reads never fail (missing keys yield defaults); this surfaces only when
/// a stored value cannot be decoded into the type a caller expects.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StateError {
    /// Serialization or deserialization of a stored value failed.
    #[error("state serialization error at '{key}': {message}")]
    Serialization {
        /// The store key involved.
        key: String,
        /// Decoder error text.
        message: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// SERP capability errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SearchError {
    /// The search request failed (network, provider outage).
    #[error("search request failed: {0}")]
    RequestFailed(String),

    /// Authentication with the search provider failed.
    #[error("search auth failed: {0}")]
    AuthFailed(String),

    /// The provider's response could not be interpreted.
    #[error("invalid search response: {0}")]
    InvalidResponse(String),
}

/// Byte-download capability errors. Per-URL; aggregated, never batch-fatal.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FetchError {
    /// Download failed for a single URL.
    #[error("download failed for {url}: {message}")]
    DownloadFailed {
        /// URL that failed.
        url: String,
        /// Failure detail.
        message: String,
    },

    /// Download produced an empty body.
    #[error("empty content downloaded for {0}")]
    Empty(String),
}

/// File-store capability errors. Per-file; aggregated, never batch-fatal.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Upload of raw bytes failed.
    #[error("upload failed for {filename}: {message}")]
    UploadFailed {
        /// Name the bytes were uploaded under.
        filename: String,
        /// Failure detail.
        message: String,
    },

    /// Refused to upload an empty payload.
    #[error("refusing to upload empty content for {0}")]
    Empty(String),
}

/// Document-parser capability errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ParseError {
    /// Parsing failed for a single document.
    #[error("parse failed for {url}: {message}")]
    ParseFailed {
        /// Source URL of the document.
        url: String,
        /// Failure detail.
        message: String,
    },

    /// The parser produced no usable content.
    #[error("parser returned no markdown for {0}")]
    NoContent(String),
}

/// Session-store capability errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// A delete or insert against the backing collection failed.
    #[error("session store operation failed: {0}")]
    OperationFailed(String),

    /// The record was missing a required field.
    #[error("invalid session record: {0}")]
    InvalidRecord(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_error_display() {
        assert_eq!(WorkflowError::Cancelled.to_string(), "cancelled");
        assert_eq!(WorkflowError::Timeout.to_string(), "timeout");
        assert_eq!(
            WorkflowError::Step {
                step: "run_planner_llm".into(),
                message: "boom".into(),
            }
            .to_string(),
            "step 'run_planner_llm' failed: boom"
        );
        assert_eq!(
            WorkflowError::Invariant("missing system message".into()).to_string(),
            "invariant violated: missing system message"
        );
    }

    #[test]
    fn per_item_errors_carry_urls() {
        let e = FetchError::DownloadFailed {
            url: "https://a".into(),
            message: "451".into(),
        };
        assert!(e.to_string().contains("https://a"));

        let e = ParseError::NoContent("https://b".into());
        assert!(e.to_string().contains("https://b"));
    }

    #[test]
    fn state_error_into_workflow_error() {
        let e: WorkflowError = StateError::Serialization {
            key: "deep_research_state".into(),
            message: "bad json".into(),
        }
        .into();
        assert!(e.to_string().contains("deep_research_state"));
    }
}
