//! Capability traits for the external collaborators the core consumes.
//!
//! The engine never talks to vendors directly. It sees five capabilities:
//! a SERP, a byte downloader, a file store, a bytes→markdown parser, and an
//! idempotent session store, plus a token counter for budgeting. Each is an
//! object-safe trait so implementations can be swapped per run through the
//! resource registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, ParseError, SearchError, SessionStoreError, StoreError};

/// One organic result from a web search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Short result snippet.
    pub snippet: String,
}

/// SERP capability: query in, ordered organic results out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search and return up to `max_results` hits plus the number
    /// of upstream requests made.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<(Vec<SearchHit>, u32), SearchError>;
}

/// Byte-download capability.
#[async_trait]
pub trait WebFetcher: Send + Sync {
    /// Download the raw bytes behind a URL.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Opaque handle to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// File-store capability: bytes in, [`FileId`] out.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload raw bytes under a filename hint, returning the stored id.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<FileId, StoreError>;
}

/// Kind of a rich asset extracted from a parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// An image extracted from the source.
    Image,
    /// A table rendered as CSV.
    TableCsv,
    /// A downloadable file referenced by the source.
    DownloadableFile,
    /// Anything the parser could not classify.
    Unknown,
}

/// A rich asset (image, table, file) attached to evidence.
///
/// `is_selected` is false until content analysis marks the asset relevant
/// to the current directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Unique id or filename of the asset.
    pub id: String,
    /// Asset classification.
    pub kind: AssetKind,
    /// Presigned or source URL for the asset.
    pub url: String,
    /// Optional human description.
    pub description: Option<String>,
    /// Whether analysis selected this asset as relevant.
    #[serde(default)]
    pub is_selected: bool,
}

/// A parsed document normalized from the upstream parser response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// URL the document was fetched from.
    pub source_url: String,
    /// Full markdown rendition of the document.
    pub markdown: String,
    /// Rich assets discovered while parsing.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Parser metadata (title, content type, page counts).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Parsing capability: stored files in, markdown documents out.
///
/// Per-file failures are reported in the second tuple element as source
/// URLs; they never fail the batch.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse a batch of uploaded files, pairing each file id with the URL
    /// it came from. Returns parsed documents and the failed source URLs.
    async fn parse_files(
        &self,
        files: Vec<(FileId, String)>,
    ) -> Result<(Vec<ParsedDocument>, Vec<String>), ParseError>;
}

/// Lifecycle status of a persisted research session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The plan is still being negotiated with the human.
    Planning,
    /// The plan was accepted and persisted.
    Finalized,
    /// The session failed before finalization.
    Failed,
}

/// The persisted snapshot of a planner run, keyed by `research_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session key; upserts are idempotent on this field.
    pub research_id: String,
    /// Session lifecycle status.
    pub status: SessionStatus,
    /// The query that started the session.
    pub initial_query: String,
    /// The approved (or in-progress) plan text.
    pub plan: String,
    /// Output-shaping configuration for downstream agents.
    pub text_config: serde_json::Value,
}

/// Session persistence capability.
///
/// `upsert` is delete-by-id then insert, so retries converge on exactly one
/// record per `research_id`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Delete all records in `collection` whose `research_id` matches.
    /// Returns the number of records removed.
    async fn delete_by_research_id(
        &self,
        collection: &str,
        research_id: &str,
    ) -> Result<u64, SessionStoreError>;

    /// Insert a record into `collection`, returning the storage id.
    async fn insert(
        &self,
        collection: &str,
        record: SessionRecord,
    ) -> Result<String, SessionStoreError>;

    /// Idempotent upsert keyed by `record.research_id`.
    async fn upsert(
        &self,
        collection: &str,
        record: SessionRecord,
    ) -> Result<String, SessionStoreError> {
        if record.research_id.is_empty() {
            return Err(SessionStoreError::InvalidRecord(
                "research_id must be set before persistence".into(),
            ));
        }
        self.delete_by_research_id(collection, &record.research_id)
            .await?;
        self.insert(collection, record).await
    }
}

/// Token accounting capability used by the evidence budget.
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in a string.
    fn count(&self, text: &str) -> usize;

    /// Truncate a string to at most `max_tokens` tokens.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&AssetKind::TableCsv).unwrap(),
            "\"table_csv\""
        );
        assert_eq!(
            serde_json::to_string(&AssetKind::DownloadableFile).unwrap(),
            "\"downloadable_file\""
        );
    }

    #[test]
    fn session_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Finalized).unwrap(),
            "\"finalized\""
        );
    }

    #[test]
    fn session_record_roundtrip() {
        let record = SessionRecord {
            research_id: "r1".into(),
            status: SessionStatus::Planning,
            initial_query: "compare batteries".into(),
            plan: String::new(),
            text_config: serde_json::json!({"tone": "objective"}),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "planning");
        let back: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.research_id, "r1");
    }
}
