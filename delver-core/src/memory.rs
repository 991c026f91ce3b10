//! In-memory capability implementations.
//!
//! Suitable for tests, offline runs, and single-process deployments where
//! persistence across restarts is not required. All stores use a `HashMap`
//! behind a `tokio::sync::RwLock`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::capability::{
    DocumentParser, FileId, FileStore, ParsedDocument, SessionRecord, SessionStore, TokenCounter,
};
use crate::error::{ParseError, SessionStoreError, StoreError};

/// In-memory session store with delete-then-insert upsert semantics.
#[derive(Default)]
pub struct MemorySessionStore {
    collections: RwLock<HashMap<String, Vec<(String, SessionRecord)>>>,
    counter: RwLock<u64>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot all records in a collection (test/introspection helper).
    pub async fn records(&self, collection: &str) -> Vec<SessionRecord> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|rows| rows.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn delete_by_research_id(
        &self,
        collection: &str,
        research_id: &str,
    ) -> Result<u64, SessionStoreError> {
        let mut collections = self.collections.write().await;
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|(_, r)| r.research_id != research_id);
        Ok((before - rows.len()) as u64)
    }

    async fn insert(
        &self,
        collection: &str,
        record: SessionRecord,
    ) -> Result<String, SessionStoreError> {
        let mut counter = self.counter.write().await;
        *counter += 1;
        let item_id = format!("item-{}", *counter);
        drop(counter);

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push((item_id.clone(), record));
        Ok(item_id)
    }
}

/// In-memory file store handing out sequential file ids.
#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<Vec<(String, Vec<u8>)>>,
}

impl MemoryFileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read back stored bytes by id.
    pub async fn bytes(&self, id: &FileId) -> Option<Vec<u8>> {
        let files = self.files.read().await;
        let idx: usize = id.as_str().strip_prefix("file-")?.parse().ok()?;
        files.get(idx).map(|(_, b)| b.clone())
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<FileId, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::Empty(filename.to_string()));
        }
        let mut files = self.files.write().await;
        let id = FileId(format!("file-{}", files.len()));
        files.push((filename.to_string(), bytes));
        Ok(id)
    }
}

/// Parser that treats stored bytes as UTF-8 markdown.
///
/// Covers plain-text and markdown sources without an external parsing
/// service. Bytes that are not valid UTF-8 fail per file, not per batch.
pub struct Utf8Parser<S> {
    store: std::sync::Arc<S>,
}

impl<S> Utf8Parser<S> {
    /// Wrap a file store the parser reads uploaded bytes from.
    pub fn new(store: std::sync::Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DocumentParser for Utf8Parser<MemoryFileStore> {
    async fn parse_files(
        &self,
        files: Vec<(FileId, String)>,
    ) -> Result<(Vec<ParsedDocument>, Vec<String>), ParseError> {
        let mut docs = Vec::new();
        let mut failed = Vec::new();
        for (file_id, url) in files {
            let Some(bytes) = self.store.bytes(&file_id).await else {
                failed.push(url);
                continue;
            };
            match String::from_utf8(bytes) {
                Ok(markdown) if !markdown.trim().is_empty() => docs.push(ParsedDocument {
                    source_url: url,
                    markdown,
                    assets: vec![],
                    metadata: serde_json::Value::Null,
                }),
                _ => failed.push(url),
            }
        }
        Ok((docs, failed))
    }
}

/// Deterministic approximate token counter.
///
/// Counts one token per whitespace-delimited word plus one per 4 residual
/// characters inside long words. Close enough for budgeting; exact counts
/// belong to a provider-specific implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicTokenCounter;

const LONG_WORD: usize = 8;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace()
            .map(|w| 1 + w.chars().count().saturating_sub(LONG_WORD) / 4)
            .sum()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if self.count(text) <= max_tokens {
            return text.to_string();
        }
        let mut used = 0usize;
        let mut kept: Vec<&str> = Vec::new();
        for word in text.split_whitespace() {
            let cost = 1 + word.chars().count().saturating_sub(LONG_WORD) / 4;
            if used + cost > max_tokens {
                break;
            }
            used += cost;
            kept.push(word);
        }
        kept.join(" ")
    }
}
