//! The deep-research state model and its typed accessor.
//!
//! All cross-agent state lives under a single well-known key in the run's
//! context store. Sub-agents receive deep copies of this record and write
//! back only the slices they own — the Searcher its `research_turn`, the
//! Writer its `research_artifact`.

use delver_core::capability::{Asset, AssetKind};
use delver_core::error::StateError;
use delver_workflow::RunContext;
use serde::{Deserialize, Serialize};

/// The report's fixed location inside the artifact namespace.
pub const REPORT_PATH: &str = "artifacts/report.md";

/// Lifecycle of the report artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// The run is still producing the report.
    #[default]
    Running,
    /// The run finished and the report is final.
    Completed,
    /// The run failed; the report may be partial.
    Failed,
}

/// One enriched evidence record extracted from a source URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Source URL.
    pub url: String,
    /// Source title when the parser found one.
    pub title: Option<String>,
    /// Normalized content type (html/pdf/csv/unknown).
    pub content_type: Option<String>,
    /// Parser metadata passthrough.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Full markdown content of the source (possibly truncated to budget).
    pub content: String,
    /// Analysis summary used by the orchestrator instead of raw content.
    pub summary: String,
    /// Raw insight texts extracted by analysis.
    #[serde(default)]
    pub bullets: Vec<String>,
    /// Max insight relevance for the overall source (0.0–1.0).
    #[serde(default)]
    pub relevance: f64,
    /// Assets analysis selected as relevant.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// The per-turn evidence collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Items in append order. Append-only within a turn; cleared on commit.
    pub items: Vec<EvidenceItem>,
}

impl EvidenceBundle {
    /// Concise per-item summary for the orchestrator's hot prompt.
    pub fn summary(&self) -> String {
        if self.items.is_empty() {
            return "No evidence gathered yet.".to_string();
        }
        let mut lines = vec![format!("Gathered {} evidence items:", self.items.len())];
        for (i, item) in self.items.iter().enumerate() {
            lines.push(format!(
                "{}. [{}] {}",
                i + 1,
                item.content_type.as_deref().unwrap_or("unknown"),
                item.url
            ));
            lines.push(format!("   Summary: {}", item.summary));
            lines.push(format!("   Relevance: {:.2}", item.relevance));
        }
        lines.join("\n")
    }

    /// Full-content view handed to the Writer.
    pub fn content_for_writing(&self) -> String {
        if self.items.is_empty() {
            return "No evidence available.".to_string();
        }
        let mut sections = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let mut section = format!("### Source: {}\n", item.url);
            if let Some(title) = &item.title {
                section.push_str(&format!("Title: {title}\n"));
            }
            if !item.assets.is_empty() {
                section.push_str("Assets:\n");
                for asset in &item.assets {
                    section.push_str(&format!(
                        "- [{}] {} -> {}\n",
                        asset_kind_label(asset.kind),
                        asset.description.as_deref().unwrap_or("No description"),
                        asset.url
                    ));
                }
            }
            section.push_str(&item.content);
            sections.push(section);
        }
        sections.join("\n\n")
    }
}

pub(crate) fn asset_kind_label(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Image => "image",
        AssetKind::TableCsv => "table_csv",
        AssetKind::DownloadableFile => "downloadable_file",
        AssetKind::Unknown => "unknown",
    }
}

/// Orchestrator-owned state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorState {
    /// The approved research plan, rendered into the hot prompt each turn.
    pub research_plan: String,
}

/// Per-turn research state, cleared when the Writer commits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchTurnState {
    /// Every URL encountered this run, in first-seen order.
    pub seen_urls: Vec<String>,
    /// URLs that failed download/upload/parse.
    pub failed_urls: Vec<String>,
    /// Evidence gathered this turn.
    pub evidence: EvidenceBundle,
    /// Follow-up queries suggested for later turns.
    pub follow_up_queries: Vec<String>,
    /// Consecutive no-progress searches in the current streak.
    pub no_new_results_count: u32,
}

impl ResearchTurnState {
    /// Reset all four subfields atomically (the caller holds the edit).
    pub fn clear(&mut self) {
        self.seen_urls.clear();
        self.failed_urls.clear();
        self.evidence = EvidenceBundle::default();
        self.follow_up_queries.clear();
        self.no_new_results_count = 0;
    }

    /// Record URLs as seen, preserving first-insertion order.
    pub fn add_seen_urls<I>(&mut self, urls: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for url in urls {
            let url = url.into();
            if !self.seen_urls.contains(&url) {
                self.seen_urls.push(url);
            }
        }
    }

    /// Record URLs as failed. Failed URLs are always also seen.
    pub fn add_failed_urls<I>(&mut self, urls: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for url in urls {
            let url = url.into();
            if !self.failed_urls.contains(&url) {
                self.failed_urls.push(url.clone());
            }
            if !self.seen_urls.contains(&url) {
                self.seen_urls.push(url);
            }
        }
    }

    /// Append evidence items, marking their URLs seen.
    pub fn add_evidence_items(&mut self, items: Vec<EvidenceItem>) {
        for item in &items {
            if !self.seen_urls.contains(&item.url) {
                self.seen_urls.push(item.url.clone());
            }
        }
        self.evidence.items.extend(items);
    }

    /// Whether a URL was already seen or failed.
    pub fn knows_url(&self, url: &str) -> bool {
        self.seen_urls.iter().any(|u| u == url) || self.failed_urls.iter().any(|u| u == url)
    }
}

/// The single-file report artifact and its uncommitted draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchArtifactState {
    /// Report path; always [`REPORT_PATH`].
    pub path: String,
    /// The committed report.
    pub content: String,
    /// Uncommitted patch buffer; `None` means no outstanding edits.
    pub turn_draft: Option<String>,
    /// Artifact lifecycle.
    pub status: ArtifactStatus,
}

impl Default for ResearchArtifactState {
    fn default() -> Self {
        Self {
            path: REPORT_PATH.to_string(),
            content: String::new(),
            turn_draft: None,
            status: ArtifactStatus::Running,
        }
    }
}

/// The full cross-agent research state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepResearchState {
    /// Orchestrator slice.
    pub orchestrator: OrchestratorState,
    /// Per-turn research slice.
    pub research_turn: ResearchTurnState,
    /// Report artifact slice.
    pub research_artifact: ResearchArtifactState,
}

/// Typed accessor for [`DeepResearchState`] in a run's context store.
pub struct ResearchState;

impl ResearchState {
    /// The well-known store key.
    pub const KEY: &'static str = "deep_research_state";

    /// Read-only snapshot of the state (default when absent).
    pub async fn get(ctx: &RunContext) -> Result<DeepResearchState, StateError> {
        Ok(ctx
            .store()
            .get_json::<DeepResearchState>(Self::KEY)
            .await?
            .unwrap_or_default())
    }

    /// Atomic read-modify-write of the state.
    pub async fn edit<R>(
        ctx: &RunContext,
        f: impl FnOnce(&mut DeepResearchState) -> R,
    ) -> Result<R, StateError> {
        let mut guard = ctx.store().edit().await;
        let mut state = guard
            .get_json::<DeepResearchState>(Self::KEY)?
            .unwrap_or_default();
        let out = f(&mut state);
        guard.set_json(Self::KEY, &state)?;
        Ok(out)
    }
}
