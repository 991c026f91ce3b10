//! Deep-research configuration.
//!
//! Loaded from a JSON file (`configs/config.json` by convention) under the
//! `research` path. Adapters read their credentials from the environment at
//! construction; nothing here holds a secret.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {message}")]
    Io {
        /// File path attempted.
        path: String,
        /// OS error text.
        message: String,
    },

    /// The file was not valid JSON or did not match the schema.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The selector path was absent from the document.
    #[error("config path not found: {0}")]
    PathNotFound(String),
}

/// Atomic configuration for a single LLM instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmModelConfig {
    /// Model name passed through to the provider.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Agent Data collections used by the deep-research experience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchCollections {
    /// Collection name for persisted research sessions.
    pub research_collection: String,
}

/// Runtime settings for deep-research planning and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSettings {
    /// Soft cap for per-turn report growth, in words.
    #[serde(default = "default_max_report_update_size")]
    pub max_report_update_size: u32,
    /// Hard cap for pending evidence tokens per turn.
    pub max_pending_evidence_tokens: usize,
    /// Advisory lower bound on sources, surfaced in prompts.
    pub min_sources: u32,
    /// Advisory upper bound on sources, surfaced in prompts.
    pub max_sources: u32,
    /// Workflow timeout in seconds.
    pub timeout_seconds: u64,
}

fn default_max_report_update_size() -> u32 {
    800
}

/// Planner agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Primary model.
    pub main_llm: LlmModelConfig,
}

/// Searcher agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearcherConfig {
    /// Primary model driving the search loop.
    pub main_llm: LlmModelConfig,
    /// Cheaper model used for content analysis and query planning.
    pub weak_llm: LlmModelConfig,
    /// Maximum SERP results to return/process for a single query.
    pub max_results_per_query: usize,
}

/// Orchestrator agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Primary model.
    pub main_llm: LlmModelConfig,
}

/// Writer agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Primary model.
    pub main_llm: LlmModelConfig,
}

/// Reviewer agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerConfig {
    /// Primary model.
    pub main_llm: LlmModelConfig,
}

/// Deep-research configuration, loaded from `configs/config.json`
/// (path: `research`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Planner agent models.
    pub planner: PlannerConfig,
    /// Searcher agent models and limits.
    pub searcher: SearcherConfig,
    /// Orchestrator agent models.
    pub orchestrator: OrchestratorConfig,
    /// Writer agent models.
    pub writer: WriterConfig,
    /// Reviewer agent models.
    pub reviewer: ReviewerConfig,
    /// Persistence collections.
    pub collections: ResearchCollections,
    /// Runtime settings.
    pub settings: ResearchSettings,
}

impl ResearchConfig {
    /// Load the configuration from a JSON file, selecting `path` inside the
    /// document (dot-separated, e.g. `"research"`).
    pub fn load(file: impl AsRef<Path>, path: &str) -> Result<Self, ConfigError> {
        let file = file.as_ref();
        let text = std::fs::read_to_string(file).map_err(|e| ConfigError::Io {
            path: file.display().to_string(),
            message: e.to_string(),
        })?;
        let root: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Self::from_value(&root, path)
    }

    /// Select `path` inside an already-parsed document and deserialize.
    pub fn from_value(root: &serde_json::Value, path: &str) -> Result<Self, ConfigError> {
        let mut node = root;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node
                .get(segment)
                .ok_or_else(|| ConfigError::PathNotFound(path.to_string()))?;
        }
        serde_json::from_value(node.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// A small fixed configuration for tests and offline runs.
    pub fn for_tests() -> Self {
        let llm = LlmModelConfig {
            model: "scripted".into(),
            temperature: 0.0,
        };
        Self {
            planner: PlannerConfig {
                main_llm: llm.clone(),
            },
            searcher: SearcherConfig {
                main_llm: llm.clone(),
                weak_llm: llm.clone(),
                max_results_per_query: 10,
            },
            orchestrator: OrchestratorConfig {
                main_llm: llm.clone(),
            },
            writer: WriterConfig {
                main_llm: llm.clone(),
            },
            reviewer: ReviewerConfig { main_llm: llm },
            collections: ResearchCollections {
                research_collection: "research_sessions".into(),
            },
            settings: ResearchSettings {
                max_report_update_size: 800,
                max_pending_evidence_tokens: 20_000,
                min_sources: 3,
                max_sources: 12,
                timeout_seconds: 600,
            },
        }
    }
}
