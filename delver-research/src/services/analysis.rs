//! Content analysis with the weak LLM.
//!
//! Produces directive-guided insights and asset selections for one parsed
//! document. The orchestrator reads the resulting summaries instead of raw
//! page content.

use std::sync::Arc;

use delver_core::capability::ParsedDocument;
use delver_llm::provider::{Llm, LlmError};
use delver_llm::types::ChatMessage;
use delver_llm::structured::structured_predict;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::prompts::{EXTRACT_INSIGHTS_PROMPT, fill};
use crate::state::asset_kind_label;

/// A single insight extracted from content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedInsight {
    /// The content of the extracted insight.
    pub content: String,
    /// Relevance score between 0.0 and 1.0.
    pub relevance_score: f64,
}

/// Structured response for insight extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InsightExtractionResponse {
    /// Key insights extracted from the content.
    pub insights: Vec<ExtractedInsight>,
    /// Asset IDs that are relevant to the directive.
    #[serde(default)]
    pub selected_asset_ids: Vec<String>,
}

/// Weak-LLM analysis over parsed documents.
pub struct ContentAnalysisService {
    llm: Arc<dyn Llm>,
}

impl ContentAnalysisService {
    /// Create the service over the weak model.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Analyze one parsed document against a directive.
    pub async fn analyze_parsed_document(
        &self,
        document: &ParsedDocument,
        directive: &str,
    ) -> Result<InsightExtractionResponse, LlmError> {
        let assets_list = if document.assets.is_empty() {
            "(none)".to_string()
        } else {
            document
                .assets
                .iter()
                .map(|a| {
                    format!(
                        "- [{}] id={} {}",
                        asset_kind_label(a.kind),
                        a.id,
                        a.description.as_deref().unwrap_or("")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = fill(
            EXTRACT_INSIGHTS_PROMPT,
            &[
                ("directive", directive),
                ("assets_list", &assets_list),
                ("content", &document.markdown),
            ],
        );

        let response: InsightExtractionResponse =
            structured_predict(self.llm.as_ref(), vec![ChatMessage::user(prompt)]).await?;
        tracing::debug!(
            url = %document.source_url,
            insights = response.insights.len(),
            "content analysis finished"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_llm::scripted::ScriptedLlm;
    use serde_json::json;

    fn doc(markdown: &str) -> ParsedDocument {
        ParsedDocument {
            source_url: "https://a".into(),
            markdown: markdown.into(),
            assets: vec![],
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn parses_structured_insights() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::structured_response(
            &json!({
                "insights": [
                    {"content": "energy density is 2x", "relevance_score": 0.9}
                ],
                "selected_asset_ids": ["img-1"]
            }),
        )]));
        let service = ContentAnalysisService::new(llm);

        let response = service
            .analyze_parsed_document(&doc("# Battery paper"), "compare energy density")
            .await
            .unwrap();
        assert_eq!(response.insights.len(), 1);
        assert_eq!(response.selected_asset_ids, vec!["img-1"]);
    }

    #[tokio::test]
    async fn malformed_model_output_is_a_schema_error() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::text_response(
            "not json at all",
        )]));
        let service = ContentAnalysisService::new(llm);

        let result = service.analyze_parsed_document(&doc("x"), "d").await;
        assert!(matches!(result, Err(LlmError::SchemaMismatch(_))));
    }
}
