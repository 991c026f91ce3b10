//! Query planning with the weak LLM: decomposition and follow-ups.

use std::sync::Arc;

use delver_llm::provider::{Llm, LlmError};
use delver_llm::structured::structured_predict;
use delver_llm::types::ChatMessage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::prompts::{DECOMPOSE_QUERY_PROMPT, GENERATE_FOLLOW_UPS_PROMPT, fill};

/// Structured response for decomposing a request into search queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DecomposedQueryResponse {
    /// Decomposed web search queries. One for simple requests; several for
    /// broad or multi-part requests.
    pub queries: Vec<String>,
}

/// Structured response for follow-up query generation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FollowUpQueryResponse {
    /// Generated follow-up queries.
    pub queries: Vec<String>,
}

/// Query optimization and follow-up generation.
pub struct QueryService {
    llm: Arc<dyn Llm>,
}

impl QueryService {
    /// Create the service over the weak model.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Decompose a research goal into 1..N engine-ready queries.
    ///
    /// Deterministic given a fixed model: the system prompt pins the output
    /// form. Blank queries are dropped.
    pub async fn decompose_query(&self, query: &str) -> Result<Vec<String>, LlmError> {
        let prompt = fill(DECOMPOSE_QUERY_PROMPT, &[("query", query)]);
        let response: DecomposedQueryResponse =
            structured_predict(self.llm.as_ref(), vec![ChatMessage::user(prompt)]).await?;
        let queries: Vec<String> = response
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        tracing::debug!(count = queries.len(), "decomposed query");
        Ok(queries)
    }

    /// Generate targeted follow-up queries from insights gathered so far.
    pub async fn generate_follow_up_queries(
        &self,
        insights: &[String],
        original_query: &str,
    ) -> Result<Vec<String>, LlmError> {
        if insights.is_empty() {
            return Ok(vec![]);
        }
        let insights_block = insights
            .iter()
            .map(|i| format!("- {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let today = chrono::Local::now().date_naive().to_string();
        let prompt = fill(
            GENERATE_FOLLOW_UPS_PROMPT,
            &[
                ("original_query", original_query),
                ("insights", &insights_block),
                ("current_date", &today),
            ],
        );
        let response: FollowUpQueryResponse =
            structured_predict(self.llm.as_ref(), vec![ChatMessage::user(prompt)]).await?;
        Ok(response.queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_llm::scripted::ScriptedLlm;
    use serde_json::json;

    #[tokio::test]
    async fn decompose_drops_blank_queries() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::structured_response(
            &json!({"queries": ["solid state battery energy density", "  ", "li-ion safety record"]}),
        )]));
        let service = QueryService::new(llm);

        let queries = service.decompose_query("compare batteries").await.unwrap();
        assert_eq!(
            queries,
            vec!["solid state battery energy density", "li-ion safety record"]
        );
    }

    #[tokio::test]
    async fn follow_ups_derive_from_insights() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::structured_response(
            &json!({"queries": ["solid state electrolyte degradation mechanisms"]}),
        )]));
        let service = QueryService::new(llm);

        let queries = service
            .generate_follow_up_queries(
                &["SSB energy density ~2x Li-ion".to_string()],
                "compare batteries",
            )
            .await
            .unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("electrolyte"));
    }

    #[tokio::test]
    async fn follow_ups_short_circuit_without_insights() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let service = QueryService::new(Arc::clone(&llm) as Arc<dyn Llm>);

        let queries = service.generate_follow_up_queries(&[], "q").await.unwrap();
        assert!(queries.is_empty());
        assert_eq!(llm.calls(), 0);
    }
}
