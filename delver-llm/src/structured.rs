//! Typed structured prediction on top of the [`Llm`] capability.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::provider::{Llm, LlmError};
use crate::types::ChatMessage;

/// Generate the JSON Schema for an output type.
pub fn schema_of<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema.schema).unwrap_or(serde_json::Value::Null)
}

/// Predict a typed value: derive the schema from `T`, ask the model, parse.
///
/// Schema violations surface as [`LlmError::SchemaMismatch`] so callers can
/// decide whether to retry with the model.
pub async fn structured_predict<T>(
    llm: &dyn Llm,
    messages: Vec<ChatMessage>,
) -> Result<T, LlmError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = schema_of::<T>();
    let value = llm.structured_predict(&schema, messages).await?;
    serde_json::from_value(value.clone())
        .map_err(|e| LlmError::SchemaMismatch(format!("{e}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedLlm;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Verdict {
        decision: String,
        confidence: f64,
    }

    #[test]
    fn schema_includes_properties() {
        let schema = schema_of::<Verdict>();
        assert!(schema["properties"]["decision"].is_object());
        assert!(schema["properties"]["confidence"].is_object());
    }

    #[tokio::test]
    async fn typed_prediction_parses_model_json() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text_response(
            r#"{"decision": "accept", "confidence": 0.9}"#,
        )]);
        let verdict: Verdict = structured_predict(&llm, vec![ChatMessage::user("judge")])
            .await
            .unwrap();
        assert_eq!(verdict.decision, "accept");
    }

    #[tokio::test]
    async fn schema_mismatch_is_reported() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text_response(r#"{"decision": 42}"#)]);
        let result: Result<Verdict, _> =
            structured_predict(&llm, vec![ChatMessage::user("judge")]).await;
        assert!(matches!(result, Err(LlmError::SchemaMismatch(_))));
    }
}
