//! The composer exposed as an invocable unit.
//!
//! Registering the composer under `retrieval.compose` lets the agent loop
//! treat multi-stage retrieval as just another tool: the loop invokes it
//! through the invocation abstraction like any other unit.

use async_trait::async_trait;
use ragline_core::retrieval::{RerankerConfig, RetrievalOptions, RetrieverConfig};
use ragline_invoke::{UnitError, UnitHandler};
use std::sync::Arc;

use crate::composer::Composer;

/// Canonical unit name for composed retrieval.
pub const COMPOSE_UNIT: &str = "retrieval.compose";

/// Unit wrapper around [`Composer`].
///
/// Input: `{query, retrievers: [RetrieverConfig], rerankers: [RerankerConfig],
/// options?: RetrievalOptions}`. Output: `{docs: [RetrievalCandidate]}`.
pub struct ComposerUnit {
    composer: Arc<Composer>,
}

impl ComposerUnit {
    pub fn new(composer: Arc<Composer>) -> Self {
        Self { composer }
    }
}

#[async_trait]
impl UnitHandler for ComposerUnit {
    fn name(&self) -> &str {
        COMPOSE_UNIT
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "retrievers": { "type": "array" },
                "rerankers": { "type": "array" },
                "options": { "type": "object" }
            },
            "required": ["query", "retrievers"]
        })
    }

    async fn call(&self, input: serde_json::Value) -> Result<serde_json::Value, UnitError> {
        let query = input["query"]
            .as_str()
            .ok_or_else(|| UnitError::invalid_input("'query' must be a string"))?
            .to_string();

        let retrievers: Vec<RetrieverConfig> = serde_json::from_value(input["retrievers"].clone())
            .map_err(|e| UnitError::invalid_input(format!("bad 'retrievers': {e}")))?;

        // The wire shape allows a list of rerankers; only one pass is
        // supported, so the first enabled entry wins.
        let reranker = match input.get("rerankers") {
            Some(value) if !value.is_null() => {
                let rerankers: Vec<RerankerConfig> = serde_json::from_value(value.clone())
                    .map_err(|e| UnitError::invalid_input(format!("bad 'rerankers': {e}")))?;
                rerankers
                    .into_iter()
                    .find(|r| r.enabled)
                    .unwrap_or_default()
            }
            _ => RerankerConfig::default(),
        };

        let options: RetrievalOptions = match input.get("options") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())
                .map_err(|e| UnitError::invalid_input(format!("bad 'options': {e}")))?,
            _ => RetrievalOptions::default(),
        };

        let docs = self
            .composer
            .retrieve(&query, &retrievers, &reranker, &options)
            .await;

        Ok(serde_json::json!({ "docs": docs }))
    }
}
