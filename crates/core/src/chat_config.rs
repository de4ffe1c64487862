//! Per-turn chatbot configuration.
//!
//! Supplied by the caller with each request and only ever *read* by the
//! core — the orchestration layer never mutates it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::retrieval::{RerankerConfig, RetrievalOptions, RetrieverConfig};
use crate::tool::ToolDescriptor;

/// The kind of model task a chain performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Rewrite/condense the user query before retrieval.
    QueryRewrite,
    /// Decide between calling a tool and producing a final answer.
    ToolDecision,
    /// Produce the final user-facing answer.
    Generation,
    /// Score candidate passages against a query.
    Rerank,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryRewrite => "query_rewrite",
            Self::ToolDecision => "tool_decision",
            Self::Generation => "generation",
            Self::Rerank => "rerank",
        }
    }
}

/// Sampling parameters for one task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// Configuration for one conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotConfig {
    /// Model identifier — also the unit name of the model backend.
    pub model_id: String,

    /// Per-task sampling parameter overrides.
    #[serde(default)]
    pub sampling: HashMap<TaskType, SamplingParams>,

    /// Tools available to the agent loop this turn.
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,

    /// Retriever fan-out configuration.
    #[serde(default)]
    pub retrievers: Vec<RetrieverConfig>,

    /// Reranker configuration.
    #[serde(default)]
    pub reranker: RerankerConfig,

    /// Cross-cutting retrieval options.
    #[serde(default)]
    pub retrieval: RetrievalOptions,

    /// System prompt override for this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Agent loop iteration budget override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
}

impl ChatbotConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            sampling: HashMap::new(),
            tools: Vec::new(),
            retrievers: Vec::new(),
            reranker: RerankerConfig::default(),
            retrieval: RetrievalOptions::default(),
            system_prompt: None,
            max_iterations: None,
        }
    }

    /// Sampling params for a task, falling back to defaults.
    pub fn sampling_for(&self, task: TaskType) -> SamplingParams {
        self.sampling.get(&task).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_falls_back_to_defaults() {
        let config = ChatbotConfig::new("gpt-4o");
        let params = config.sampling_for(TaskType::Generation);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!(params.max_tokens.is_none());
    }

    #[test]
    fn per_task_sampling_override() {
        let mut config = ChatbotConfig::new("gpt-4o");
        config.sampling.insert(
            TaskType::QueryRewrite,
            SamplingParams {
                temperature: 0.0,
                max_tokens: Some(128),
                stop: vec![],
            },
        );

        let rewrite = config.sampling_for(TaskType::QueryRewrite);
        assert_eq!(rewrite.temperature, 0.0);
        let generation = config.sampling_for(TaskType::Generation);
        assert!((generation.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn config_deserializes_minimal() {
        let config: ChatbotConfig = serde_json::from_str(r#"{"model_id": "gpt-4o"}"#).unwrap();
        assert_eq!(config.model_id, "gpt-4o");
        assert!(config.tools.is_empty());
        assert!(!config.reranker.enabled);
    }

    #[test]
    fn task_type_snake_case_wire_format() {
        let json = serde_json::to_string(&TaskType::QueryRewrite).unwrap();
        assert_eq!(json, r#""query_rewrite""#);
    }
}
