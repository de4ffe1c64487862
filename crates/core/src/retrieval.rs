//! Retrieval domain types.
//!
//! A `RetrievalCandidate` is one passage returned by a retriever; the
//! composer in `ragline-retrieval` merges candidates from several
//! retrievers and optionally reranks them into a single ordered context.

use serde::{Deserialize, Serialize};

use crate::invocation::InvocationMode;

/// A candidate passage returned by a retriever.
///
/// Within a single retriever call candidates are unique by `source_id`;
/// merging across retrievers does not deduplicate unless configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    /// The passage text.
    pub page_content: String,

    /// Score assigned by the retriever.
    pub retrieval_score: f32,

    /// Score assigned by the reranker, when a rerank pass ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,

    /// Identifier of the source document/chunk.
    pub source_id: String,
}

/// Configuration for one retriever in a fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Unit name understood by the invocation abstraction
    /// (e.g. "retriever.bm25", "retriever.vector").
    pub unit: String,

    /// Index/workspace subset this retriever is scoped to.
    #[serde(default)]
    pub workspace_ids: Vec<String>,

    /// How many candidates to request from this retriever.
    pub top_k: usize,

    /// Where the retriever runs.
    #[serde(default)]
    pub mode: InvocationMode,
}

/// Reranker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Whether to run a rerank pass over the merged candidates.
    #[serde(default)]
    pub enabled: bool,

    /// Unit name of the reranker.
    #[serde(default = "default_reranker_unit")]
    pub unit: String,

    /// Final result count after ordering. Zero means no truncation.
    #[serde(default)]
    pub top_k: usize,

    /// Where the reranker runs.
    #[serde(default)]
    pub mode: InvocationMode,
}

fn default_reranker_unit() -> String {
    "reranker.default".into()
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            unit: default_reranker_unit(),
            top_k: 0,
            mode: InvocationMode::Local,
        }
    }
}

/// Cross-cutting retrieval options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalOptions {
    /// Deduplicate merged candidates by `source_id` (first occurrence in
    /// concatenation order wins). Off by default.
    #[serde(default)]
    pub dedup_by_source: bool,
}
