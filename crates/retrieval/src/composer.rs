//! Multi-retriever composition with optional reranking.
//!
//! Failure policy: a single retriever failing does not abort the call —
//! its results are dropped with a logged warning and retrieval proceeds
//! with whatever succeeded. A reranker failure falls back to the
//! unranked retrieval-score ordering.

use futures::future::join_all;
use ragline_core::invocation::{InvocationRequest, Invoker};
use ragline_core::retrieval::{
    RerankerConfig, RetrievalCandidate, RetrievalOptions, RetrieverConfig,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Composes candidates from several retrievers into one ranked context.
pub struct Composer {
    invoker: Arc<dyn Invoker>,
}

impl Composer {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self { invoker }
    }

    /// Fan the query out, merge, optionally rerank, order, and truncate.
    ///
    /// Candidates are concatenated in retriever-config order with each
    /// retriever's internal ranking preserved; the final sort is stable,
    /// so ties keep concatenation order.
    pub async fn retrieve(
        &self,
        query: &str,
        retrievers: &[RetrieverConfig],
        reranker: &RerankerConfig,
        options: &RetrievalOptions,
    ) -> Vec<RetrievalCandidate> {
        // Independent calls, issued concurrently.
        let calls = retrievers
            .iter()
            .map(|config| self.call_retriever(query, config));
        let results = join_all(calls).await;

        let mut candidates: Vec<RetrievalCandidate> = Vec::new();
        for (config, result) in retrievers.iter().zip(results) {
            match result {
                Some(docs) => {
                    debug!(unit = %config.unit, count = docs.len(), "Retriever returned candidates");
                    candidates.extend(docs);
                }
                None => {
                    warn!(unit = %config.unit, "Retriever failed, dropping its results");
                }
            }
        }

        if options.dedup_by_source {
            let mut seen = HashSet::new();
            candidates.retain(|c| seen.insert(c.source_id.clone()));
        }

        if reranker.enabled && !candidates.is_empty() {
            match self.call_reranker(query, &candidates, reranker).await {
                Some(scores) => {
                    for (candidate, score) in candidates.iter_mut().zip(scores) {
                        candidate.rerank_score = Some(score);
                    }
                }
                None => {
                    warn!(unit = %reranker.unit, "Reranker failed, falling back to retrieval scores");
                }
            }
        }

        // Rerank score when present, retrieval score otherwise; stable.
        candidates.sort_by(|a, b| {
            let score_a = a.rerank_score.unwrap_or(a.retrieval_score);
            let score_b = b.rerank_score.unwrap_or(b.retrieval_score);
            score_b.partial_cmp(&score_a).unwrap_or(Ordering::Equal)
        });

        if reranker.top_k > 0 {
            candidates.truncate(reranker.top_k);
        }
        candidates
    }

    async fn call_retriever(
        &self,
        query: &str,
        config: &RetrieverConfig,
    ) -> Option<Vec<RetrievalCandidate>> {
        let payload = serde_json::json!({
            "query": query,
            "workspace_ids": config.workspace_ids,
            "top_k": config.top_k,
        });
        let request = InvocationRequest::new(&config.unit, payload, config.mode);
        let result = self.invoker.invoke(request).await;

        if !result.is_success() {
            warn!(unit = %config.unit, error = %result.error_message(), "Retriever invocation failed");
            return None;
        }

        match serde_json::from_value::<Vec<RetrievalCandidate>>(result.payload["docs"].clone()) {
            Ok(docs) => Some(docs),
            Err(e) => {
                warn!(unit = %config.unit, error = %e, "Malformed retriever response");
                None
            }
        }
    }

    /// One rerank pass over the full candidate set. Returns one score per
    /// candidate, aligned with input order.
    async fn call_reranker(
        &self,
        query: &str,
        candidates: &[RetrievalCandidate],
        config: &RerankerConfig,
    ) -> Option<Vec<f32>> {
        let payload = serde_json::json!({
            "query": query,
            "docs": candidates,
            "top_k": config.top_k,
        });
        let request = InvocationRequest::new(&config.unit, payload, config.mode);
        let result = self.invoker.invoke(request).await;

        if !result.is_success() {
            warn!(unit = %config.unit, error = %result.error_message(), "Reranker invocation failed");
            return None;
        }

        let scores: Vec<f32> =
            match serde_json::from_value(result.payload["scores"].clone()) {
                Ok(scores) => scores,
                Err(e) => {
                    warn!(unit = %config.unit, error = %e, "Malformed reranker response");
                    return None;
                }
            };

        if scores.len() != candidates.len() {
            warn!(
                unit = %config.unit,
                expected = candidates.len(),
                got = scores.len(),
                "Reranker returned wrong score count"
            );
            return None;
        }
        Some(scores)
    }
}
