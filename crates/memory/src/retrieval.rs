//! Two-stage retrieval: approximate recall, then optional precision rerank.
//!
//! Stage 1 embeds the query and pulls an oversampled candidate pool from
//! the partition index so that expiry filtering and rerank reordering have
//! material to work with. Stage 2, when a reranker capability is present,
//! rescores every surviving candidate pairwise against the query. A rerank
//! failure keeps the stage-1 distance ordering.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::error::Result;
use crate::rerank::Reranker;
use crate::types::SearchResult;

/// Embedding and reranking half of the retrieval pipeline. The store owns
/// the partition indexes and delegates everything model-related here.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    oversample_factor: usize,
    max_candidates: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
        oversample_factor: usize,
        max_candidates: usize,
    ) -> Self {
        Self {
            embedder,
            reranker,
            oversample_factor,
            max_candidates,
        }
    }

    /// Embed a batch of texts through the embedder capability.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.embedder.embed(texts).await
    }

    /// Pre-load the embedding model.
    pub async fn warmup(&self) -> Result<()> {
        self.embedder.warmup().await
    }

    /// Whether a usable reranker capability is present.
    pub fn rerank_available(&self) -> bool {
        self.reranker.as_ref().is_some_and(|r| r.available())
    }

    /// Stage-1 candidate pool size for a requested result count. Oversamples
    /// only when there is a reranker to spend the extra candidates on.
    pub fn candidate_k(&self, top_k: usize) -> usize {
        let factor = if self.rerank_available() {
            self.oversample_factor
        } else {
            1
        };
        (top_k.saturating_mul(factor)).min(self.max_candidates)
    }

    /// Stage 2: score the surviving candidates against the query and reorder
    /// by descending relevance. Degrades to the incoming (stage-1 distance)
    /// ordering when no reranker is available or scoring fails.
    pub async fn rerank(&self, query: &str, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        let Some(reranker) = &self.reranker else {
            return results;
        };
        if !reranker.available() || results.is_empty() {
            return results;
        }

        let candidates: Vec<String> = results.iter().map(|r| r.content.clone()).collect();
        match reranker.score(query.to_string(), candidates).await {
            Ok(scores) if scores.len() == results.len() => {
                for (result, score) in results.iter_mut().zip(scores) {
                    result.rerank_score = Some(score);
                }
                results.sort_by(|a, b| {
                    b.rerank_score
                        .partial_cmp(&a.rerank_score)
                        .unwrap_or(Ordering::Equal)
                });
                debug!(count = results.len(), "Reranked candidates");
            }
            Ok(scores) => {
                warn!(
                    expected = results.len(),
                    got = scores.len(),
                    "Reranker returned mismatched score count, keeping recall order"
                );
            }
            Err(e) => {
                warn!(error = %e, "Reranking failed, keeping recall order");
            }
        }

        results
    }
}
