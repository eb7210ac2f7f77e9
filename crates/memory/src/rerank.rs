//! Cross-encoder reranking for precision ordering.
//!
//! The reranker is an optional capability with the same lifecycle as the
//! embedder: lazy one-shot load, permanent downgrade on failure. Callers
//! treat any rerank error as "keep the recall ordering", never as fatal.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use once_cell::sync::OnceCell;
use tokio::task;
use tracing::{debug, info, instrument, warn};

use crate::error::{MemoryError, Result};

/// Pairwise relevance scorer. Returns one score per candidate, aligned with
/// the input order; higher is more relevant.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: String, candidates: Vec<String>) -> Result<Vec<f32>>;

    /// Whether the capability is still usable. `false` once initialization
    /// has permanently failed.
    fn available(&self) -> bool {
        true
    }
}

/// fastembed cross-encoder reranker with at-most-once lazy initialization.
pub struct FastembedReranker {
    model_name: RerankerModel,
    /// `None` after a failed load: the capability is disabled, not retried.
    model: OnceCell<Option<Arc<TextRerank>>>,
}

impl FastembedReranker {
    pub fn new(model_name: RerankerModel) -> Self {
        Self {
            model_name,
            model: OnceCell::new(),
        }
    }

    #[instrument(skip(self))]
    fn get_or_init_model(&self) -> Option<Arc<TextRerank>> {
        self.model
            .get_or_init(|| {
                info!(model = ?self.model_name, "Initializing reranker model");

                let options = RerankInitOptions::new(self.model_name.clone());
                match TextRerank::try_new(options) {
                    Ok(model) => {
                        info!(model = ?self.model_name, "Reranker model initialized successfully");
                        Some(Arc::new(model))
                    }
                    Err(e) => {
                        warn!(
                            model = ?self.model_name,
                            error = %e,
                            "Reranker model failed to load, reranking disabled for this process"
                        );
                        None
                    }
                }
            })
            .clone()
    }
}

#[async_trait]
impl Reranker for FastembedReranker {
    #[instrument(skip(self, query, candidates), fields(candidates = candidates.len()))]
    async fn score(&self, query: String, candidates: Vec<String>) -> Result<Vec<f32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let model = self
            .get_or_init_model()
            .ok_or_else(|| MemoryError::ModelInit("reranker model unavailable".into()))?;

        let count = candidates.len();
        let scored = task::spawn_blocking(move || {
            model
                .rerank(query, candidates, false, None)
                .map_err(|e| MemoryError::Rerank(e.to_string()))
        })
        .await??;

        // fastembed returns results ordered by score; map them back onto
        // the caller's candidate order via the original index
        let mut scores = vec![0.0f32; count];
        for result in scored {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }

        debug!(candidates = count, "Scored candidates with cross-encoder");
        Ok(scores)
    }

    fn available(&self) -> bool {
        // Unknown until first use; only an actual failed load disables it
        self.model.get().map(|m| m.is_some()).unwrap_or(true)
    }
}

impl Default for FastembedReranker {
    fn default() -> Self {
        Self::new(RerankerModel::BGERerankerBase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_before_first_use() {
        let reranker = FastembedReranker::default();
        assert!(Reranker::available(&reranker));
    }

    // Integration test - downloads model, run with: cargo test -- --ignored
    #[tokio::test]
    #[ignore = "Downloads model from network, slow"]
    async fn relevant_candidate_scores_higher() {
        let reranker = FastembedReranker::default();
        let scores = reranker
            .score(
                "rust programming language".into(),
                vec![
                    "Rust is a systems programming language focused on safety.".into(),
                    "The recipe calls for two cups of flour.".into(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
    }
}
