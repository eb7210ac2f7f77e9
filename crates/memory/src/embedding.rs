//! Embedding generation for vector recall using fastembed.
//!
//! The embedding model is an expensive external capability: it is loaded
//! lazily on first use, at most once under concurrent first use, and a
//! failed load permanently disables embedding for the process lifetime
//! instead of being retried per call.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use tokio::task;
use tracing::{debug, info, instrument, warn};

use crate::error::{MemoryError, Result};

/// Text-to-vector collaborator. Deterministic for a fixed model version.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input text.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Pre-load the model so the first real call is not penalized.
    async fn warmup(&self) -> Result<()> {
        Ok(())
    }

    /// Whether the capability is still usable. `false` once initialization
    /// has permanently failed.
    fn available(&self) -> bool {
        true
    }
}

/// fastembed-backed embedder with at-most-once lazy initialization.
pub struct FastembedEmbedder {
    model_name: EmbeddingModel,
    dimension: usize,
    /// `None` after a failed load: the capability is disabled, not retried.
    model: OnceCell<Option<Arc<TextEmbedding>>>,
}

impl FastembedEmbedder {
    pub fn new(model_name: EmbeddingModel) -> Self {
        let dimension = match model_name {
            EmbeddingModel::AllMiniLML6V2 | EmbeddingModel::AllMiniLML6V2Q => 384,
            EmbeddingModel::AllMiniLML12V2 | EmbeddingModel::AllMiniLML12V2Q => 384,
            EmbeddingModel::BGESmallENV15 | EmbeddingModel::BGESmallENV15Q => 384,
            EmbeddingModel::MultilingualE5Small => 384,
            EmbeddingModel::MultilingualE5Base => 768,
            EmbeddingModel::MultilingualE5Large => 1024,
            EmbeddingModel::BGEBaseENV15 | EmbeddingModel::BGEBaseENV15Q => 768,
            EmbeddingModel::BGELargeENV15 | EmbeddingModel::BGELargeENV15Q => 1024,
            _ => 384,
        };

        Self {
            model_name,
            dimension,
            model: OnceCell::new(),
        }
    }

    /// Creates an embedder from a model name string.
    ///
    /// Returns an error if the model name is not recognized.
    pub fn from_model_str(model_name: &str) -> Result<Self> {
        let model = match model_name {
            "all-MiniLM-L6-v2" | "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
            "all-MiniLM-L12-v2" | "AllMiniLML12V2" => EmbeddingModel::AllMiniLML12V2,
            "bge-small-en-v1.5" | "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" | "BGEBaseENV15" => EmbeddingModel::BGEBaseENV15,
            "multilingual-e5-small" | "MultilingualE5Small" => EmbeddingModel::MultilingualE5Small,
            "multilingual-e5-base" | "MultilingualE5Base" => EmbeddingModel::MultilingualE5Base,
            "multilingual-e5-large" | "MultilingualE5Large" => EmbeddingModel::MultilingualE5Large,
            _ => {
                return Err(MemoryError::ModelInit(format!(
                    "Unknown embedding model: '{}'. Supported models: all-MiniLM-L6-v2, \
                     bge-small-en-v1.5, multilingual-e5-small, etc.",
                    model_name
                )));
            }
        };
        Ok(Self::new(model))
    }

    /// Returns the embedding dimension for this model.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[instrument(skip(self))]
    fn get_or_init_model(&self) -> Option<Arc<TextEmbedding>> {
        self.model
            .get_or_init(|| {
                info!(model = ?self.model_name, "Initializing embedding model");

                let options = InitOptions::new(self.model_name.clone());
                match TextEmbedding::try_new(options) {
                    Ok(model) => {
                        info!(
                            model = ?self.model_name,
                            dimension = self.dimension,
                            "Embedding model initialized successfully"
                        );
                        Some(Arc::new(model))
                    }
                    Err(e) => {
                        warn!(
                            model = ?self.model_name,
                            error = %e,
                            "Embedding model failed to load, embedding disabled for this process"
                        );
                        None
                    }
                }
            })
            .clone()
    }
}

#[async_trait]
impl Embedder for FastembedEmbedder {
    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.get_or_init_model().ok_or_else(|| {
            MemoryError::ModelInit("embedding model unavailable".into())
        })?;

        // fastembed is synchronous, so run inference on the blocking pool
        let embeddings = task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| MemoryError::Embedding(e.to_string()))
        })
        .await??;

        debug!(
            batch_size = embeddings.len(),
            dimension = embeddings.first().map(|e| e.len()).unwrap_or(0),
            "Generated embeddings"
        );

        Ok(embeddings)
    }

    async fn warmup(&self) -> Result<()> {
        if self.model.get().is_some() {
            debug!("Embedding model already initialized, skipping warmup");
            return Ok(());
        }

        info!(model = ?self.model_name, "Warming up embedding model");
        self.get_or_init_model()
            .ok_or_else(|| MemoryError::ModelInit("embedding model unavailable".into()))?;
        Ok(())
    }

    fn available(&self) -> bool {
        // Unknown until first use; only an actual failed load disables it
        self.model.get().map(|m| m.is_some()).unwrap_or(true)
    }
}

impl Default for FastembedEmbedder {
    fn default() -> Self {
        Self::new(EmbeddingModel::AllMiniLML6V2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_dimension() {
        let embedder = FastembedEmbedder::default();
        assert_eq!(embedder.dimension(), 384);
    }

    #[test]
    fn from_model_str_parses_known_models() {
        assert!(FastembedEmbedder::from_model_str("all-MiniLM-L6-v2").is_ok());
        assert!(FastembedEmbedder::from_model_str("multilingual-e5-small").is_ok());
        assert!(FastembedEmbedder::from_model_str("unknown-model").is_err());
    }

    #[test]
    fn available_before_first_use() {
        let embedder = FastembedEmbedder::default();
        assert!(Embedder::available(&embedder));
    }

    // Integration test - downloads model, run with: cargo test -- --ignored
    #[tokio::test]
    #[ignore = "Downloads model from network, slow"]
    async fn embed_batch_produces_vectors() {
        let embedder = FastembedEmbedder::default();
        let embeddings = embedder
            .embed(vec!["Hello".into(), "World".into()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        for emb in &embeddings {
            assert_eq!(emb.len(), 384);
            assert!(emb.iter().any(|&x| x != 0.0));
        }
    }
}
