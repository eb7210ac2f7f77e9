//! Error types for the research memory cache.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Failed to initialize model: {0}")]
    ModelInit(String),

    #[error("Failed to generate embeddings: {0}")]
    Embedding(String),

    #[error("Reranking failed: {0}")]
    Rerank(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
