//! Language-partitioned research memory cache.
//!
//! This crate stores previously retrieved web snippets and generated
//! summary sections, keyed by semantic similarity rather than exact lookup,
//! so a research pipeline can answer repeat queries from local memory
//! instead of paying for fresh search and model calls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     MemoryStore                          │
//! │                                                          │
//! │  add ──► dedup ──► ttl classify ──► embed ──► upsert     │
//! │                                                          │
//! │  search ──► embed ──► recall (oversampled) ──► expiry    │
//! │             filter ──► rerank (optional) ──► top_k       │
//! │                                                          │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐          │
//! │  │ Partition  │  │ Partition  │  │ Partition  │          │
//! │  │    en      │  │    es      │  │    de      │          │
//! │  │ MemoryIndex│  │ MemoryIndex│  │ MemoryIndex│          │
//! │  └────────────┘  └────────────┘  └────────────┘          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The cache is advisory: losing it can never break the surrounding
//! pipeline, only slow it down. Model capabilities (embedding, reranking)
//! load lazily and degrade permanently on failure instead of raising per
//! call.

pub mod dedup;
pub mod embedding;
pub mod error;
pub mod index;
pub mod rerank;
pub mod retrieval;
pub mod store;
pub mod ttl;
pub mod types;

pub use embedding::{Embedder, FastembedEmbedder};
pub use error::{MemoryError, Result};
pub use index::{IndexHit, MemoryIndex, VectorIndex};
pub use rerank::{FastembedReranker, Reranker};
pub use retrieval::Retriever;
pub use store::MemoryStore;
pub use types::{
    ClassifierRules, Document, DocumentKind, DocumentMetadata, MemoryConfig, SearchResult,
    SourceInput, StoreStats, SummarySection, TtlCategory, TtlConfig,
};
