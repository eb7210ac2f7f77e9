//! Language-partitioned document store.
//!
//! [`MemoryStore`] is the caller-facing handle: the research orchestrator
//! constructs one at startup and injects it wherever cached retrieval is
//! wanted. Each supported language owns an isolated partition; unknown
//! language codes collapse to the configured default partition.
//!
//! The cache is advisory. Ingest and search never propagate backend or
//! model failures upward: `add` returns 0, `search` returns an empty list,
//! and the condition is logged.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::dedup;
use crate::embedding::{Embedder, FastembedEmbedder};
use crate::index::{MemoryIndex, VectorIndex};
use crate::rerank::{FastembedReranker, Reranker};
use crate::retrieval::Retriever;
use crate::ttl;
use crate::types::{
    Document, DocumentKind, DocumentMetadata, MemoryConfig, SearchResult, SourceInput, StoreStats,
    SummarySection, TtlCategory,
};

/// One isolated logical store scoped to a language.
///
/// The index lock serializes writers on the partition while letting reads
/// run concurrently.
struct Partition {
    language: String,
    index: RwLock<Box<dyn VectorIndex>>,
}

impl Partition {
    fn open(language: &str, config: &MemoryConfig) -> Self {
        let snapshot_path = config
            .persist_dir
            .as_ref()
            .map(|dir| dir.join(format!("{language}.json")));
        Self {
            language: language.to_string(),
            index: RwLock::new(Box::new(MemoryIndex::open(snapshot_path))),
        }
    }
}

/// The research memory cache.
pub struct MemoryStore {
    config: MemoryConfig,
    retriever: Retriever,
    partitions: RwLock<HashMap<String, Arc<Partition>>>,
}

impl MemoryStore {
    /// Create a store backed by fastembed models, with partitions for every
    /// configured language. Snapshots under `persist_dir` are reloaded when
    /// present; without a persist dir the cache is ephemeral.
    pub fn new(config: MemoryConfig) -> anyhow::Result<Self> {
        let embedder: Arc<dyn Embedder> =
            Arc::new(FastembedEmbedder::from_model_str(&config.embedding_model)?);
        let reranker: Option<Arc<dyn Reranker>> = if config.enable_reranker {
            Some(Arc::new(FastembedReranker::default()))
        } else {
            None
        };
        Self::with_collaborators(config, embedder, reranker)
    }

    /// Create a store with injected embedder and reranker collaborators.
    pub fn with_collaborators(
        config: MemoryConfig,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> anyhow::Result<Self> {
        if let Some(dir) = &config.persist_dir {
            std::fs::create_dir_all(dir)?;
        }

        info!(
            languages = ?config.languages,
            persist = config.persist_dir.is_some(),
            reranker = reranker.is_some(),
            "Initializing research memory cache"
        );

        let retriever = Retriever::new(
            embedder,
            reranker,
            config.oversample_factor,
            config.max_candidates,
        );

        let mut partitions = HashMap::new();
        for language in &config.languages {
            partitions.insert(language.clone(), Arc::new(Partition::open(language, &config)));
        }

        Ok(Self {
            config,
            retriever,
            partitions: RwLock::new(partitions),
        })
    }

    /// Pre-load the embedding model so the first `add` or `search` is not
    /// penalized by model initialization.
    pub async fn warmup(&self) -> anyhow::Result<()> {
        self.retriever.warmup().await?;
        Ok(())
    }

    /// Collapse unsupported language codes to the default partition.
    fn normalize_language(&self, language: &str) -> String {
        let language = language.trim().to_ascii_lowercase();
        if self.config.languages.iter().any(|l| *l == language) {
            language
        } else {
            debug!(
                requested = %language,
                fallback = %self.config.default_language,
                "Unsupported language, using default partition"
            );
            self.config.default_language.clone()
        }
    }

    /// Return the partition for a language, creating it if needed.
    async fn partition(&self, language: &str) -> Arc<Partition> {
        let language = self.normalize_language(language);

        if let Some(partition) = self.partitions.read().await.get(&language) {
            return partition.clone();
        }

        let mut partitions = self.partitions.write().await;
        partitions
            .entry(language.clone())
            .or_insert_with(|| Arc::new(Partition::open(&language, &self.config)))
            .clone()
    }

    /// Snapshot of all currently open partitions.
    async fn all_partitions(&self) -> Vec<Arc<Partition>> {
        self.partitions.read().await.values().cloned().collect()
    }

    /// Ingest retrieved sources and optional summary sections for a query.
    ///
    /// Content shorter than the configured minimum and content whose hash is
    /// already present in the partition are skipped silently. Returns the
    /// number of documents actually written, which is 0 when the embedding
    /// capability is unavailable.
    pub async fn add(
        &self,
        query: &str,
        sources: &[SourceInput],
        summary_sections: &[SummarySection],
        language: &str,
    ) -> usize {
        let partition = self.partition(language).await;
        let now = Utc::now();

        // Dedupe against the current index under a read lock; embedding is
        // expensive and must not run under the write lock.
        let pending = {
            let index = partition.index.read().await;
            self.collect_pending(query, sources, summary_sections, now, index.as_ref())
        };

        if pending.is_empty() {
            return 0;
        }

        let texts: Vec<String> = pending.iter().map(|d| d.content.clone()).collect();
        let embeddings = match self.retriever.embed(texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, nothing cached");
                return 0;
            }
        };

        if embeddings.len() != pending.len() {
            warn!(
                expected = pending.len(),
                got = embeddings.len(),
                "Embedder returned mismatched batch, nothing cached"
            );
            return 0;
        }

        let mut index = partition.index.write().await;
        let mut added = 0;
        for (doc, vector) in pending.into_iter().zip(embeddings) {
            // Re-check under the write lock: a concurrent add may have won
            // the race for the same content hash.
            if index.contains(&doc.id) {
                debug!(id = %doc.id, "Skipping duplicate inserted concurrently");
                continue;
            }
            match index.upsert(doc, vector) {
                Ok(()) => added += 1,
                Err(e) => warn!(error = %e, "Index upsert failed"),
            }
        }

        if added > 0 {
            if let Err(e) = index.flush() {
                warn!(error = %e, "Failed to persist index snapshot");
            }
        }

        debug!(added, language = %partition.language, query = %query, "Cached research documents");
        added
    }

    /// Build the deduplicated, classified batch of documents to insert.
    fn collect_pending(
        &self,
        query: &str,
        sources: &[SourceInput],
        summary_sections: &[SummarySection],
        now: DateTime<Utc>,
        index: &dyn VectorIndex,
    ) -> Vec<Document> {
        let mut pending: Vec<Document> = Vec::new();

        for source in sources {
            if source.content.chars().count() < self.config.min_content_len {
                debug!(url = %source.url, "Skipping source below minimum content length");
                continue;
            }

            let hash = dedup::content_hash(&source.content);
            let id = dedup::document_id(DocumentKind::Source, &hash);
            if index.contains(&id) || pending.iter().any(|d| d.id == id) {
                debug!(id = %id, "Skipping duplicate source");
                continue;
            }

            let ttl_category = ttl::classify(&self.config.classifier, &source.content, &source.url);
            pending.push(Document {
                id,
                content: source.content.clone(),
                metadata: DocumentMetadata {
                    kind: DocumentKind::Source,
                    url: non_empty(&source.url),
                    title: non_empty(&source.title),
                    section_title: None,
                    originating_query: query.to_string(),
                    inserted_at: now,
                    ttl_category,
                    content_hash: hash,
                },
            });
        }

        if !summary_sections.is_empty() && self.should_store_summaries(query, summary_sections, index)
        {
            for section in summary_sections {
                if section.content.chars().count() < self.config.min_content_len {
                    debug!(title = %section.title, "Skipping summary section below minimum content length");
                    continue;
                }

                let hash = dedup::content_hash(&section.content);
                let id = dedup::document_id(DocumentKind::Summary, &hash);
                if index.contains(&id) || pending.iter().any(|d| d.id == id) {
                    debug!(id = %id, "Skipping duplicate summary section");
                    continue;
                }

                pending.push(Document {
                    id,
                    content: section.content.clone(),
                    metadata: DocumentMetadata {
                        kind: DocumentKind::Summary,
                        url: None,
                        title: None,
                        section_title: non_empty(&section.title),
                        originating_query: query.to_string(),
                        inserted_at: now,
                        // Summaries are synthesized, time-stable knowledge
                        ttl_category: TtlCategory::Evergreen,
                        content_hash: hash,
                    },
                });
            }
        }

        pending
    }

    /// Query-level summary dedupe: once a query already has at least as many
    /// cached summaries as the incoming batch, storing more adds nothing.
    fn should_store_summaries(
        &self,
        query: &str,
        summary_sections: &[SummarySection],
        index: &dyn VectorIndex,
    ) -> bool {
        if !self.config.dedupe_summaries {
            return true;
        }

        let existing = index
            .all()
            .iter()
            .filter(|d| {
                d.metadata.kind == DocumentKind::Summary && d.metadata.originating_query == query
            })
            .count();

        if existing >= summary_sections.len() {
            debug!(
                query = %query,
                existing,
                "Summaries for this query already cached, skipping"
            );
            false
        } else {
            true
        }
    }

    /// Two-stage semantic search over one partition.
    ///
    /// With `filter_expired` the expiry filter runs after recall, so fewer
    /// than `top_k` results may come back even when the partition holds more
    /// documents.
    pub async fn search(
        &self,
        query: &str,
        language: &str,
        top_k: usize,
        filter_expired: bool,
    ) -> Vec<SearchResult> {
        self.search_at(query, language, top_k, filter_expired, Utc::now())
            .await
    }

    /// [`search`](Self::search) with an explicit expiry reference time.
    pub async fn search_at(
        &self,
        query: &str,
        language: &str,
        top_k: usize,
        filter_expired: bool,
        now: DateTime<Utc>,
    ) -> Vec<SearchResult> {
        if top_k == 0 {
            return Vec::new();
        }

        let partition = self.partition(language).await;

        let query_vector = match self.retriever.embed(vec![query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, returning no results");
                return Vec::new();
            }
        };

        let candidate_k = self.retriever.candidate_k(top_k);
        let hits = {
            let index = partition.index.read().await;
            index.query(&query_vector, candidate_k)
        };

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| {
                !filter_expired
                    || !ttl::is_expired(
                        &self.config.ttl,
                        hit.metadata.ttl_category,
                        hit.metadata.inserted_at,
                        now,
                    )
            })
            .map(|hit| SearchResult {
                content: hit.content,
                metadata: hit.metadata,
                distance: hit.distance,
                rerank_score: None,
            })
            .collect();

        let mut results = self.retriever.rerank(query, results).await;
        results.truncate(top_k);

        debug!(
            query = %query,
            language = %partition.language,
            results = results.len(),
            "Search complete"
        );
        results
    }

    /// Aggregate statistics for a partition, evaluated at the current time.
    pub async fn stats(&self, language: &str) -> StoreStats {
        self.stats_at(language, Utc::now()).await
    }

    /// [`stats`](Self::stats) with an explicit expiry reference time.
    pub async fn stats_at(&self, language: &str, now: DateTime<Utc>) -> StoreStats {
        let partition = self.partition(language).await;
        let index = partition.index.read().await;

        let mut stats = StoreStats::default();
        for doc in index.all() {
            stats.total += 1;
            match doc.metadata.kind {
                DocumentKind::Source => stats.sources += 1,
                DocumentKind::Summary => stats.summaries += 1,
            }
            match doc.metadata.ttl_category {
                TtlCategory::News => stats.news += 1,
                TtlCategory::Evergreen => stats.evergreen += 1,
            }
            if ttl::is_expired(
                &self.config.ttl,
                doc.metadata.ttl_category,
                doc.metadata.inserted_at,
                now,
            ) {
                stats.expired += 1;
            }
        }
        stats.active = stats.total - stats.expired;
        stats
    }

    /// Delete exactly the documents that are past expiry right now. `None`
    /// sweeps every partition. Returns the number of documents removed.
    pub async fn clear_expired(&self, language: Option<&str>) -> usize {
        self.clear_expired_at(language, Utc::now()).await
    }

    /// [`clear_expired`](Self::clear_expired) with an explicit expiry
    /// reference time.
    pub async fn clear_expired_at(&self, language: Option<&str>, now: DateTime<Utc>) -> usize {
        let partitions = match language {
            Some(language) => vec![self.partition(language).await],
            None => self.all_partitions().await,
        };

        let mut total_removed = 0;
        for partition in partitions {
            let mut index = partition.index.write().await;

            let expired_ids: Vec<String> = index
                .all()
                .iter()
                .filter(|d| {
                    ttl::is_expired(
                        &self.config.ttl,
                        d.metadata.ttl_category,
                        d.metadata.inserted_at,
                        now,
                    )
                })
                .map(|d| d.id.clone())
                .collect();

            if expired_ids.is_empty() {
                continue;
            }

            match index.delete(&expired_ids) {
                Ok(removed) => {
                    if let Err(e) = index.flush() {
                        warn!(error = %e, "Failed to persist index snapshot");
                    }
                    info!(
                        language = %partition.language,
                        removed,
                        "Cleared expired documents"
                    );
                    total_removed += removed;
                }
                Err(e) => {
                    warn!(
                        language = %partition.language,
                        error = %e,
                        "Failed to clear expired documents"
                    );
                }
            }
        }

        total_removed
    }

    /// Destroy and recreate partitions. `None` wipes every partition.
    /// Returns `false` when any backend operation fails; best-effort, never
    /// raises.
    pub async fn clear_all(&self, language: Option<&str>) -> bool {
        let partitions = match language {
            Some(language) => vec![self.partition(language).await],
            None => self.all_partitions().await,
        };

        let mut success = true;
        for partition in partitions {
            let mut index = partition.index.write().await;
            match index.drop_and_recreate() {
                Ok(()) => {
                    info!(language = %partition.language, "Cleared partition");
                }
                Err(e) => {
                    warn!(
                        language = %partition.language,
                        error = %e,
                        "Failed to clear partition"
                    );
                    success = false;
                }
            }
        }

        success
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
