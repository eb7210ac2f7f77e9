//! Document types and cache configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of cached document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Raw snippet retrieved from a web search.
    Source,
    /// Generated summary section derived from retrieved sources.
    Summary,
}

/// Volatility class that drives expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlCategory {
    /// Time-sensitive content, short TTL.
    News,
    /// Time-stable content, long TTL.
    Evergreen,
}

/// Metadata stored alongside every document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub kind: DocumentKind,

    /// Source URL (sources only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Source page title (sources only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Section heading (summaries only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,

    /// Research query that produced this document.
    pub originating_query: String,

    /// Set once at insertion, immutable afterwards.
    pub inserted_at: DateTime<Utc>,

    /// Assigned once at insertion, immutable afterwards. Expiry is always
    /// recomputed from this category and `inserted_at`, never stored.
    pub ttl_category: TtlCategory,

    /// Digest of `content` used for duplicate detection.
    pub content_hash: String,
}

/// A document held by a partition's vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A single search hit returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: DocumentMetadata,

    /// Cosine distance from the query vector, lower is closer.
    pub distance: f32,

    /// Present only when a reranker scored this result, higher is better.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

/// Raw source snippet handed in by the research orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInput {
    pub content: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub title: String,
}

/// Generated summary section handed in by the drafting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySection {
    pub title: String,
    pub content: String,
}

/// Aggregate statistics for one partition, computed by scanning metadata
/// at call time. `active + expired == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub sources: usize,
    pub summaries: usize,
    pub news: usize,
    pub evergreen: usize,
    pub expired: usize,
    pub active: usize,
}

/// TTL durations per volatility class, in days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TtlConfig {
    #[serde(default = "default_news_days")]
    pub news_days: i64,

    #[serde(default = "default_evergreen_days")]
    pub evergreen_days: i64,
}

fn default_news_days() -> i64 {
    3
}

fn default_evergreen_days() -> i64 {
    30
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            news_days: default_news_days(),
            evergreen_days: default_evergreen_days(),
        }
    }
}

/// Rule table for the news/evergreen classifier. Kept as configuration data
/// so deployments can localize the keyword and publisher lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRules {
    /// Recency-signaling keywords matched against a content prefix.
    #[serde(default = "default_news_keywords")]
    pub news_keywords: Vec<String>,

    /// Known news-publisher domains matched against the source URL.
    #[serde(default = "default_news_domains")]
    pub news_domains: Vec<String>,

    /// How many leading characters of content the keyword match inspects.
    #[serde(default = "default_classify_prefix_len")]
    pub classify_prefix_len: usize,
}

fn default_news_keywords() -> Vec<String> {
    [
        "breaking",
        "latest",
        "today",
        "yesterday",
        "update",
        "announces",
        "reported",
        "news",
        "current",
        "recent",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_news_domains() -> Vec<String> {
    [
        "reuters.com",
        "bloomberg.com",
        "cnn.com",
        "bbc.com",
        "apnews.com",
        "theguardian.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_classify_prefix_len() -> usize {
    200
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            news_keywords: default_news_keywords(),
            news_domains: default_news_domains(),
            classify_prefix_len: default_classify_prefix_len(),
        }
    }
}

/// Configuration for the memory cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Snapshot directory for the per-partition indexes. When unset the
    /// store runs fully in-memory for the process lifetime.
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,

    /// Supported language partitions.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Partition used for unknown or unsupported language codes.
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Whether to load the cross-encoder reranker.
    #[serde(default = "default_enable_reranker")]
    pub enable_reranker: bool,

    /// Minimum content length; shorter items are skipped on `add`.
    #[serde(default = "default_min_content_len")]
    pub min_content_len: usize,

    /// Recall pool multiplier applied when a reranker is available.
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,

    /// Hard cap on the stage-1 candidate pool.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Skip storing summary sections when the partition already holds at
    /// least as many summaries for the same originating query.
    #[serde(default = "default_dedupe_summaries")]
    pub dedupe_summaries: bool,

    #[serde(default)]
    pub ttl: TtlConfig,

    #[serde(default)]
    pub classifier: ClassifierRules,
}

fn default_languages() -> Vec<String> {
    vec!["en".into(), "es".into(), "de".into()]
}

fn default_language() -> String {
    "en".into()
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".into()
}

fn default_enable_reranker() -> bool {
    true
}

fn default_min_content_len() -> usize {
    50
}

fn default_oversample_factor() -> usize {
    3
}

fn default_max_candidates() -> usize {
    100
}

fn default_dedupe_summaries() -> bool {
    true
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            persist_dir: None,
            languages: default_languages(),
            default_language: default_language(),
            embedding_model: default_embedding_model(),
            enable_reranker: default_enable_reranker(),
            min_content_len: default_min_content_len(),
            oversample_factor: default_oversample_factor(),
            max_candidates: default_max_candidates(),
            dedupe_summaries: default_dedupe_summaries(),
            ttl: TtlConfig::default(),
            classifier: ClassifierRules::default(),
        }
    }
}

impl MemoryConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_days() {
        let ttl = TtlConfig::default();
        assert_eq!(ttl.news_days, 3);
        assert_eq!(ttl.evergreen_days, 30);
    }

    #[test]
    fn default_config_values() {
        let config = MemoryConfig::default();
        assert_eq!(config.languages, vec!["en", "es", "de"]);
        assert_eq!(config.default_language, "en");
        assert_eq!(config.min_content_len, 50);
        assert_eq!(config.oversample_factor, 3);
        assert_eq!(config.max_candidates, 100);
        assert!(config.persist_dir.is_none());
        assert!(config.dedupe_summaries);
    }

    #[test]
    fn metadata_serialization_roundtrip() {
        let metadata = DocumentMetadata {
            kind: DocumentKind::Source,
            url: Some("https://example.com/a".into()),
            title: Some("Example".into()),
            section_title: None,
            originating_query: "example query".into(),
            inserted_at: Utc::now(),
            ttl_category: TtlCategory::News,
            content_hash: "abc123".into(),
        };
        let json = serde_json::to_string(&metadata).unwrap();
        let back: DocumentMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, DocumentKind::Source);
        assert_eq!(back.ttl_category, TtlCategory::News);
        assert_eq!(back.content_hash, "abc123");
    }

    #[test]
    fn config_from_toml_overrides() {
        let toml_str = r#"
            languages = ["en", "fr"]
            default_language = "fr"

            [ttl]
            news_days = 1
        "#;
        let config: MemoryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.languages, vec!["en", "fr"]);
        assert_eq!(config.default_language, "fr");
        assert_eq!(config.ttl.news_days, 1);
        // Unspecified fields keep their defaults
        assert_eq!(config.ttl.evergreen_days, 30);
        assert_eq!(config.min_content_len, 50);
    }
}
