//! Vector index backend for a single partition.
//!
//! The store talks to its index through the [`VectorIndex`] trait so the
//! backend can be swapped (or faulted, in tests). The default backend is
//! [`MemoryIndex`], a brute-force cosine index over an in-process map with
//! an optional JSON snapshot on disk. Losing the snapshot only loses the
//! cache, never correctness, so load errors degrade to an empty index.

use crate::error::Result;
use crate::types::{Document, DocumentMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A scored candidate returned by a vector query.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    /// Cosine distance, lower is closer.
    pub distance: f32,
}

/// Contract the store needs from a vector index backend.
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a document and its embedding.
    fn upsert(&mut self, doc: Document, vector: Vec<f32>) -> Result<()>;

    /// Whether a document with this id exists.
    fn contains(&self, id: &str) -> bool;

    /// Fetch a document by id.
    fn get(&self, id: &str) -> Option<&Document>;

    /// Nearest candidates to `vector`, ranked by ascending distance.
    fn query(&self, vector: &[f32], k: usize) -> Vec<IndexHit>;

    /// Delete the given ids, returning how many were actually removed.
    fn delete(&mut self, ids: &[String]) -> Result<usize>;

    /// Destroy all documents and any on-disk state.
    fn drop_and_recreate(&mut self) -> Result<()>;

    /// All stored documents, for metadata scans.
    fn all(&self) -> Vec<&Document>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the current state to the snapshot, if one is configured.
    fn flush(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    doc: Document,
    vector: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<Entry>,
}

/// Brute-force cosine index with optional JSON snapshot persistence.
pub struct MemoryIndex {
    entries: HashMap<String, Entry>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryIndex {
    /// Open an index, reloading the snapshot at `snapshot_path` if present.
    ///
    /// A missing or unreadable snapshot starts an empty index; the cache is
    /// advisory and a lost snapshot is just a cold start.
    pub fn open(snapshot_path: Option<PathBuf>) -> Self {
        let entries = match &snapshot_path {
            Some(path) if path.exists() => match Self::load_snapshot(path) {
                Ok(entries) => {
                    debug!(path = %path.display(), count = entries.len(), "Reloaded index snapshot");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to reload index snapshot, starting empty");
                    HashMap::new()
                }
            },
            _ => HashMap::new(),
        };

        Self {
            entries,
            snapshot_path,
        }
    }

    fn load_snapshot(path: &std::path::Path) -> Result<HashMap<String, Entry>> {
        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(snapshot
            .entries
            .into_iter()
            .map(|e| (e.doc.id.clone(), e))
            .collect())
    }
}

impl VectorIndex for MemoryIndex {
    fn upsert(&mut self, doc: Document, vector: Vec<f32>) -> Result<()> {
        self.entries.insert(doc.id.clone(), Entry { doc, vector });
        Ok(())
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<&Document> {
        self.entries.get(id).map(|e| &e.doc)
    }

    fn query(&self, vector: &[f32], k: usize) -> Vec<IndexHit> {
        let mut hits: Vec<IndexHit> = self
            .entries
            .values()
            .map(|entry| IndexHit {
                id: entry.doc.id.clone(),
                content: entry.doc.content.clone(),
                metadata: entry.doc.metadata.clone(),
                distance: cosine_distance(vector, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }

    fn delete(&mut self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.entries.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn drop_and_recreate(&mut self) -> Result<()> {
        self.entries.clear();
        if let Some(path) = &self.snapshot_path {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn all(&self) -> Vec<&Document> {
        self.entries.values().map(|e| &e.doc).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn flush(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot = Snapshot {
            entries: self.entries.values().cloned().collect(),
        };
        let content = serde_json::to_string(&snapshot)?;

        // Write-then-rename so a crash mid-flush leaves the old snapshot intact
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), count = self.entries.len(), "Flushed index snapshot");
        Ok(())
    }
}

/// Cosine distance in `[0, 2]`, lower is closer. Zero-norm or
/// mismatched-dimension vectors are treated as maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentKind, TtlCategory};
    use chrono::Utc;
    use tempfile::TempDir;

    fn doc(id: &str, content: &str) -> Document {
        Document {
            id: id.into(),
            content: content.into(),
            metadata: DocumentMetadata {
                kind: DocumentKind::Source,
                url: None,
                title: None,
                section_title: None,
                originating_query: "q".into(),
                inserted_at: Utc::now(),
                ttl_category: TtlCategory::Evergreen,
                content_hash: id.into(),
            },
        }
    }

    #[test]
    fn query_ranks_by_cosine_distance() {
        let mut index = MemoryIndex::open(None);
        index.upsert(doc("a", "close"), vec![1.0, 0.0]).unwrap();
        index.upsert(doc("b", "far"), vec![0.0, 1.0]).unwrap();
        index.upsert(doc("c", "middle"), vec![1.0, 1.0]).unwrap();

        let hits = index.query(&[1.0, 0.0], 3);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn query_truncates_to_k() {
        let mut index = MemoryIndex::open(None);
        for i in 0..10 {
            index
                .upsert(doc(&format!("d{i}"), "text"), vec![1.0, i as f32])
                .unwrap();
        }
        assert_eq!(index.query(&[1.0, 0.0], 4).len(), 4);
    }

    #[test]
    fn upsert_is_idempotent_per_id() {
        let mut index = MemoryIndex::open(None);
        index.upsert(doc("a", "v1"), vec![1.0]).unwrap();
        index.upsert(doc("a", "v2"), vec![1.0]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().content, "v2");
    }

    #[test]
    fn delete_returns_actual_removals() {
        let mut index = MemoryIndex::open(None);
        index.upsert(doc("a", "x"), vec![1.0]).unwrap();
        let removed = index
            .delete(&["a".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!index.contains("a"));
    }

    #[test]
    fn drop_and_recreate_empties_index() {
        let mut index = MemoryIndex::open(None);
        index.upsert(doc("a", "x"), vec![1.0]).unwrap();
        index.drop_and_recreate().unwrap();
        assert!(index.is_empty());
        assert!(index.get("a").is_none());
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("en.json");

        let mut index = MemoryIndex::open(Some(path.clone()));
        index.upsert(doc("a", "persisted"), vec![1.0, 2.0]).unwrap();
        index.flush().unwrap();

        let reloaded = MemoryIndex::open(Some(path));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("a").unwrap().content, "persisted");
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("en.json");
        std::fs::write(&path, "not json at all").unwrap();

        let index = MemoryIndex::open(Some(path));
        assert!(index.is_empty());
    }

    #[test]
    fn zero_norm_vector_is_maximally_distant() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 2.0);
    }
}
