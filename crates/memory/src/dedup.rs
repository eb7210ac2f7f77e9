//! Content-hash deduplication.
//!
//! Document identity is derived from a truncated Sha256 digest of the
//! content bytes, so re-inserting the same snippet is detected across
//! process restarts without any extra bookkeeping.

use crate::types::DocumentKind;
use sha2::{Digest, Sha256};

/// Hex characters kept from the full Sha256 digest.
const DIGEST_LEN: usize = 16;

/// Stable digest of document content. Identical bytes always produce the
/// same digest.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(DIGEST_LEN);
    hex
}

/// Document id for a given kind and content digest. Within a partition at
/// most one document may exist per id.
pub fn document_id(kind: DocumentKind, hash: &str) -> String {
    match kind {
        DocumentKind::Source => format!("src_{hash}"),
        DocumentKind::Summary => format!("sum_{hash}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        let a = content_hash("the same content");
        let b = content_hash("the same content");
        assert_eq!(a, b);
        assert_eq!(a.len(), DIGEST_LEN);
    }

    #[test]
    fn hash_differs_for_different_content() {
        assert_ne!(content_hash("alpha"), content_hash("beta"));
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let h = content_hash("anything at all");
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn ids_are_prefixed_by_kind() {
        let hash = content_hash("some content");
        assert_eq!(
            document_id(DocumentKind::Source, &hash),
            format!("src_{hash}")
        );
        assert_eq!(
            document_id(DocumentKind::Summary, &hash),
            format!("sum_{hash}")
        );
    }

    #[test]
    fn same_content_different_kind_gets_distinct_ids() {
        let hash = content_hash("shared text");
        assert_ne!(
            document_id(DocumentKind::Source, &hash),
            document_id(DocumentKind::Summary, &hash)
        );
    }
}
