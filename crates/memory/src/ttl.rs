//! TTL classification and expiry policy.
//!
//! Sources are classified once at insertion into [`TtlCategory::News`] or
//! [`TtlCategory::Evergreen`]; expiry is a pure function of that category,
//! the insertion timestamp, and the current time. Nothing here stores an
//! expiry flag, so a document that is expired at time T stays expired at
//! every later time.

use crate::types::{ClassifierRules, TtlCategory, TtlConfig};
use chrono::{DateTime, Duration, Utc};

/// Classify raw source content into a volatility class.
///
/// A recency keyword in the leading content prefix, or a known
/// news-publisher domain in the URL, marks the content as news. Everything
/// else defaults to evergreen.
pub fn classify(rules: &ClassifierRules, content: &str, url: &str) -> TtlCategory {
    let prefix: String = content
        .chars()
        .take(rules.classify_prefix_len)
        .collect::<String>()
        .to_lowercase();
    let url = url.to_lowercase();

    let is_news = rules
        .news_keywords
        .iter()
        .any(|keyword| prefix.contains(keyword.as_str()))
        || rules
            .news_domains
            .iter()
            .any(|domain| url.contains(domain.as_str()));

    if is_news {
        TtlCategory::News
    } else {
        TtlCategory::Evergreen
    }
}

/// Absolute expiry instant for a document.
pub fn expiry_at(
    ttl: &TtlConfig,
    category: TtlCategory,
    inserted_at: DateTime<Utc>,
) -> DateTime<Utc> {
    let days = match category {
        TtlCategory::News => ttl.news_days,
        TtlCategory::Evergreen => ttl.evergreen_days,
    };
    inserted_at + Duration::days(days)
}

/// Whether a document is past its expiry at `now`. Monotonic in `now`.
pub fn is_expired(
    ttl: &TtlConfig,
    category: TtlCategory,
    inserted_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    now > expiry_at(ttl, category, inserted_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ClassifierRules {
        ClassifierRules::default()
    }

    #[test]
    fn keyword_in_prefix_classifies_as_news() {
        let content = "Breaking developments in the semiconductor supply chain this week.";
        assert_eq!(classify(&rules(), content, ""), TtlCategory::News);
    }

    #[test]
    fn keyword_past_prefix_is_ignored() {
        // Keyword appears only after the inspected prefix window
        let padding = "a".repeat(250);
        let content = format!("{padding} breaking");
        assert_eq!(classify(&rules(), &content, ""), TtlCategory::Evergreen);
    }

    #[test]
    fn news_domain_classifies_as_news() {
        let content = "A long-form explainer on how semiconductors are manufactured.";
        assert_eq!(
            classify(&rules(), content, "https://www.reuters.com/tech/article"),
            TtlCategory::News
        );
    }

    #[test]
    fn no_marker_defaults_to_evergreen() {
        let content = "Photosynthesis converts light energy into chemical energy.";
        assert_eq!(
            classify(&rules(), content, "https://example.edu/biology"),
            TtlCategory::Evergreen
        );
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(
            classify(&rules(), "LATEST figures show growth", ""),
            TtlCategory::News
        );
        assert_eq!(
            classify(&rules(), "An essay on glaciers", "https://BBC.com/earth"),
            TtlCategory::News
        );
    }

    #[test]
    fn expiry_uses_category_days() {
        let ttl = TtlConfig::default();
        let t0 = Utc::now();
        assert_eq!(
            expiry_at(&ttl, TtlCategory::News, t0),
            t0 + Duration::days(3)
        );
        assert_eq!(
            expiry_at(&ttl, TtlCategory::Evergreen, t0),
            t0 + Duration::days(30)
        );
    }

    #[test]
    fn news_expires_no_later_than_evergreen() {
        let ttl = TtlConfig::default();
        let t0 = Utc::now();
        assert!(
            expiry_at(&ttl, TtlCategory::News, t0) <= expiry_at(&ttl, TtlCategory::Evergreen, t0)
        );
    }

    #[test]
    fn expiry_is_monotonic() {
        let ttl = TtlConfig::default();
        let t0 = Utc::now();
        let t1 = t0 + Duration::days(4);
        let t2 = t1 + Duration::hours(1);

        assert!(is_expired(&ttl, TtlCategory::News, t0, t1));
        // Once expired, a later clock can never resurrect the document
        assert!(is_expired(&ttl, TtlCategory::News, t0, t2));
    }

    #[test]
    fn not_expired_before_deadline() {
        let ttl = TtlConfig::default();
        let t0 = Utc::now();
        assert!(!is_expired(&ttl, TtlCategory::News, t0, t0));
        assert!(!is_expired(
            &ttl,
            TtlCategory::News,
            t0,
            t0 + Duration::days(2)
        ));
        assert!(!is_expired(
            &ttl,
            TtlCategory::Evergreen,
            t0,
            t0 + Duration::days(29)
        ));
    }
}
