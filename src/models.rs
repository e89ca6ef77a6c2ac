//! Data models for candidate stories and their stored representations.
//!
//! Two shapes move through the pipeline:
//! - [`CandidateItem`]: raw text/link pair straight out of the extractor,
//!   identified only by its position in the batch
//! - [`Item`]: a cleaned story whose canonical absolute `link` is its
//!   identity key within the store
//!
//! [`CommitResult`] reports what a batch commit actually did, separating
//! rows written from rows skipped because some other writer already held
//! their link.

use serde::{Deserialize, Serialize};

/// A raw story as extracted from the source document, before cleaning.
///
/// Ephemeral: produced by the extractor, consumed by the normalizer, and
/// never stored. Either field may be empty here; the normalizer is the
/// component that rejects such candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Display text as rendered in the document, possibly carrying a
    /// trailing "time ago" annotation.
    pub raw_text: String,
    /// The `href` attribute value, relative or absolute. Empty when the
    /// element carried no link attribute.
    pub raw_link: String,
}

/// A cleaned story ready for dedup and storage.
///
/// # Invariants
///
/// * `link` is a non-empty canonical absolute URL and is globally unique
///   within the store.
/// * `headline` is non-empty (empty-after-clean candidates are dropped by
///   the normalizer, never stored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Cleaned display text.
    pub headline: String,
    /// Canonical absolute URL; the identity key.
    pub link: String,
}

/// Outcome of one atomic batch commit.
///
/// `accepted` holds the items actually written, in input order; this is
/// exactly the batch the notifier must be offered. `skipped_existing`
/// counts rows the store refused because their link was already recorded
/// (a concurrent run got there first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// Items durably recorded by this commit, in input order.
    pub accepted: Vec<Item>,
    /// Rows skipped because their link already existed.
    pub skipped_existing: usize,
}

impl CommitResult {
    /// Number of rows this commit wrote.
    pub fn rows_written(&self) -> usize {
        self.accepted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_serialization_round_trip() {
        let item = Item {
            headline: "New AI model launches".to_string(),
            link: "https://www.cnet.com/ai-atlas/new-ai-model/".to_string(),
        };

        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_commit_result_rows_written() {
        let result = CommitResult {
            accepted: vec![Item {
                headline: "One".to_string(),
                link: "https://example.com/one".to_string(),
            }],
            skipped_existing: 2,
        };

        assert_eq!(result.rows_written(), 1);
        assert_eq!(result.skipped_existing, 2);
    }

    #[test]
    fn test_commit_result_default_is_empty() {
        let result = CommitResult::default();
        assert_eq!(result.rows_written(), 0);
        assert_eq!(result.skipped_existing, 0);
        assert!(result.accepted.is_empty());
    }
}
