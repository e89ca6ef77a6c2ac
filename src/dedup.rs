//! The dedup oracle: new items only, in source order.

use crate::models::Item;
use itertools::Itertools;
use std::collections::HashSet;

/// Filter a normalized batch down to the genuinely new items.
///
/// One lazy traversal: items whose link is already in `seen` are dropped,
/// and within the batch itself only the first occurrence of each link
/// survives. Batch-internal duplicates are treated exactly like
/// already-seen links: checking against the stored set alone would let
/// two same-link candidates from one document both through.
///
/// Input order is preserved.
pub fn filter_new(items: Vec<Item>, seen: &HashSet<String>) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| !seen.contains(&item.link))
        .unique_by(|item| item.link.clone())
        .collect()
}
