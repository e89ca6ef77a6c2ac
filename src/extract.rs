//! Candidate extraction from the fetched source document.
//!
//! The source page marks each story card with a known CSS class (for the
//! CNET AI Atlas feed: `a.c-storiesNeonHighlightsCard_link`), so extraction
//! is a single selector walk. The selector rule comes from configuration;
//! see [`crate::config`].

use crate::models::CandidateItem;
use scraper::{Html, Selector};
use tracing::debug;

/// Extract all candidate stories from a raw HTML document.
///
/// Selects every element matching `rule` in document order (top-to-bottom
/// as rendered) and reads its text content and `href` attribute. Order is
/// preserved downstream: it drives notification-read ordering and breaks
/// ties when several candidates normalize to the same link.
///
/// # Arguments
///
/// * `html` - The raw document body
/// * `rule` - CSS selector matching story link elements
///
/// # Returns
///
/// Candidates in document order. Zero matching elements yield an empty
/// vector, never an error. Elements without an `href` produce a candidate
/// with an empty link, which the normalizer rejects.
pub fn extract(html: &str, rule: &Selector) -> Vec<CandidateItem> {
    let document = Html::parse_document(html);

    let candidates: Vec<CandidateItem> = document
        .select(rule)
        .map(|element| {
            let raw_text = element.text().collect::<String>();
            let raw_link = element.value().attr("href").unwrap_or_default().to_string();
            CandidateItem { raw_text, raw_link }
        })
        .collect();

    debug!(count = candidates.len(), "Extracted candidate stories");
    candidates
}
