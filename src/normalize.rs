//! Candidate cleaning: canonical links and "time ago" suffix stripping.
//!
//! The source page renders each story card with its headline followed by a
//! relative-time annotation, so the extracted text arrives looking like
//! `"New AI model launches14 hours ago"`. Two literal formats appear in the
//! wild, each handled by its own rule:
//!
//! 1. A timestamp-prefixed suffix: `"9:05 • 2 days ago"`. The bullet
//!    separator sometimes reaches us with encoding artifacts, so the rule
//!    matches a short run of non-digit characters rather than the exact
//!    glyph.
//! 2. A bare suffix: `"14 hours ago"`.
//!
//! The stamped rule runs first: letting the bare rule go first on a stamped
//! suffix would cut only the `"2 days ago"` tail and leave a dangling
//! `"9:05 •"` behind. Each rule cuts at most once.
//!
//! Links are resolved against the fixed source origin with [`Url::join`],
//! which leaves already-absolute links untouched.

use crate::models::{CandidateItem, Item};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

/// Timestamp-prefixed relative-time suffix, e.g. `"9:05 • 2 days ago"`.
/// The separator between the clock time and the count is matched
/// tolerantly (`\D{1,6}`) to survive mojibake renderings of the bullet.
static STAMPED_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,2}:\d{2}\D{1,6}\d{1,2} (?:hour|hours|day|days) ago").unwrap()
});

/// Bare relative-time suffix, e.g. `"14 hours ago"`.
static BARE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2} (?:hour|hours|day|days) ago").unwrap());

/// Clean one extracted candidate into an [`Item`], or drop it.
///
/// # Arguments
///
/// * `candidate` - Raw text/link pair from the extractor
/// * `origin` - Fixed source origin used to absolutize relative links
///
/// # Returns
///
/// `Some(Item)` with a trimmed headline and canonical absolute link, or
/// `None` when the candidate must be dropped: empty raw link, empty raw
/// text, text that is nothing but a time annotation, or a link that cannot
/// be resolved against the origin. Dropped candidates never reach dedup or
/// the store.
pub fn normalize(candidate: CandidateItem, origin: &Url) -> Option<Item> {
    if candidate.raw_link.is_empty() || candidate.raw_text.trim().is_empty() {
        return None;
    }

    let link = match origin.join(&candidate.raw_link) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            debug!(raw_link = %candidate.raw_link, error = %e, "Unresolvable link; dropping candidate");
            return None;
        }
    };

    let headline = strip_time_ago(&candidate.raw_text);
    if headline.is_empty() {
        debug!(raw_text = %candidate.raw_text, "Empty headline after cleaning; dropping candidate");
        return None;
    }

    Some(Item { headline, link })
}

/// Strip a trailing relative-time annotation from display text.
///
/// Applies the stamped rule, then the bare rule, each cutting the text at
/// its first match at most once, and trims surrounding whitespace.
pub fn strip_time_ago(text: &str) -> String {
    let cut = match STAMPED_SUFFIX.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };
    let cut = match BARE_SUFFIX.find(cut) {
        Some(m) => &cut[..m.start()],
        None => cut,
    };
    cut.trim().to_string()
}
