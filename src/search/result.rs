//! Ranked search results.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Index-assigned id, stable within one generation.
    pub internal_id: u32,

    /// Caller-assigned document identifier.
    pub external_id: String,

    pub score: f64,

    /// Truncated preview of the document text; empty when not stored.
    pub snippet: String,
}

/// Truncate `text` to `max_graphemes` grapheme clusters, appending `...`
/// when anything was cut.
pub fn make_snippet(text: &str, max_graphemes: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max_graphemes) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
