//! Page text normalization
//!
//! Text pulled out of a PDF content stream is full of layout noise: words
//! hyphenated across line breaks, runs of spaces used for column alignment,
//! mixed case. The name rules only ever look at the normalized form.

/// Normalize raw page text into the primary search surface.
///
/// A hyphen immediately followed by a newline becomes a single space, every
/// whitespace run collapses to one space, the result is trimmed and
/// upper-cased. Empty input yields an empty string.
pub fn normalize_text(raw: &str) -> String {
    collapse_upper(&raw.replace("-\n", " "))
}

/// Collapse whitespace and upper-case without touching hyphenation.
///
/// Used for the raw-text fallback pass of the name extractor.
pub fn collapse_upper(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
