//! Query text normalization.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalizes free text for matching.
///
/// Lowercases, folds diacritics (NFD with combining marks removed), drops
/// every character outside `[a-z0-9]`, whitespace and `-`, and collapses runs
/// of whitespace to a single space. Pattern rules go through the same
/// function so both sides compare equal.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
