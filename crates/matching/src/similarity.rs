//! String similarity metrics
//!
//! All functions expect text that already went through
//! [`ScriptNormalizer`](crate::script::ScriptNormalizer).

use strsim::{jaro, levenshtein};

/// Jaro-Winkler similarity at or above which two fuzzy values agree
pub const JARO_WINKLER_AGREEMENT: f64 = 0.7;

/// Maximum shared prefix rewarded by the Winkler bonus
const WINKLER_PREFIX_LIMIT: usize = 4;

/// Winkler prefix scaling factor
const WINKLER_SCALING: f64 = 0.1;

/// Prefix length checked by the non-fuzzy fallback
const FALLBACK_PREFIX_LEN: usize = 3;

/// Score given by the non-fuzzy fallback on a shared prefix
const FALLBACK_PREFIX_SCORE: u8 = 50;

/// Convert a 0.0 - 1.0 similarity to an integer percentage
pub(crate) fn to_percent(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Normalized edit similarity (0 - 100).
///
/// `round(100 * (1 - distance / max(len1, len2)))`, lengths in characters.
pub fn edit_similarity(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let distance = levenshtein(a, b);
    to_percent(1.0 - distance as f64 / max_len as f64)
}

/// Similarity used when fuzzy matching is disabled (0 - 100).
///
/// - Equal strings score 100
/// - Containment scores `100 * minLen / maxLen`
/// - A shared 3-character prefix scores 50
pub fn fallback_similarity(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }

    if a.contains(b) || b.contains(a) {
        let len_a = a.chars().count();
        let len_b = b.chars().count();
        return to_percent(len_a.min(len_b) as f64 / len_a.max(len_b) as f64);
    }

    let prefix_a: Vec<char> = a.chars().take(FALLBACK_PREFIX_LEN).collect();
    let prefix_b: Vec<char> = b.chars().take(FALLBACK_PREFIX_LEN).collect();
    if prefix_a.len() == FALLBACK_PREFIX_LEN && prefix_a == prefix_b {
        return FALLBACK_PREFIX_SCORE;
    }

    0
}

/// Text similarity (0 - 100) for the deterministic scorer
pub fn text_similarity(a: &str, b: &str, fuzzy_matching: bool) -> u8 {
    if fuzzy_matching {
        edit_similarity(a, b)
    } else {
        fallback_similarity(a, b)
    }
}

/// Jaro-Winkler similarity (0.0 - 1.0).
///
/// The Winkler bonus is applied to every pair, not only those whose Jaro
/// similarity clears 0.7.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    let jaro_similarity = jaro(a, b);
    let prefix = a
        .chars()
        .zip(b.chars())
        .take(WINKLER_PREFIX_LIMIT)
        .take_while(|(x, y)| x == y)
        .count();

    (jaro_similarity + prefix as f64 * WINKLER_SCALING * (1.0 - jaro_similarity)).min(1.0)
}

/// Whether two fuzzy values agree for the probabilistic scorer
pub fn fuzzy_agrees(a: &str, b: &str, threshold: f64) -> bool {
    jaro_winkler(a, b) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_similarity() {
        assert_eq!(edit_similarity("smith", "smith"), 100);
        assert_eq!(edit_similarity("john", "jon"), 75);
        assert_eq!(edit_similarity("kitten", "sitting"), 57);
        assert_eq!(edit_similarity("abc", "xyz"), 0);
    }

    #[test]
    fn test_edit_similarity_empty() {
        assert_eq!(edit_similarity("", "smith"), 0);
        assert_eq!(edit_similarity("smith", ""), 0);
        assert_eq!(edit_similarity("", ""), 0);
    }

    #[test]
    fn test_edit_similarity_counts_characters() {
        // Multi-byte glyphs count once
        assert_eq!(edit_similarity("አበበ", "አበባ"), 67);
    }

    #[test]
    fn test_fallback_similarity() {
        assert_eq!(fallback_similarity("anna", "anna"), 100);
        assert_eq!(fallback_similarity("ann", "anna"), 75);
        assert_eq!(fallback_similarity("johnson", "johanna"), 50);
        assert_eq!(fallback_similarity("john", "jon"), 0);
        assert_eq!(fallback_similarity("jo", "ja"), 0);
    }

    #[test]
    fn test_text_similarity_switches_metric() {
        assert_eq!(text_similarity("john", "jon", true), 75);
        assert_eq!(text_similarity("john", "jon", false), 0);
    }

    #[test]
    fn test_jaro_winkler_reference_values() {
        assert!((jaro_winkler("martha", "marhta") - 0.9611).abs() < 0.001);
        assert!((jaro_winkler("dwayne", "duane") - 0.84).abs() < 0.001);
        assert_eq!(jaro_winkler("smith", "smith"), 1.0);
        assert_eq!(jaro_winkler("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_jaro_winkler_is_symmetric() {
        for (a, b) in [("john", "jon"), ("martha", "marhta"), ("abebe", "abeba")] {
            assert_eq!(jaro_winkler(a, b), jaro_winkler(b, a));
        }
    }

    #[test]
    fn test_fuzzy_agreement() {
        assert!(fuzzy_agrees("john", "jon", JARO_WINKLER_AGREEMENT));
        assert!(!fuzzy_agrees("john", "mary", JARO_WINKLER_AGREEMENT));
    }
}
