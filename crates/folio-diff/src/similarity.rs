//! Text similarity used to pair rewritten paragraphs.

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Normalized similarity in `[0, 1]`: `1 - distance / max_len`.
///
/// Two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Whether two texts are similar enough to be treated as one rewritten text.
///
/// Both must be at least `min_len` characters long; the ratio comparison is
/// inclusive.
pub fn is_similar(a: &str, b: &str, min_len: usize, threshold: f64) -> bool {
    a.chars().count() >= min_len
        && b.chars().count() >= min_len
        && similarity_ratio(a, b) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "ab"), 2);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn distance_counts_characters_not_bytes() {
        assert_eq!(levenshtein("héllo", "hello"), 1);
        assert_eq!(levenshtein("日本", "日本語"), 1);
    }

    #[test]
    fn ratio_bounds() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("same", "same"), 1.0);
        assert_eq!(similarity_ratio("abcd", "wxyz"), 0.0);
    }

    #[test]
    fn ratio_at_threshold_is_exact() {
        // 20 characters, 7 substitutions.
        let a = "abcdefghijklmnopqrst";
        let b = "abcdefghijklmXXXXXXX";
        assert_eq!(levenshtein(a, b), 7);
        assert_eq!(similarity_ratio(a, b), 0.65);
        assert!(is_similar(a, b, 4, 0.65));
        assert!(!is_similar(a, "abcdefghijklXXXXXXXX", 4, 0.65));
    }

    #[test]
    fn short_texts_are_never_similar() {
        assert!(similarity_ratio("abc", "abd") > 0.65);
        assert!(!is_similar("abc", "abd", 4, 0.65));
        assert!(is_similar("abc", "abd", 3, 0.65));
    }
}
