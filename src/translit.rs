//! Transliteration helpers used for name ordering and matching.
//!
//! Names are compared through an ASCII rendering so that "Émile" sorts next
//! to "Emile" and Cyrillic or Greek names land in a predictable place instead
//! of after every Latin name.

use deunicode::deunicode;

/// Transliterate a string to ASCII/Latin.
/// Uses deunicode for broad script coverage.
pub fn transliterate(s: &str) -> String {
    let result = if s.is_ascii() {
        s.to_string()
    } else {
        deunicode(s)
    };
    // Clean up: collapse multiple spaces, trim
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key for locale-aware ordering: transliterated and case-folded.
pub fn collation_key(s: &str) -> String {
    transliterate(s).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliterate() {
        assert_eq!(transliterate("Иван"), "Ivan");
        assert_eq!(transliterate("  Jane   Doe "), "Jane Doe");
        assert_eq!(transliterate("Zoë"), "Zoe");
    }

    #[test]
    fn test_collation_key() {
        assert_eq!(collation_key("ÉMILE Zola"), "emile zola");
        assert_eq!(collation_key("acme"), collation_key("ACME"));
    }
}
