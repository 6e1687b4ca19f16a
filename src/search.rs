/// Normalize a string for case-insensitive matching.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// Trim and normalize a query; blank queries mean "no constraint".
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(normalize(trimmed))
    }
}

/// Substring test against an already normalized needle.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    normalize(haystack).contains(needle)
}
