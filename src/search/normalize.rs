//! Search text normalization

/// Normalizes raw search input.
///
/// Characters outside letters, digits, whitespace, hyphen, and apostrophe
/// are removed, runs of whitespace collapse to one space, and the result
/// is trimmed. An empty result means "no search".
pub fn normalize_query(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '\''))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased whitespace-separated terms of a normalized query
pub fn query_terms(normalized: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in normalized.split_whitespace() {
        let term = term.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_and_collapses() {
        assert_eq!(normalize_query("  rust!!   guide "), "rust guide");
        assert_eq!(normalize_query("O'Reilly e-book"), "O'Reilly e-book");
        assert_eq!(normalize_query("a;DROP TABLE--"), "aDROP TABLE--");
        assert_eq!(normalize_query("café\tcrème"), "café crème");
    }

    #[test]
    fn test_empty_after_normalization() {
        assert_eq!(normalize_query("!!! ??? "), "");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn test_query_terms_dedupe_lowercase() {
        assert_eq!(query_terms("Rust rust Guide"), vec!["rust", "guide"]);
        assert!(query_terms("").is_empty());
    }
}
