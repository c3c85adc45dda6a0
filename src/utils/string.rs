//! String utilities
//!
//! Contains helper functions for safe string manipulation.

/// Safely truncate a string at a character boundary
///
/// Truncates a string to at most `max_chars` characters, ensuring the cut
/// lands on a valid UTF-8 character boundary. Used for display-safe key
/// prefixes.
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_ascii() {
        let text = "mt_abcdef0123456789";
        assert_eq!(truncate_str(text, 11), "mt_abcdef01");
        assert_eq!(truncate_str(text, 100), text);
    }

    #[test]
    fn test_truncate_str_unicode() {
        let text = "Hello, 世界!";
        assert_eq!(truncate_str(text, 7), "Hello, ");
        assert_eq!(truncate_str(text, 8), "Hello, 世");
    }

    #[test]
    fn test_truncate_empty() {
        assert_eq!(truncate_str("", 10), "");
    }
}
