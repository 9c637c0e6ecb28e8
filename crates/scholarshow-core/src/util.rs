//! Shared utility functions used across multiple modules.

use std::sync::OnceLock;

use regex::Regex;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// An empty result falls back to `file` so storage paths never end in `/`.
pub fn sanitize_file_name(file_name: &str) -> String {
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();
    let pattern =
        DISALLOWED.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("Invalid regex"));

    let sanitized = pattern.replace_all(file_name.trim(), "_").into_owned();
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn sanitize_file_name_replaces_disallowed_characters() {
        assert_eq!(sanitize_file_name("My Photo (1).png"), "My_Photo__1_.png");
        assert_eq!(sanitize_file_name("lecture-notes_v2.pdf"), "lecture-notes_v2.pdf");
        assert_eq!(sanitize_file_name("résumé.txt"), "r_sum_.txt");
        assert_eq!(sanitize_file_name("../etc/passwd"), ".._etc_passwd");
    }

    #[test]
    fn sanitize_file_name_never_returns_empty() {
        assert_eq!(sanitize_file_name("   "), "file");
    }
}
