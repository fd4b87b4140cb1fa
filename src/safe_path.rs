//! Allow-list check for identifiers that end up in file and depot paths.

use std::sync::LazyLock;

use regex::Regex;

static SAFE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_. -]+$").expect("static pattern is valid")
});

/// True when `segment` can be used as a single relative path segment: only
/// alphanumerics, underscore, period, hyphen and space, and not `.` or `..`.
pub fn is_safe_path(segment: &str) -> bool {
    SAFE_SEGMENT.is_match(segment) && segment != "." && segment != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_version_strings() {
        assert!(is_safe_path("1.20.1"));
        assert!(is_safe_path("21.1.72-beta"));
        assert!(is_safe_path("loader-1.20.1 pre 2"));
        assert!(is_safe_path(".depot-index"));
    }

    #[test]
    fn rejects_traversal_and_separators() {
        assert!(!is_safe_path("../etc/passwd"));
        assert!(!is_safe_path("a/b"));
        assert!(!is_safe_path("a\\b"));
        assert!(!is_safe_path(".."));
        assert!(!is_safe_path("."));
        assert!(!is_safe_path(""));
        assert!(!is_safe_path("1.20\n"));
    }
}
