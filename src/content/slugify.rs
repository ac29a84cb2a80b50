//! Slug derivation and validation.

use regex::Regex;

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Derive a URL-safe slug from a title: lowercased, diacritics stripped,
/// non-alphanumeric runs collapsed to single hyphens, ends trimmed.
pub fn slugify(title: &str) -> String {
    slug::slugify(title)
}

pub fn is_valid_slug(candidate: &str) -> bool {
    SLUG_REGEX.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn test_slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("Rust -- and, also: Postgres!"), "rust-and-also-postgres");
    }

    #[test]
    fn test_slugify_strips_diacritics() {
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
    }

    #[test]
    fn test_slugify_trims_edge_hyphens() {
        assert_eq!(slugify("  ...leading and trailing...  "), "leading-and-trailing");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("a-valid-slug-42"));
        assert!(!is_valid_slug("Not A Slug"));
        assert!(!is_valid_slug("-leading-hyphen"));
        assert!(!is_valid_slug(""));
    }
}
