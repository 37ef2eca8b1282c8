//! Internal helpers for input normalization.
//!
//! These utilities are **not** part of the public API except [`slugify`].
//! They centralize trimming and key derivation so every repository enforces
//! the same rules.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{RepositoryError, ResultRepo};

/// Derives a URL-safe slug from a display name.
///
/// Accents are stripped, letters lowercased and every run of other characters
/// collapses to a single `-`: `"Cafés & Restaurants"` becomes
/// `"cafes-restaurants"`. Returns `None` when nothing alphanumeric remains.
pub fn slugify(input: &str) -> Option<String> {
    let mut out = String::new();
    let mut pending_dash = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Slug format accepted on write: lowercase alphanumerics separated by single dashes.
pub(crate) fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || (c.is_alphanumeric() && !c.is_uppercase()))
}

pub(crate) fn normalize_required(value: &str, label: &str) -> ResultRepo<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepositoryError::Validation(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Builds a `%needle%` pattern for `LIKE`, escaping wildcards with `\`.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.trim().to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_accents_and_collapses_separators() {
        assert_eq!(slugify("Cafés & Restaurants").as_deref(), Some("cafes-restaurants"));
        assert_eq!(slugify("  Gas / Fuel  ").as_deref(), Some("gas-fuel"));
        assert_eq!(slugify("Rent 2024").as_deref(), Some("rent-2024"));
        assert_eq!(slugify("--!!--"), None);
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("groceries"));
        assert!(is_valid_slug("dining-out-2"));
        assert!(!is_valid_slug("Dining"));
        assert!(!is_valid_slug("-dining"));
        assert!(!is_valid_slug("dining--out"));
        assert!(!is_valid_slug("dining out"));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Coffee"), "%coffee%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn required_and_optional_text() {
        assert_eq!(normalize_required("  Rent ", "name").unwrap(), "Rent");
        assert!(normalize_required("   ", "name").is_err());
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" note ".to_string())).as_deref(),
            Some("note")
        );
    }
}
