//! Centralized name parsing for the `NN-name` convention.
//!
//! Materials, collections and docs are ordered on disk with an optional
//! numeric prefix followed by `-` or `.` (`01-buttons/`, `02.card.html`).
//! The prefix only orders; it never shows up in keys or titles.
//!
//! - **key**: the name after the prefix, verbatim (`primary-button`). Keys
//!   are the partial names templates use: `{{> primary-button}}`.
//! - **title**: the key with `-`/`_` turned into spaces and each word
//!   capitalized (`Primary Button`).

/// Result of parsing an ordered entry name like `020-primary-button`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Number prefix if present (e.g., `20` from `020-primary-button`)
    pub number: Option<u32>,
    /// Name after the prefix. For unnumbered entries, the full input.
    pub key: String,
    pub title: String,
}

/// Parse an entry name (a file stem or directory name).
///
/// - `"020-primary-button"` → number=Some(20), key="primary-button", title="Primary Button"
/// - `"01.card"` → number=Some(1), key="card", title="Card"
/// - `"forms"` → number=None, key="forms", title="Forms"
/// - `"2024"` → number=None, key="2024" (a bare number is a name, not a prefix)
pub fn parse_entry_name(name: &str) -> ParsedName {
    if let Some(pos) = name.find(['-', '.'])
        && pos > 0
        && let Ok(num) = name[..pos].parse::<u32>()
        && pos + 1 < name.len()
    {
        let key = &name[pos + 1..];
        return ParsedName {
            number: Some(num),
            key: key.to_string(),
            title: title_case(key),
        };
    }
    ParsedName {
        number: None,
        key: name.to_string(),
        title: title_case(name),
    }
}

/// `primary-button` → `Primary Button`.
pub fn title_case(key: &str) -> String {
    key.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// URL-safe slug: lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Sort key: numbered entries first by number, then everything by key.
pub fn order_key(parsed: &ParsedName) -> (u32, String) {
    (parsed.number.unwrap_or(u32::MAX), parsed.key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_with_dash() {
        let p = parse_entry_name("020-primary-button");
        assert_eq!(p.number, Some(20));
        assert_eq!(p.key, "primary-button");
        assert_eq!(p.title, "Primary Button");
    }

    #[test]
    fn numbered_with_dot() {
        let p = parse_entry_name("01.card");
        assert_eq!(p.number, Some(1));
        assert_eq!(p.key, "card");
        assert_eq!(p.title, "Card");
    }

    #[test]
    fn unnumbered() {
        let p = parse_entry_name("form_fields");
        assert_eq!(p.number, None);
        assert_eq!(p.key, "form_fields");
        assert_eq!(p.title, "Form Fields");
    }

    #[test]
    fn bare_number_is_a_name() {
        let p = parse_entry_name("2024");
        assert_eq!(p.number, None);
        assert_eq!(p.key, "2024");
    }

    #[test]
    fn trailing_separator_is_a_name() {
        let p = parse_entry_name("001-");
        assert_eq!(p.number, None);
        assert_eq!(p.key, "001-");
    }

    #[test]
    fn non_numeric_prefix_kept() {
        let p = parse_entry_name("wip-drafts");
        assert_eq!(p.number, None);
        assert_eq!(p.key, "wip-drafts");
        assert_eq!(p.title, "Wip Drafts");
    }

    #[test]
    fn numbered_sort_before_unnumbered() {
        let mut names = vec!["zeta", "10-b", "02-c", "alpha"];
        names.sort_by_key(|n| order_key(&parse_entry_name(n)));
        assert_eq!(names, vec!["02-c", "10-b", "alpha", "zeta"]);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Café au lait "), "caf-au-lait");
        assert_eq!(slugify(""), "");
    }
}
