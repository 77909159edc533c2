//! Placeholder extraction.
//!
//! A placeholder is a named slot delimited by `{{` and `}}`. The name is the
//! literal text between the markers, taken verbatim: no trimming and no
//! nested markers. Extraction is total — malformed input (an unterminated
//! open marker, stray braces) simply contributes no names.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

// A name is one or more non-brace characters, so a matched name can never be
// empty and can never contain a delimiter character.
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("marker pattern is valid"));

/// Returns the unique placeholder names in `template`, in first-seen order.
///
/// First-seen order is significant: it drives the field order of generated
/// input forms. Duplicate occurrences of the same name collapse to a single
/// entry.
///
/// ```
/// assert_eq!(minuta::extract("{{a}} {{b}} {{a}}"), ["a", "b"]);
/// assert!(minuta::extract("no placeholders here").is_empty());
/// ```
pub fn extract(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for caps in MARKER.captures_iter(template) {
        let name = &caps[1];
        if !seen.contains(name) {
            seen.insert(name.to_owned());
            names.push(name.to_owned());
        }
    }
    names
}

/// The marker-wrapped form of a placeholder name, `{{name}}`.
pub(crate) fn marker_form(name: &str) -> String {
    format!("{{{{{name}}}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_first_seen_order_and_collapses_duplicates() {
        assert_eq!(extract("{{a}} {{b}} {{a}}"), ["a", "b"]);
        assert_eq!(
            extract("{{nome}} nasceu em {{cidade}}, reside em {{cidade}}"),
            ["nome", "cidade"]
        );
    }

    #[test]
    fn empty_and_placeholderless_bodies_yield_nothing() {
        assert!(extract("").is_empty());
        assert!(extract("plain text, no markers").is_empty());
    }

    #[test]
    fn names_are_taken_verbatim() {
        // No trimming: surrounding whitespace is part of the name.
        assert_eq!(extract("{{ nome }}"), [" nome "]);
        assert_eq!(extract("{{valor.total}}"), ["valor.total"]);
    }

    #[test]
    fn malformed_markers_are_ignored() {
        assert!(extract("{{unterminated").is_empty());
        assert!(extract("{{}}").is_empty());
        assert!(extract("}} backwards {{").is_empty());
        // The inner well-formed marker still matches.
        assert_eq!(extract("{{a{{b}}"), ["b"]);
    }

    #[test]
    fn extracted_names_satisfy_the_name_invariant() {
        for name in extract("{{a}} {{b c}} {{unterminated {{d}}") {
            assert!(!name.is_empty());
            assert!(!name.contains('{') && !name.contains('}'));
        }
    }

    #[test]
    fn marker_form_round_trips_through_extract() {
        assert_eq!(extract(&marker_form("nome")), ["nome"]);
    }
}
