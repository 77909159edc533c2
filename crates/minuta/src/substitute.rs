//! Placeholder substitution.

use crate::placeholder::marker_form;
use crate::template::ValueMap;

/// Merges `values` into `template`, producing a fully resolved document body.
///
/// For each name in `values`, every literal occurrence of its marker-wrapped
/// form (`{{name}}`) is replaced with the corresponding value as plain text.
/// Values are inserted verbatim; markup-significant characters are not
/// escaped.
///
/// Placeholders present in the template but absent from `values` are left
/// untouched, markers included. Keys in `values` the template never
/// references are ignored.
///
/// Pure and deterministic: identical `(template, values)` inputs always
/// produce byte-identical output, with no side effects and no I/O.
pub fn substitute(template: &str, values: &ValueMap) -> String {
    let mut resolved = template.to_owned();
    for (name, value) in values {
        let marker = marker_form(name);
        // Skip the realloc for keys the template never mentions.
        if resolved.contains(&marker) {
            resolved = resolved.replace(&marker, value);
        }
    }
    resolved
}
