//! Data model shared between the template engine and the service boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identity of a stored template.
pub type TemplateId = u64;

/// Caller-supplied mapping from placeholder name to replacement value.
///
/// Keys need not cover every placeholder in a template, and keys the template
/// never references are ignored. A `BTreeMap` keeps iteration order fixed, so
/// [`substitute`](crate::substitute) output is identical across runs even
/// when one value happens to contain another key's marker-wrapped form.
pub type ValueMap = BTreeMap<String, String>;

/// A stored document template.
///
/// Immutable once fetched for a given render; owned by the external template
/// store. The `body` is raw text or markup containing zero or more `{{name}}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub body: String,
    /// Optional reference to an on-disk asset bundled with the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_path: Option<PathBuf>,
}
