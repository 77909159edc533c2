//! Template store boundary.
//!
//! Templates are owned by an external store; the render path only ever needs
//! `fetch`. The JSON-seeded in-memory implementation keeps single-host
//! deployments self-contained and tests hermetic.

use anyhow::Context;
use minuta::{Template, TemplateId};
use std::collections::HashMap;
use std::path::Path;

/// Read side of the external template store.
pub trait TemplateStore: Send + Sync {
    /// Fetches a template by id. `None` means the id is unknown.
    fn fetch(&self, id: TemplateId) -> Option<Template>;
}

/// In-memory store seeded from a JSON array of templates.
pub struct JsonTemplateStore {
    templates: HashMap<TemplateId, Template>,
}

impl JsonTemplateStore {
    /// Loads a store from a JSON file containing `[Template, …]`.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or is not valid template JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading template seed {}", path.display()))?;
        let templates: Vec<Template> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing template seed {}", path.display()))?;
        Ok(Self::from_templates(templates))
    }

    pub fn from_templates(templates: Vec<Template>) -> Self {
        let mut map = HashMap::with_capacity(templates.len());
        for template in templates {
            let id = template.id;
            if map.insert(id, template).is_some() {
                tracing::warn!(id, "duplicate template id in seed; keeping the last");
            }
        }
        Self { templates: map }
    }

    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateStore for JsonTemplateStore {
    fn fetch(&self, id: TemplateId) -> Option<Template> {
        // Templates are immutable once fetched; hand out an owned copy.
        self.templates.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_returns_seeded_templates() {
        let seed = r#"[
            {"id": 1, "title": "Contrato de Prestação", "description": "Contrato padrão", "body": "Olá {{nome}}"},
            {"id": 2, "title": "Recibo", "body": "Valor {{valor}}"}
        ]"#;
        let templates: Vec<Template> = serde_json::from_str(seed).expect("valid seed");
        let store = JsonTemplateStore::from_templates(templates);

        assert_eq!(store.len(), 2);
        let template = store.fetch(1).expect("known id");
        assert_eq!(template.title, "Contrato de Prestação");
        assert_eq!(template.body, "Olá {{nome}}");
        assert!(store.fetch(99).is_none());
    }

    #[test]
    fn duplicate_ids_keep_the_last_entry() {
        let seed = r#"[
            {"id": 1, "title": "Primeiro", "body": "a"},
            {"id": 1, "title": "Segundo", "body": "b"}
        ]"#;
        let templates: Vec<Template> = serde_json::from_str(seed).expect("valid seed");
        let store = JsonTemplateStore::from_templates(templates);

        assert_eq!(store.len(), 1);
        assert_eq!(store.fetch(1).expect("known id").title, "Segundo");
    }
}
