//! The standard node registry (§6.3): the external collaborator that
//! knows the canonical vocabulary of statement-item names. Loading it
//! from YAML is out of scope (§1) — this module only states the
//! contract the ID resolver and item loader consume.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConventionTag {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StandardNodeDefinition {
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub description: String,
    #[serde(default)]
    pub alternate_names: Vec<String>,
    pub sign_convention: SignConventionTag,
}

pub trait StandardNodeRegistry {
    fn get_standard_name(&self, name: &str) -> String;
    fn is_standard_name(&self, name: &str) -> bool;
    fn is_alternate_name(&self, name: &str) -> bool;
    fn is_recognized_name(&self, name: &str) -> bool {
        self.is_standard_name(name) || self.is_alternate_name(name)
    }
    fn get_definition(&self, name: &str) -> Option<StandardNodeDefinition>;
}

/// An in-memory `StandardNodeRegistry`, sufficient for embedding or
/// tests without a YAML loader.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStandardNodeRegistry {
    definitions: HashMap<String, StandardNodeDefinition>,
    alternate_to_standard: HashMap<String, String>,
}

impl InMemoryStandardNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, standard_name: impl Into<String>, definition: StandardNodeDefinition) {
        let standard_name = standard_name.into();
        for alt in &definition.alternate_names {
            self.alternate_to_standard.insert(alt.clone(), standard_name.clone());
        }
        self.definitions.insert(standard_name, definition);
    }
}

impl StandardNodeRegistry for InMemoryStandardNodeRegistry {
    fn get_standard_name(&self, name: &str) -> String {
        if self.definitions.contains_key(name) {
            return name.to_string();
        }
        self.alternate_to_standard
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn is_standard_name(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn is_alternate_name(&self, name: &str) -> bool {
        self.alternate_to_standard.contains_key(name)
    }

    fn get_definition(&self, name: &str) -> Option<StandardNodeDefinition> {
        let standard_name = self.get_standard_name(name);
        self.definitions.get(&standard_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_alternate_to_standard() {
        let mut registry = InMemoryStandardNodeRegistry::new();
        registry.register(
            "revenue",
            StandardNodeDefinition {
                category: "income_statement".to_string(),
                subcategory: None,
                description: "Total revenue".to_string(),
                alternate_names: vec!["sales".to_string(), "net_sales".to_string()],
                sign_convention: SignConventionTag::Positive,
            },
        );

        assert_eq!(registry.get_standard_name("sales"), "revenue");
        assert!(registry.is_alternate_name("sales"));
        assert!(registry.is_standard_name("revenue"));
        assert!(!registry.is_standard_name("sales"));
        assert!(registry.is_recognized_name("net_sales"));
        assert!(!registry.is_recognized_name("unknown_field"));
        assert_eq!(registry.get_standard_name("unknown_field"), "unknown_field");
    }
}
