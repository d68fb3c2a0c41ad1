//! The ID resolver (§4.8): maps authoring-level statement item IDs to
//! graph node codes.
//!
//! For a `LineItem` the mapping is `item.id -> item.node_id` (or a
//! standard-node reference resolved through the external
//! [`StandardNodeRegistry`]); for every other item kind the mapping is
//! the identity (`item.id -> item.id`), since calculated/subtotal/metric
//! items name the node they themselves become.

use crate::error::{GraphError, Result};
use crate::statement::model::Item;
use crate::statement::registry::StandardNodeRegistry;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct IdResolver {
    item_to_code: HashMap<String, String>,
    code_to_item: HashMap<String, String>,
}

impl IdResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the mapping for one item per §4.8's rule. Calling this
    /// twice for the same `item.id` overwrites the earlier mapping.
    pub fn register_item(&mut self, item: &Item, registry: &dyn StandardNodeRegistry) -> Result<()> {
        let code = match item {
            Item::Line(line) => match (&line.node_id, &line.standard_node_ref) {
                (Some(node_id), _) => node_id.clone(),
                (None, Some(standard_ref)) => registry.get_standard_name(standard_ref),
                (None, None) => {
                    return Err(GraphError::NotFound(format!(
                        "line item '{}' has neither node_id nor standard_node_ref",
                        line.id
                    )))
                }
            },
            other => other.id().to_string(),
        };
        self.insert(item.id().to_string(), code);
        Ok(())
    }

    fn insert(&mut self, item_id: String, code: String) {
        self.code_to_item.insert(code.clone(), item_id.clone());
        self.item_to_code.insert(item_id, code);
    }

    /// Resolves `item_id` to a node code. If not yet cached and `graph`
    /// already contains `item_id` as a node, records and returns the
    /// identity mapping (the fallback path for base line items that were
    /// populated outside the statement structure, §4.8).
    pub fn resolve(&mut self, item_id: &str, graph: Option<&crate::graph::GraphState>) -> Result<String> {
        if let Some(code) = self.item_to_code.get(item_id) {
            return Ok(code.clone());
        }
        if let Some(state) = graph {
            if state.has_node(item_id) {
                self.insert(item_id.to_string(), item_id.to_string());
                return Ok(item_id.to_string());
            }
        }
        Err(GraphError::NotFound(format!("unresolved item id '{item_id}'")))
    }

    pub fn item_for_code(&self, code: &str) -> Option<&str> {
        self.code_to_item.get(code).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Builder;
    use crate::statement::model::LineItem;
    use crate::statement::registry::InMemoryStandardNodeRegistry;

    #[test]
    fn line_item_maps_to_node_id() {
        let mut resolver = IdResolver::new();
        let registry = InMemoryStandardNodeRegistry::new();
        let item = Item::Line(LineItem {
            id: "revenue_item".to_string(),
            name: "Revenue".to_string(),
            sign_convention: 1,
            node_id: Some("revenue_node".to_string()),
            standard_node_ref: None,
        });
        resolver.register_item(&item, &registry).unwrap();
        assert_eq!(resolver.resolve("revenue_item", None).unwrap(), "revenue_node");
        assert_eq!(resolver.item_for_code("revenue_node"), Some("revenue_item"));
    }

    #[test]
    fn unregistered_id_falls_back_to_graph_identity() {
        let mut resolver = IdResolver::new();
        let mut b = Builder::new();
        b.add_node("adhoc_node", None, None).unwrap();
        let state = b.commit().unwrap();

        assert_eq!(resolver.resolve("adhoc_node", Some(&state)).unwrap(), "adhoc_node");
        assert!(resolver.resolve("missing", Some(&state)).is_err());
    }

    #[test]
    fn non_line_items_resolve_to_identity() {
        use crate::statement::model::{CalculatedLineItem, CalculationType};

        let mut resolver = IdResolver::new();
        let registry = InMemoryStandardNodeRegistry::new();
        let item = Item::Calculated(CalculatedLineItem {
            id: "gross_profit".to_string(),
            name: "Gross profit".to_string(),
            sign_convention: 1,
            calculation_type: CalculationType::Subtraction,
            input_ids: vec!["revenue".to_string(), "cogs".to_string()],
            formula: None,
            parameters: HashMap::new(),
        });
        resolver.register_item(&item, &registry).unwrap();
        assert_eq!(resolver.resolve("gross_profit", None).unwrap(), "gross_profit");
    }
}
