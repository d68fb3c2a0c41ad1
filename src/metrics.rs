//! The metric service (§4.6): instantiates a named, parameterized
//! formula template into a concrete FORMULA node.

use crate::error::{GraphError, Result};
use crate::graph::{Builder, GraphState};
use std::collections::HashMap;

/// A metric template: `inputs` names the placeholders the template
/// expects, and `formula_template` contains a `{placeholder}` marker for
/// each one (§6.2).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricDefinition {
    pub inputs: Vec<String>,
    pub formula_template: String,
}

/// The external collaborator that owns metric definitions (§6.2). A
/// host application typically backs this with a YAML/JSON-loaded table;
/// the core only needs lookup.
pub trait MetricRegistry {
    fn get_metric_definition(&self, name: &str) -> Option<MetricDefinition>;
}

/// An in-memory `MetricRegistry` good enough for embedding or tests
/// without pulling in a config-file format.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricRegistry {
    definitions: HashMap<String, MetricDefinition>,
}

impl InMemoryMetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, definition: MetricDefinition) {
        self.definitions.insert(name.into(), definition);
    }
}

impl MetricRegistry for InMemoryMetricRegistry {
    fn get_metric_definition(&self, name: &str) -> Option<MetricDefinition> {
        self.definitions.get(name).cloned()
    }
}

/// Instantiates metrics into graph nodes and remembers `metric_name ->
/// node_code` for later lookup (§4.6).
#[derive(Debug, Default)]
pub struct MetricService {
    instantiated: HashMap<String, String>,
}

impl MetricService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_for_metric(&self, metric_name: &str) -> Option<&str> {
        self.instantiated.get(metric_name).map(String::as_str)
    }

    /// Builds the formula by textual placeholder substitution and
    /// inserts it as a FORMULA node into a builder staged on `state`,
    /// committing a new state.
    pub fn add_metric(
        &mut self,
        registry: &dyn MetricRegistry,
        state: &GraphState,
        metric_name: &str,
        node_name: Option<&str>,
        input_node_map: Option<&HashMap<String, String>>,
    ) -> Result<GraphState> {
        let definition = registry
            .get_metric_definition(metric_name)
            .ok_or_else(|| GraphError::NotFound(format!("metric '{metric_name}'")))?;

        let node_name = node_name.unwrap_or(metric_name).to_string();

        let mut formula = definition.formula_template.clone();
        for placeholder in &definition.inputs {
            let substitute = input_node_map
                .and_then(|m| m.get(placeholder))
                .map(String::as_str)
                .unwrap_or(placeholder.as_str());
            formula = formula.replace(&format!("{{{placeholder}}}"), substitute);
        }

        let mut builder = Builder::from_state(state);
        builder.add_node(node_name.clone(), Some(&formula), None)?;
        let new_state = builder.commit()?;

        self.instantiated.insert(metric_name.to_string(), node_name);
        Ok(new_state)
    }
}
