//! The immutable graph snapshot (§3). A `GraphState` is only ever
//! produced by [`crate::graph::builder::Builder::commit`]; once built it
//! is safe to share and read from multiple threads without
//! synchronization (§5).

use crate::period::PeriodIndex;
use std::collections::HashMap;

use super::node::Node;

#[derive(Debug, Clone, Default)]
pub struct GraphState {
    pub(crate) nodes: HashMap<String, Node>,
    pub(crate) periods: PeriodIndex,
    pub(crate) order: Vec<String>,
}

impl GraphState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get_node(&self, code: &str) -> Option<&Node> {
        self.nodes.get(code)
    }

    pub fn has_node(&self, code: &str) -> bool {
        self.nodes.contains_key(code)
    }

    pub fn nodes(&self) -> &HashMap<String, Node> {
        &self.nodes
    }

    pub fn periods(&self) -> &PeriodIndex {
        &self.periods
    }

    /// The committed topological order: dependencies before dependents.
    pub fn order(&self) -> &[String] {
        &self.order
    }
}
