//! Copy-on-write mutation over a base [`GraphState`], committed into a
//! new immutable state by [`Builder::commit`] (§4.2).

use crate::error::{GraphError, Result};
use crate::expr;
use crate::period::{Period, PeriodIndex};

use super::node::{Node, NodeKind};
use super::state::GraphState;
use super::topology;

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Builder {
    nodes: HashMap<String, Node>,
    periods: PeriodIndex,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages mutations on top of an existing committed state.
    pub fn from_state(state: &GraphState) -> Self {
        Builder {
            nodes: state.nodes.clone(),
            periods: state.periods.clone(),
        }
    }

    /// Adds a node. `code` must be new. The node is a FORMULA node iff
    /// `formula` is `Some`, else an INPUT node seeded with `values`.
    ///
    /// The formula's referenced identifiers are computed by parsing it
    /// into an AST and walking it (§3); parse failure is
    /// `InvalidFormula`.
    pub fn add_node(
        &mut self,
        code: impl Into<String>,
        formula: Option<&str>,
        values: Option<HashMap<String, f64>>,
    ) -> Result<()> {
        let code = code.into();
        if self.nodes.contains_key(&code) {
            return Err(GraphError::AlreadyExists(code));
        }

        let node = match formula {
            Some(text) => {
                let ast = expr::parse(text).map_err(|_| GraphError::InvalidFormula {
                    code: code.clone(),
                    message: format!("could not parse formula '{text}'"),
                })?;
                let inputs = ast.referenced_names();
                Node::new_formula(code.clone(), text, inputs, NodeKind::Formula)
            }
            None => Node::new_input(code.clone(), values.unwrap_or_default()),
        };

        self.nodes.insert(code, node);
        Ok(())
    }

    /// Like [`Builder::add_node`] but tags the result as an `AGGREGATE`
    /// node (used by subtotal population, §4.9) instead of `FORMULA`.
    pub fn add_aggregate_node(&mut self, code: impl Into<String>, formula: &str) -> Result<()> {
        let code = code.into();
        if self.nodes.contains_key(&code) {
            return Err(GraphError::AlreadyExists(code));
        }
        let ast = expr::parse(formula).map_err(|_| GraphError::InvalidFormula {
            code: code.clone(),
            message: format!("could not parse formula '{formula}'"),
        })?;
        let inputs = ast.referenced_names();
        self.nodes.insert(
            code.clone(),
            Node::new_formula(code, formula, inputs, NodeKind::Aggregate),
        );
        Ok(())
    }

    pub fn has_node(&self, code: &str) -> bool {
        self.nodes.contains_key(code)
    }

    pub fn remove_node(&mut self, code: &str) -> Result<()> {
        if self.nodes.remove(code).is_none() {
            return Err(GraphError::NotFound(code.to_string()));
        }
        Ok(())
    }

    /// Requires an INPUT node. With `replace == false` and an existing
    /// value for `period`, fails `DuplicateValue`.
    pub fn set_node_value(&mut self, code: &str, period: &str, value: f64, replace: bool) -> Result<()> {
        let node = self
            .nodes
            .get(code)
            .ok_or_else(|| GraphError::NotFound(code.to_string()))?;
        if !node.is_input() {
            return Err(GraphError::TypeMismatch {
                code: code.to_string(),
            });
        }
        Period::parse(period)?;
        if !replace && node.data.contains_key(period) {
            return Err(GraphError::DuplicateValue {
                code: code.to_string(),
                period: period.to_string(),
            });
        }

        // Copy-on-write: build the replacement node rather than mutating
        // the stored one in place.
        let mut new_node = node.clone();
        new_node.data.insert(period.to_string(), value);
        self.nodes.insert(code.to_string(), new_node);
        Ok(())
    }

    /// Atomic remove + add preserving `code`. Fails if `code` is missing.
    pub fn replace_node(
        &mut self,
        code: &str,
        formula: Option<&str>,
        values: Option<HashMap<String, f64>>,
    ) -> Result<()> {
        if !self.nodes.contains_key(code) {
            return Err(GraphError::NotFound(code.to_string()));
        }
        self.nodes.remove(code);
        self.add_node(code.to_string(), formula, values)
    }

    /// Adds periods (accepting already-parsed [`Period`]s or raw strings)
    /// through the `PeriodIndex`.
    pub fn add_periods<I, P>(&mut self, periods: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: TryIntoPeriod,
    {
        for p in periods {
            self.periods.add(p.try_into_period()?);
        }
        Ok(())
    }

    pub fn add_period(&mut self, period: impl TryIntoPeriod) -> Result<()> {
        self.periods.add(period.try_into_period()?);
        Ok(())
    }

    /// Runs Kahn's topological sort over the staged nodes. `Cycle(path)`
    /// on detection (§4.3).
    pub fn commit(self) -> Result<GraphState> {
        let order = topology::toposort(&self.nodes)?;
        Ok(GraphState {
            nodes: self.nodes,
            periods: self.periods,
            order,
        })
    }

    /// Commits without sorting, preserving insertion order. This exists
    /// solely for advanced interop (merging graphs that are individually
    /// acyclic but whose union cannot yet be ordered without a
    /// downstream sort) and must never be exposed outside the crate
    /// (§4.2 "Cycle-tolerance escape hatch").
    pub(crate) fn commit_unsorted(self) -> GraphState {
        let order: Vec<String> = self.nodes.keys().cloned().collect();
        GraphState {
            nodes: self.nodes,
            periods: self.periods,
            order,
        }
    }
}

/// Accepts either an already-parsed [`Period`] or a raw period string.
pub trait TryIntoPeriod {
    fn try_into_period(self) -> Result<Period>;
}

impl TryIntoPeriod for Period {
    fn try_into_period(self) -> Result<Period> {
        Ok(self)
    }
}

impl TryIntoPeriod for &str {
    fn try_into_period(self) -> Result<Period> {
        Period::parse(self)
    }
}

impl TryIntoPeriod for String {
    fn try_into_period(self) -> Result<Period> {
        Period::parse(&self)
    }
}
