//! The orchestration shell (§4.7): holds the current [`GraphState`], the
//! [`CalculationEngine`], and the adjustment/metric services, and wires
//! every structural mutation through a [`Builder`] that commits a new
//! state and invalidates the engine's caches.
//!
//! This is the single `Graph` contract this crate exposes — the teacher
//! lineage's multiple divergent `Graph` implementations (plain
//! `formula`-only `add_calculation` vs. an `operation_type`-driven
//! variant) are collapsed into one: `add_calculation` takes a formula
//! string only, and callers that need `operation_type` semantics (the
//! statement populator, §4.9) translate to a formula string first.

use crate::adjustments::{AdjustmentBuilder, AdjustmentSelector, AdjustmentService, AdjustmentType};
use crate::engine::{CalculationEngine, TraceMap};
use crate::error::{GraphError, Result};
use crate::graph::builder::TryIntoPeriod;
use crate::graph::{Builder, GraphState, Node};
use crate::metrics::{InMemoryMetricRegistry, MetricDefinition, MetricService};
use std::collections::HashMap;
use uuid::Uuid;

/// Adapter for the legacy "bag of fields" node-construction call (§9
/// "Duck-typed node interop"): anything that can name itself, optionally
/// supply a formula, and optionally supply input values can be added via
/// [`Graph::add_node`].
pub trait NodeSource {
    fn code(&self) -> String;
    fn formula(&self) -> Option<String>;
    fn values(&self) -> Option<HashMap<String, f64>>;
}

pub struct Graph {
    state: GraphState,
    engine: CalculationEngine,
    adjustments: AdjustmentService,
    metrics: MetricService,
    metric_registry: InMemoryMetricRegistry,
}

impl Graph {
    pub fn new(strict_adjustments: bool) -> Self {
        Graph {
            state: GraphState::empty(),
            engine: CalculationEngine::new(),
            adjustments: AdjustmentService::new(strict_adjustments),
            metrics: MetricService::new(),
            metric_registry: InMemoryMetricRegistry::new(),
        }
    }

    pub fn register_metric(&mut self, name: impl Into<String>, definition: MetricDefinition) {
        self.metric_registry.register(name, definition);
    }

    pub fn metric_definition(&self, name: &str) -> Option<MetricDefinition> {
        use crate::metrics::MetricRegistry;
        self.metric_registry.get_metric_definition(name)
    }

    // --- Structural mutation -------------------------------------------

    fn commit(&mut self, builder: Builder) -> Result<()> {
        self.state = builder.commit()?;
        self.engine.clear_all();
        log::trace!("graph committed: {} nodes", self.state.nodes().len());
        Ok(())
    }

    /// Adds any item: a FORMULA node iff `formula` is `Some`, else an
    /// INPUT node seeded with `values`.
    pub fn add_item(&mut self, code: impl Into<String>, formula: Option<&str>, values: Option<HashMap<String, f64>>) -> Result<()> {
        let mut b = Builder::from_state(&self.state);
        b.add_node(code, formula, values)?;
        self.commit(b)
    }

    pub fn add_financial_statement_item(&mut self, code: impl Into<String>, values: HashMap<String, f64>) -> Result<()> {
        self.add_item(code, None, Some(values))
    }

    pub fn add_periods<I, P>(&mut self, periods: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: TryIntoPeriod,
    {
        let mut b = Builder::from_state(&self.state);
        b.add_periods(periods)?;
        self.commit(b)
    }

    pub fn add_calculation(&mut self, code: impl Into<String>, formula: &str) -> Result<()> {
        self.add_item(code, Some(formula), None)
    }

    /// Like [`Self::add_calculation`] but tags the node AGGREGATE (§4.9,
    /// subtotal population).
    pub fn add_aggregate(&mut self, code: impl Into<String>, formula: &str) -> Result<()> {
        let mut b = Builder::from_state(&self.state);
        b.add_aggregate_node(code, formula)?;
        self.commit(b)
    }

    pub fn add_metric(
        &mut self,
        metric_name: &str,
        node_name: Option<&str>,
        input_node_map: Option<&HashMap<String, String>>,
    ) -> Result<()> {
        let new_state = self
            .metrics
            .add_metric(&self.metric_registry, &self.state, metric_name, node_name, input_node_map)?;
        self.state = new_state;
        self.engine.clear_all();
        Ok(())
    }

    pub fn add_node(&mut self, source: &dyn NodeSource) -> Result<()> {
        self.add_item(source.code(), source.formula().as_deref(), source.values())
    }

    pub fn remove_node(&mut self, code: &str) -> Result<()> {
        let mut b = Builder::from_state(&self.state);
        b.remove_node(code)?;
        self.commit(b)?;
        log::debug!("removed node '{code}'");
        Ok(())
    }

    pub fn replace_node(&mut self, code: &str, formula: Option<&str>, values: Option<HashMap<String, f64>>) -> Result<()> {
        let mut b = Builder::from_state(&self.state);
        b.replace_node(code, formula, values)?;
        self.commit(b)?;
        log::debug!("replaced node '{code}'");
        Ok(())
    }

    pub fn update_financial_statement_item(&mut self, code: &str, values: HashMap<String, f64>, replace: bool) -> Result<()> {
        let mut b = Builder::from_state(&self.state);
        for (period, value) in values {
            b.set_node_value(code, &period, value, replace)?;
        }
        self.commit(b)
    }

    pub fn set_value(&mut self, code: &str, period: &str, value: f64, replace: bool) -> Result<()> {
        let mut b = Builder::from_state(&self.state);
        b.set_node_value(code, period, value, replace)?;
        self.commit(b)
    }

    pub fn clear(&mut self) {
        self.state = GraphState::empty();
        self.engine.clear_all();
        self.adjustments.clear();
    }

    // --- Calculation -----------------------------------------------------

    /// Evaluates every node for every period in `self.periods()`.
    pub fn calculate_all(&mut self) -> Result<HashMap<(String, String), f64>> {
        let periods: Vec<String> = self.state.periods().iter().map(|p| p.to_key_string()).collect();
        self.engine.calculate(&self.state, &periods)
    }

    pub fn calculate_all_with_trace(&mut self) -> Result<(HashMap<(String, String), f64>, TraceMap)> {
        let periods: Vec<String> = self.state.periods().iter().map(|p| p.to_key_string()).collect();
        self.engine.calculate_with_trace(&self.state, &periods)
    }

    /// Like [`Self::calculate_all`] but evaluates distinct periods on a
    /// `rayon` thread pool (§5). Bypasses this instance's memo cache
    /// entirely, so it's best suited to a one-shot full recompute rather
    /// than an interleaved workload of single-value lookups.
    pub fn calculate_all_parallel(&self) -> Result<HashMap<(String, String), f64>> {
        let periods: Vec<String> = self.state.periods().iter().map(|p| p.to_key_string()).collect();
        crate::engine::calculate_parallel(&self.state, &periods)
    }

    pub fn calculate(&mut self, code: &str, period: &str) -> Result<f64> {
        self.engine.calculate_one(&self.state, code, period)
    }

    pub fn calculate_with_trace(&mut self, code: &str, period: &str) -> Result<(f64, TraceMap)> {
        self.engine.calculate_one_with_trace(&self.state, code, period)
    }

    // --- Adjustments -------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn add_adjustment(
        &mut self,
        node: impl Into<String>,
        period: impl Into<String>,
        value: f64,
        adj_type: AdjustmentType,
        scale: f64,
        priority: i64,
        tags: impl IntoIterator<Item = String>,
        scenario: impl Into<String>,
        reason: Option<String>,
        user: Option<String>,
    ) -> Result<Uuid> {
        let mut builder = AdjustmentBuilder::new(node, period, value)
            .adj_type(adj_type)
            .scale(scale)
            .priority(priority)
            .tags(tags)
            .scenario(scenario);
        if let Some(reason) = reason {
            builder = builder.reason(reason);
        }
        if let Some(user) = user {
            builder = builder.user(user);
        }
        let adjustment = builder.build()?;
        let id = adjustment.id;
        self.adjustments.add(adjustment);
        Ok(id)
    }

    /// Returns the adjusted value for `(code, period)` and whether any
    /// adjustment changed it. Reads the adjustment set once at call
    /// start, per §5's "read once, apply once" consistency contract.
    pub fn get_adjusted_value(
        &mut self,
        code: &str,
        period: &str,
        selector: Option<&AdjustmentSelector>,
    ) -> Result<(f64, bool)> {
        let base = self.calculate(code, period)?;
        let matching = match selector {
            Some(selector) => self.adjustments.get_filtered(code, period, selector),
            None => self.adjustments.get_for(code, period),
        };
        let sorted = crate::adjustments::sorted_by_priority(matching);
        self.adjustments.apply_adjustments(base, &sorted)
    }

    pub fn was_adjusted(&mut self, code: &str, period: &str, selector: Option<&AdjustmentSelector>) -> Result<bool> {
        Ok(self.get_adjusted_value(code, period, selector)?.1)
    }

    pub fn adjustment_service(&self) -> &AdjustmentService {
        &self.adjustments
    }

    pub fn adjustment_service_mut(&mut self) -> &mut AdjustmentService {
        &mut self.adjustments
    }

    /// Exports every adjustment as the §6.5 tabular JSON record set.
    pub fn export_adjustments(&self) -> Result<String> {
        crate::adjustments::export_json(&self.adjustments.list_all())
    }

    /// Ingests adjustment records previously produced by
    /// [`Graph::export_adjustments`] and adds them to the live overlay.
    pub fn import_adjustments(&mut self, json: &str) -> Result<usize> {
        let imported = crate::adjustments::import_json(json)?;
        let count = imported.len();
        self.adjustments.add_many(imported);
        Ok(count)
    }

    // --- Introspection -----------------------------------------------------

    pub fn periods(&self) -> &crate::period::PeriodIndex {
        self.state.periods()
    }

    pub fn nodes(&self) -> &HashMap<String, Node> {
        self.state.nodes()
    }

    pub fn get_node(&self, code: &str) -> Option<&Node> {
        self.state.get_node(code)
    }

    pub fn has_node(&self, code: &str) -> bool {
        self.state.has_node(code)
    }

    pub fn get_calculation_nodes(&self) -> Vec<&Node> {
        self.state
            .nodes()
            .values()
            .filter(|n| !n.is_input())
            .collect()
    }

    /// `(code, [dependency codes])` for every node, in no particular
    /// order — the raw adjacency a caller might render as a diagram.
    pub fn get_dependency_graph(&self) -> HashMap<String, Vec<String>> {
        self.state
            .nodes()
            .keys()
            .map(|code| (code.clone(), crate::graph::topology::dependencies(self.state.nodes(), code)))
            .collect()
    }

    pub fn topological_sort(&self) -> &[String] {
        self.state.order()
    }

    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        crate::graph::topology::detect_cycles(self.state.nodes())
    }

    pub fn get_dependencies(&self, code: &str) -> Vec<String> {
        crate::graph::topology::dependencies(self.state.nodes(), code)
    }

    pub fn get_direct_successors(&self, code: &str) -> Vec<String> {
        crate::graph::topology::successors(self.state.nodes(), code)
    }

    pub fn get_direct_predecessors(&self, code: &str) -> Vec<String> {
        crate::graph::topology::predecessors(self.state.nodes(), code)
    }

    pub fn breadth_first_search(&self, start: &str, direction: crate::graph::topology::Direction) -> Vec<Vec<String>> {
        crate::graph::topology::breadth_first(self.state.nodes(), start, direction)
    }

    pub fn would_create_cycle(&self, proxy_code: &str, proxy_inputs: &std::collections::HashSet<String>) -> bool {
        crate::graph::topology::would_create_cycle(self.state.nodes(), proxy_code, proxy_inputs)
    }

    /// Finds a dependency path from `start` to `end` by walking
    /// successor layers, or `None` if `end` is unreachable from `start`.
    pub fn find_cycle_path(&self, start: &str, end: &str) -> Option<Vec<String>> {
        if start == end {
            return Some(vec![start.to_string()]);
        }
        let mut stack = vec![vec![start.to_string()]];
        let mut seen = std::collections::HashSet::new();
        seen.insert(start.to_string());
        while let Some(path) = stack.pop() {
            let current = path.last().unwrap().clone();
            for next in crate::graph::topology::successors(self.state.nodes(), &current) {
                if next == end {
                    let mut found = path.clone();
                    found.push(next);
                    return Some(found);
                }
                if seen.insert(next.clone()) {
                    let mut extended = path.clone();
                    extended.push(next);
                    stack.push(extended);
                }
            }
        }
        None
    }

    /// Human-readable errors: missing dependency references and
    /// circular paths (§4.7, §7).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for node in self.state.nodes().values() {
            for dep in &node.inputs {
                if !self.state.has_node(dep) {
                    errors.push(format!("Node '{}' depends on non-existent node '{}'", node.code, dep));
                }
            }
        }
        for cycle in self.detect_cycles() {
            errors.push(format!("Circular dependency: {}", cycle.join(" -> ")));
        }
        errors
    }

    /// Unions `other`'s periods and nodes into `self`. Missing nodes are
    /// inserted (cloning their formula or values); INPUT nodes present in
    /// both are merged by value union with `replace=true` (§4.7).
    pub fn merge_from(&mut self, other: &Graph) -> Result<()> {
        let mut b = Builder::from_state(&self.state);
        for period in other.state.periods() {
            b.add_period(*period)?;
        }
        for (code, node) in other.state.nodes() {
            if !b.has_node(code) {
                if node.is_input() {
                    b.add_node(code.clone(), None, Some(node.data.clone()))?;
                } else {
                    let formula = node.formula.clone().expect("formula node has a formula");
                    b.add_node(code.clone(), Some(&formula), None)?;
                }
            } else if node.is_input() {
                for (period, value) in &node.data {
                    b.set_node_value(code, period, *value, true)?;
                }
            }
        }
        self.commit(b)
    }

    pub fn state(&self) -> &GraphState {
        &self.state
    }
}
