//! One processor per derived item kind (§4.9): each turns a statement
//! item into graph nodes via the facade, resolving item IDs through the
//! [`IdResolver`] and honoring sign conventions via synthetic
//! `{code}_signed` helper nodes.

use super::model::{CalculatedLineItem, CalculationType, Item, MetricLineItem, SubtotalLineItem};
use crate::error::GraphError;
use crate::facade::Graph;
use crate::resolver::IdResolver;
use std::collections::{HashMap, HashSet};

/// The outcome of one processor attempt. `success` with `node_added =
/// false` means the target node already existed (idempotent re-run,
/// §8 invariant 9). `missing_inputs` signals a retryable failure (an
/// input item hasn't been resolved yet); any other failure is
/// `error_message`.
#[derive(Debug, Clone, Default)]
pub struct ProcessorResult {
    pub success: bool,
    pub node_added: bool,
    pub error_message: Option<String>,
    pub missing_inputs: Option<Vec<String>>,
}

impl ProcessorResult {
    fn ok(node_added: bool) -> Self {
        ProcessorResult {
            success: true,
            node_added,
            error_message: None,
            missing_inputs: None,
        }
    }

    fn missing(inputs: Vec<String>) -> Self {
        ProcessorResult {
            success: false,
            node_added: false,
            error_message: None,
            missing_inputs: Some(inputs),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        ProcessorResult {
            success: false,
            node_added: false,
            error_message: Some(message.into()),
            missing_inputs: None,
        }
    }

    pub fn into_result(self, item_id: &str) -> crate::error::Result<bool> {
        if self.success {
            Ok(self.node_added)
        } else {
            let message = self
                .error_message
                .or_else(|| self.missing_inputs.map(|m| format!("missing inputs: {}", m.join(", "))))
                .unwrap_or_else(|| "unknown failure".to_string());
            Err(GraphError::PopulateError {
                item_id: item_id.to_string(),
                message,
            })
        }
    }
}

/// Resolves `input_id`, returning the signed helper node's code
/// (`{code}_signed`, ensured to exist) if `item_index` says that input's
/// `sign_convention` is `-1`, else the resolved code itself.
fn resolve_operand(
    input_id: &str,
    graph: &mut Graph,
    resolver: &mut IdResolver,
    item_index: &HashMap<String, Item>,
) -> Result<String, String> {
    let code = resolver
        .resolve(input_id, Some(graph.state()))
        .map_err(|_| input_id.to_string())?;

    let sign = item_index.get(input_id).map(sign_of).unwrap_or(1);
    if sign < 0 {
        let signed_code = format!("{code}_signed");
        if !graph.has_node(&signed_code) {
            graph
                .add_calculation(signed_code.clone(), &format!("-{code}"))
                .map_err(|e| e.to_string())?;
        }
        Ok(signed_code)
    } else {
        Ok(code)
    }
}

fn sign_of(item: &Item) -> i8 {
    match item {
        Item::Line(i) => i.sign_convention,
        Item::Calculated(i) => i.sign_convention,
        Item::Subtotal(i) => i.sign_convention,
        Item::Metric(i) => i.sign_convention,
        Item::Nested(_) => 1,
    }
}

fn resolve_operands(
    input_ids: &[String],
    graph: &mut Graph,
    resolver: &mut IdResolver,
    item_index: &HashMap<String, Item>,
) -> Result<Vec<String>, Vec<String>> {
    let mut operands = Vec::with_capacity(input_ids.len());
    let mut missing = Vec::new();
    for id in input_ids {
        match resolve_operand(id, graph, resolver, item_index) {
            Ok(code) => operands.push(code),
            Err(missing_id) => missing.push(missing_id),
        }
    }
    if missing.is_empty() {
        Ok(operands)
    } else {
        Err(missing)
    }
}

pub struct MetricItemProcessor;

impl MetricItemProcessor {
    pub fn process(&self, item: &MetricLineItem, graph: &mut Graph, resolver: &mut IdResolver) -> ProcessorResult {
        if graph.has_node(&item.id) {
            return ProcessorResult::ok(false);
        }

        let definition = match graph.metric_definition(&item.metric_id) {
            Some(d) => d,
            None => return ProcessorResult::error(format!("unknown metric '{}'", item.metric_id)),
        };

        let expected: HashSet<&str> = definition.inputs.iter().map(String::as_str).collect();
        let provided: HashSet<&str> = item.inputs.keys().map(String::as_str).collect();
        if expected != provided {
            return ProcessorResult::error(format!(
                "metric '{}' expects inputs {:?}, item provided {:?}",
                item.metric_id, definition.inputs, item.inputs.keys()
            ));
        }

        let mut resolved_map = HashMap::with_capacity(item.inputs.len());
        let mut missing = Vec::new();
        for (placeholder, input_item_id) in &item.inputs {
            match resolver.resolve(input_item_id, Some(graph.state())) {
                Ok(code) => {
                    resolved_map.insert(placeholder.clone(), code);
                }
                Err(_) => missing.push(input_item_id.clone()),
            }
        }
        if !missing.is_empty() {
            return ProcessorResult::missing(missing);
        }

        match graph.add_metric(&item.metric_id, Some(&item.id), Some(&resolved_map)) {
            Ok(()) => ProcessorResult::ok(true),
            Err(e) => ProcessorResult::error(e.to_string()),
        }
    }
}

pub struct CalculatedItemProcessor;

impl CalculatedItemProcessor {
    pub fn process(
        &self,
        item: &CalculatedLineItem,
        graph: &mut Graph,
        resolver: &mut IdResolver,
        item_index: &HashMap<String, Item>,
    ) -> ProcessorResult {
        if graph.has_node(&item.id) {
            return ProcessorResult::ok(false);
        }

        let operands = match resolve_operands(&item.input_ids, graph, resolver, item_index) {
            Ok(operands) => operands,
            Err(missing) => return ProcessorResult::missing(missing),
        };

        let formula = match item.calculation_type {
            CalculationType::Addition => operands.join(" + "),
            CalculationType::Subtraction => operands.join(" - "),
            CalculationType::Multiplication => operands.join(" * "),
            CalculationType::Division => operands.join(" / "),
            CalculationType::Formula => {
                let template = match &item.formula {
                    Some(f) => f,
                    None => return ProcessorResult::error("calculation_type = formula requires a formula string"),
                };
                let mut expr = template.clone();
                for (i, operand) in operands.iter().enumerate() {
                    expr = expr.replace(&format!("input_{i}"), operand);
                }
                expr
            }
        };

        match graph.add_calculation(item.id.clone(), &formula) {
            Ok(()) => ProcessorResult::ok(true),
            Err(e) => ProcessorResult::error(e.to_string()),
        }
    }
}

pub struct SubtotalItemProcessor;

impl SubtotalItemProcessor {
    pub fn process(
        &self,
        item: &SubtotalLineItem,
        graph: &mut Graph,
        resolver: &mut IdResolver,
        item_index: &HashMap<String, Item>,
    ) -> ProcessorResult {
        if item.item_ids.is_empty() {
            return ProcessorResult::ok(false);
        }
        if graph.has_node(&item.id) {
            return ProcessorResult::ok(false);
        }

        let operands = match resolve_operands(&item.item_ids, graph, resolver, item_index) {
            Ok(operands) => operands,
            Err(missing) => return ProcessorResult::missing(missing),
        };

        let formula = operands.join(" + ");
        match graph.add_aggregate(item.id.clone(), &formula) {
            Ok(()) => ProcessorResult::ok(true),
            Err(e) => ProcessorResult::error(e.to_string()),
        }
    }
}
