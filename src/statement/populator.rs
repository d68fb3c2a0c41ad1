//! The retry scheduler (§4.9): walks a [`StatementStructure`], attempts
//! every derived item in insertion order, and requeues items that fail
//! on missing inputs until a pass makes no further progress.

use super::model::{Item, Section, StatementStructure};
use super::processors::{CalculatedItemProcessor, MetricItemProcessor, ProcessorResult, SubtotalItemProcessor};
use super::registry::StandardNodeRegistry;
use crate::facade::Graph;
use crate::resolver::IdResolver;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PopulateReport {
    pub successes: usize,
    pub nodes_added: usize,
    pub failures: Vec<(String, String)>,
}

/// Flattens every item in `structure` (including nested sections) into
/// `id -> Item`, preserving the statement's declaration order — the
/// order the retry scheduler processes derived items in.
fn flatten(structure: &StatementStructure) -> Vec<Item> {
    let mut out = Vec::new();
    for section in &structure.sections {
        flatten_section(section, &mut out);
    }
    out
}

fn flatten_section(section: &Section, out: &mut Vec<Item>) {
    for item in &section.items {
        if let Item::Nested(nested) = item {
            flatten_section(nested, out);
        } else {
            out.push(item.clone());
        }
    }
    if let Some(subtotal) = &section.subtotal {
        out.push(Item::Subtotal(subtotal.clone()));
    }
}

/// Runs the populator over `structure`, mutating `graph` in place.
/// LineItems are registered with the resolver but never processed (base
/// line items are assumed to already exist as graph nodes, §4.9);
/// calculated/subtotal/metric items are attempted in insertion order,
/// requeuing on missing inputs until a full pass makes no progress.
pub fn populate(
    graph: &mut Graph,
    resolver: &mut IdResolver,
    registry: &dyn StandardNodeRegistry,
    structure: &StatementStructure,
) -> PopulateReport {
    let items = flatten(structure);
    let item_index: HashMap<String, Item> = items.iter().map(|i| (i.id().to_string(), i.clone())).collect();

    for item in &items {
        if let Err(e) = resolver.register_item(item, registry) {
            log::warn!("failed to register item '{}': {e}", item.id());
        }
    }

    let mut pending: Vec<&Item> = items
        .iter()
        .filter(|i| !matches!(i, Item::Line(_)))
        .collect();

    let mut report = PopulateReport::default();
    let mut attempt_count: HashMap<String, u32> = HashMap::new();

    loop {
        if pending.is_empty() {
            break;
        }
        let mut next_pending = Vec::new();
        let mut made_progress = false;

        for item in pending {
            let id = item.id().to_string();
            let attempts = attempt_count.entry(id.clone()).or_insert(0);
            *attempts += 1;
            let is_retry = *attempts > 1;

            let result = dispatch(item, graph, resolver, &item_index);

            if result.success {
                made_progress = true;
                report.successes += 1;
                if result.node_added {
                    report.nodes_added += 1;
                }
            } else if result.missing_inputs.is_some() {
                if is_retry {
                    log::warn!("item '{id}' still has missing inputs on retry");
                }
                next_pending.push(item);
            } else {
                let message = result.error_message.clone().unwrap_or_default();
                if is_retry {
                    log::warn!("item '{id}' failed: {message}");
                }
                next_pending.push(item);
            }
        }

        if !made_progress {
            for item in &next_pending {
                report.failures.push((
                    item.id().to_string(),
                    "unresolved dependencies or circular reference".to_string(),
                ));
            }
            break;
        }
        pending = next_pending;
    }

    report
}

fn dispatch(item: &Item, graph: &mut Graph, resolver: &mut IdResolver, item_index: &HashMap<String, Item>) -> ProcessorResult {
    match item {
        Item::Metric(metric) => MetricItemProcessor.process(metric, graph, resolver),
        Item::Calculated(calc) => CalculatedItemProcessor.process(calc, graph, resolver, item_index),
        Item::Subtotal(subtotal) => SubtotalItemProcessor.process(subtotal, graph, resolver, item_index),
        Item::Line(_) | Item::Nested(_) => ProcessorResult::default(),
    }
}
