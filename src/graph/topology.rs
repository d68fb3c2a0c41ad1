//! Kahn's algorithm over `code -> inputs` maps, cycle-path recovery, and
//! the pure inspection helpers (`dependencies`, `successors`,
//! `breadth_first`, `detect_cycles`, `would_create_cycle`) that operate
//! on a committed [`crate::graph::state::GraphState`].
//!
//! Dependencies are stored only on the dependent (forward edges,
//! `node -> inputs`, per §9 "Backrefs vs. forward edges"); successor
//! queries scan the node map rather than maintaining a reverse index.

use crate::error::{GraphError, Result};
use crate::graph::node::Node;
use petgraph::graphmap::DiGraphMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// Runs Kahn's algorithm over `nodes`. A dependency referenced in
/// `inputs` but absent from `nodes` is treated as zero-indegree at this
/// layer — existence checking is a separate validation concern (§4.3,
/// §4.7 `validate()`).
pub fn toposort(nodes: &HashMap<String, Node>) -> Result<Vec<String>> {
    let mut indegree: HashMap<&str, usize> = HashMap::new();
    // children[x] = nodes that list x as an input (x -> child edges)
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();

    for code in nodes.keys() {
        indegree.entry(code.as_str()).or_insert(0);
    }
    for (code, node) in nodes {
        for dep in &node.inputs {
            // A dependency absent from `nodes` is zero-indegree at this
            // layer (§4.3) and never gets queued or decremented, so it
            // must not contribute to `code`'s indegree either.
            if !nodes.contains_key(dep.as_str()) {
                continue;
            }
            *indegree.entry(code.as_str()).or_insert(0) += 1;
            children.entry(dep.as_str()).or_default().push(code.as_str());
        }
    }

    // Process in sorted order for determinism when multiple nodes are
    // simultaneously ready.
    let mut ready: Vec<&str> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&c, _)| c)
        .collect();
    ready.sort_unstable();
    let mut queue: VecDeque<&str> = ready.into_iter().collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(code) = queue.pop_front() {
        order.push(code.to_string());
        if let Some(kids) = children.get(code) {
            let mut newly_ready = Vec::new();
            for &kid in kids {
                let deg = indegree.get_mut(kid).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(kid);
                }
            }
            newly_ready.sort_unstable();
            for kid in newly_ready {
                queue.push_back(kid);
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let remaining_degree = indegree;
        let path = find_cycle_path(nodes, &remaining_degree);
        Err(GraphError::Cycle(path))
    }
}

/// Recovers a simple cycle path by DFS from the first node whose indegree
/// never dropped to zero in the aborted Kahn pass.
fn find_cycle_path(nodes: &HashMap<String, Node>, remaining_degree: &HashMap<&str, usize>) -> Vec<String> {
    let mut remaining: HashSet<&str> = remaining_degree
        .iter()
        .filter(|(_, &d)| d > 0)
        .map(|(&c, _)| c)
        .collect();
    if remaining.is_empty() {
        // Shouldn't happen if toposort actually failed, but guard anyway.
        return Vec::new();
    }
    let mut sorted_remaining: Vec<&str> = remaining.iter().copied().collect();
    sorted_remaining.sort_unstable();
    let start = sorted_remaining[0];

    let mut on_stack: HashMap<&str, usize> = HashMap::new();
    on_stack.insert(start, 0);
    let mut path = vec![start];

    loop {
        let current = *path.last().unwrap();
        let node = match nodes.get(current) {
            Some(n) => n,
            None => break,
        };
        let mut deps: Vec<&str> = node
            .inputs
            .iter()
            .map(|s| s.as_str())
            .filter(|d| remaining.contains(d))
            .collect();
        deps.sort_unstable();

        let mut advanced = false;
        for dep in deps {
            if let Some(&start_idx) = on_stack.get(dep) {
                // Found the cycle: dep..current plus dep again to close it.
                let mut cycle: Vec<String> = path[start_idx..].iter().map(|s| s.to_string()).collect();
                cycle.push(dep.to_string());
                return cycle;
            }
            path.push(dep);
            on_stack.insert(dep, path.len() - 1);
            advanced = true;
            break;
        }
        if !advanced {
            // Dead end without closing a cycle (shouldn't happen for a
            // genuinely cyclic remainder); bail with what we have.
            break;
        }
    }

    path.into_iter().map(|s| s.to_string()).collect()
}

/// Sorted direct predecessors (dependencies) of `code`.
pub fn dependencies(nodes: &HashMap<String, Node>, code: &str) -> Vec<String> {
    let mut deps: Vec<String> = nodes
        .get(code)
        .map(|n| n.inputs.iter().cloned().collect())
        .unwrap_or_default();
    deps.sort();
    deps
}

/// Sorted nodes that list `code` in their `inputs`.
pub fn successors(nodes: &HashMap<String, Node>, code: &str) -> Vec<String> {
    let mut succ: Vec<String> = nodes
        .values()
        .filter(|n| n.inputs.contains(code))
        .map(|n| n.code.clone())
        .collect();
    succ.sort();
    succ
}

/// Alias for [`dependencies`] (§4.3).
pub fn predecessors(nodes: &HashMap<String, Node>, code: &str) -> Vec<String> {
    dependencies(nodes, code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Successors,
    Predecessors,
}

fn build_graph(nodes: &HashMap<String, Node>) -> DiGraphMap<&str, ()> {
    let mut g = DiGraphMap::new();
    for code in nodes.keys() {
        g.add_node(code.as_str());
    }
    for (code, node) in nodes {
        for dep in &node.inputs {
            if nodes.contains_key(dep) {
                g.add_edge(dep.as_str(), code.as_str(), ());
            }
        }
    }
    g
}

/// Breadth-first layers starting at `start`, walking either successor or
/// predecessor edges.
pub fn breadth_first(nodes: &HashMap<String, Node>, start: &str, direction: Direction) -> Vec<Vec<String>> {
    if !nodes.contains_key(start) {
        return Vec::new();
    }
    let g = build_graph(nodes);
    let walk_graph = match direction {
        Direction::Successors => g,
        Direction::Predecessors => {
            let mut reversed = DiGraphMap::new();
            for n in g.nodes() {
                reversed.add_node(n);
            }
            for (a, b, _) in g.all_edges() {
                reversed.add_edge(b, a, ());
            }
            reversed
        }
    };

    // petgraph's `Bfs` doesn't expose per-level boundaries, so the layered
    // traversal invariant 's/it returns a list of layers' (§4.3) is built
    // directly over the same `DiGraphMap` with an explicit frontier queue.
    let mut layers = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start);
    let mut frontier = vec![start];
    layers.push(vec![start.to_string()]);

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &node in &frontier {
            let mut neighbors: Vec<&str> = walk_graph.neighbors(node).collect();
            neighbors.sort_unstable();
            for nb in neighbors {
                if visited.insert(nb) {
                    next.push(nb);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        next.sort_unstable();
        layers.push(next.iter().map(|s| s.to_string()).collect());
        frontier = next;
    }

    layers
}

/// Returns every cycle currently present, or an empty vec if the graph
/// sorts cleanly.
pub fn detect_cycles(nodes: &HashMap<String, Node>) -> Vec<Vec<String>> {
    match toposort(nodes) {
        Ok(_) => Vec::new(),
        Err(GraphError::Cycle(path)) => vec![path],
        Err(_) => Vec::new(),
    }
}

/// Would inserting `proxy_code` with the given `proxy_inputs` make the
/// graph unsortable?
pub fn would_create_cycle(nodes: &HashMap<String, Node>, proxy_code: &str, proxy_inputs: &HashSet<String>) -> bool {
    let mut speculative = nodes.clone();
    speculative.insert(
        proxy_code.to_string(),
        Node::new_formula(proxy_code, "", proxy_inputs.clone(), crate::graph::node::NodeKind::Formula),
    );
    toposort(&speculative).is_err()
}
