//! Defines [`Node`] and [`NodeKind`] — the immutable vertex type of the
//! calculation graph. A node either stores a period→value table (INPUT)
//! or an expression over other nodes (FORMULA/AGGREGATE); it is never
//! mutated in place, only replaced by re-insertion (§3).

use std::collections::{HashMap, HashSet};

/// The three node kinds. `AGGREGATE` carries no special evaluation
/// behavior of its own over `FORMULA` in this engine — both are
/// evaluated the same way (§4.4) — but is kept as a distinct tag because
/// statement population (§4.9) distinguishes a subtotal's provenance
/// from an ordinary calculated item for display/introspection purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    Formula,
    Aggregate,
}

/// An immutable vertex in the calculation DAG.
///
/// Invariants (enforced by the [`crate::graph::builder::Builder`] that
/// constructs these, never by `Node` itself, since `Node` has no
/// fallible constructor of its own):
/// - `kind == Input` iff `formula.is_none()` iff `inputs.is_empty()`.
/// - For a formula node, `inputs` is exactly the set of names the
///   parsed formula references (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub code: String,
    pub kind: NodeKind,
    pub formula: Option<String>,
    pub inputs: HashSet<String>,
    pub data: HashMap<String, f64>,
}

impl Node {
    pub fn new_input(code: impl Into<String>, data: HashMap<String, f64>) -> Self {
        Node {
            code: code.into(),
            kind: NodeKind::Input,
            formula: None,
            inputs: HashSet::new(),
            data,
        }
    }

    pub fn new_formula(
        code: impl Into<String>,
        formula: impl Into<String>,
        inputs: HashSet<String>,
        kind: NodeKind,
    ) -> Self {
        debug_assert!(kind != NodeKind::Input);
        Node {
            code: code.into(),
            kind,
            formula: Some(formula.into()),
            inputs,
            data: HashMap::new(),
        }
    }

    pub fn is_input(&self) -> bool {
        self.kind == NodeKind::Input
    }
}
