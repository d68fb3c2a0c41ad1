//! The statement structure external contract (§6.1): a tree the
//! populator consumes but does not own. Parsing/validating this shape
//! from YAML/JSON is explicitly out of scope (§1) — these types are the
//! in-memory contract a host application builds and hands to the
//! populator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `+1` or `-1`; encoded as an `i8` rather than a bool so arithmetic
/// (`sign_convention as f64 * value`) reads naturally at call sites.
pub type SignConvention = i8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementStructure {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub items: Vec<Item>,
    #[serde(default)]
    pub subtotal: Option<SubtotalLineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Item {
    Line(LineItem),
    Calculated(CalculatedLineItem),
    Subtotal(SubtotalLineItem),
    Metric(MetricLineItem),
    Nested(Section),
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Item::Line(i) => &i.id,
            Item::Calculated(i) => &i.id,
            Item::Subtotal(i) => &i.id,
            Item::Metric(i) => &i.id,
            Item::Nested(s) => &s.id,
        }
    }
}

/// Either `node_id` or `standard_node_ref` must be set; whichever is
/// present is resolved by the ID resolver (§4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub sign_convention: SignConvention,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub standard_node_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Formula,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedLineItem {
    pub id: String,
    pub name: String,
    pub sign_convention: SignConvention,
    pub calculation_type: CalculationType,
    pub input_ids: Vec<String>,
    /// For `calculation_type = Formula`: an expression using positional
    /// placeholders `input_0`, `input_1`, ... substituted by `input_ids`.
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtotalLineItem {
    pub id: String,
    pub name: String,
    #[serde(default = "default_sign")]
    pub sign_convention: SignConvention,
    pub item_ids: Vec<String>,
}

fn default_sign() -> SignConvention {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLineItem {
    pub id: String,
    pub name: String,
    #[serde(default = "default_sign")]
    pub sign_convention: SignConvention,
    pub metric_id: String,
    pub inputs: HashMap<String, String>,
}
