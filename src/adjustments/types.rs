use crate::error::{GraphError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// How an adjustment's `value` combines with the base value it overlays
/// (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentType {
    Additive,
    Multiplicative,
    Replacement,
}

impl Default for AdjustmentType {
    fn default() -> Self {
        AdjustmentType::Additive
    }
}

/// A single overlay entry: `node`/`period` identify what it applies to,
/// `scenario` and `tags` let callers select subsets of the overlay at
/// query time (§4.5, §6.7).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub node: String,
    pub period: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub adj_type: AdjustmentType,
    /// Weight applied to `value` (ADDITIVE) or used as the exponent
    /// (MULTIPLICATIVE). Must lie in `[0, 1]`.
    pub scale: f64,
    /// Application order: lower priorities are applied first.
    pub priority: i64,
    pub tags: HashSet<String>,
    pub scenario: String,
    pub reason: Option<String>,
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Adjustment {
    fn validate_scale(scale: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&scale) {
            return Err(GraphError::AdjustmentError(format!(
                "scale must lie in [0, 1], got {scale}"
            )));
        }
        Ok(())
    }
}

/// Builds an [`Adjustment`], filling in `id`/`timestamp` and defaulting
/// `scenario` to `"default"` and `adj_type` to ADDITIVE, matching the
/// constructor defaults in §3.
pub struct AdjustmentBuilder {
    node: String,
    period: String,
    value: f64,
    adj_type: AdjustmentType,
    scale: f64,
    priority: i64,
    tags: HashSet<String>,
    scenario: String,
    reason: Option<String>,
    user: Option<String>,
}

impl AdjustmentBuilder {
    pub fn new(node: impl Into<String>, period: impl Into<String>, value: f64) -> Self {
        AdjustmentBuilder {
            node: node.into(),
            period: period.into(),
            value,
            adj_type: AdjustmentType::Additive,
            scale: 1.0,
            priority: 0,
            tags: HashSet::new(),
            scenario: "default".to_string(),
            reason: None,
            user: None,
        }
    }

    pub fn adj_type(mut self, t: AdjustmentType) -> Self {
        self.adj_type = t;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = scenario.into();
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn build(self) -> Result<Adjustment> {
        Adjustment::validate_scale(self.scale)?;
        Ok(Adjustment {
            id: Uuid::new_v4(),
            node: self.node,
            period: self.period,
            value: self.value,
            adj_type: self.adj_type,
            scale: self.scale,
            priority: self.priority,
            tags: self.tags,
            scenario: self.scenario,
            reason: self.reason,
            user: self.user,
            timestamp: Utc::now(),
        })
    }
}
