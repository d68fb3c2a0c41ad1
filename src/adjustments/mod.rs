//! The adjustment service (§4.5): a filtered, priority-ordered overlay
//! applied to base calculated/input values at query time.

mod filter;
mod types;

pub use filter::AdjustmentFilter;
pub use types::{Adjustment, AdjustmentBuilder, AdjustmentType};

use crate::error::{GraphError, Result};
use std::collections::HashMap;

/// A selector passed to [`AdjustmentService::get_filtered`]: either a
/// declarative [`AdjustmentFilter`], an arbitrary predicate, or a bare
/// set of tags treated as "match any" (§4.5).
pub enum AdjustmentSelector<'a> {
    Filter(AdjustmentFilter),
    Predicate(Box<dyn Fn(&Adjustment) -> bool + 'a>),
    AnyTag(std::collections::HashSet<String>),
}

impl<'a> AdjustmentSelector<'a> {
    fn matches(&self, adj: &Adjustment) -> bool {
        match self {
            AdjustmentSelector::Filter(f) => f.matches(adj),
            AdjustmentSelector::Predicate(p) => p(adj),
            AdjustmentSelector::AnyTag(tags) => adj.tags.iter().any(|t| tags.contains(t)),
        }
    }
}

/// Storage: a two-level map `node -> period -> ordered list<Adjustment>`,
/// preserving insertion order; priority ordering is applied only at
/// query time (§4.5).
#[derive(Debug, Default)]
pub struct AdjustmentService {
    store: HashMap<String, HashMap<String, Vec<Adjustment>>>,
    /// Strict mode: domain-guard violations in `apply_adjustments` raise
    /// `AdjustmentError` instead of silently returning the base value.
    strict: bool,
}

impl AdjustmentService {
    pub fn new(strict: bool) -> Self {
        AdjustmentService {
            store: HashMap::new(),
            strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn add(&mut self, adjustment: Adjustment) {
        self.store
            .entry(adjustment.node.clone())
            .or_default()
            .entry(adjustment.period.clone())
            .or_default()
            .push(adjustment);
    }

    pub fn add_many(&mut self, adjustments: impl IntoIterator<Item = Adjustment>) {
        for a in adjustments {
            self.add(a);
        }
    }

    pub fn list_all(&self) -> Vec<&Adjustment> {
        self.store
            .values()
            .flat_map(|by_period| by_period.values())
            .flatten()
            .collect()
    }

    pub fn get_for(&self, node: &str, period: &str) -> Vec<&Adjustment> {
        self.store
            .get(node)
            .and_then(|by_period| by_period.get(period))
            .map(|v| v.iter().collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Removes a single adjustment by id. Returns `true` if one was
    /// removed.
    pub fn remove(&mut self, id: uuid::Uuid) -> bool {
        let mut removed = false;
        for by_period in self.store.values_mut() {
            for list in by_period.values_mut() {
                let before = list.len();
                list.retain(|a| a.id != id);
                removed |= list.len() != before;
            }
        }
        removed
    }

    /// Adjustments for `(node, period)` matching `selector`, in their
    /// original insertion order.
    pub fn get_filtered(&self, node: &str, period: &str, selector: &AdjustmentSelector) -> Vec<&Adjustment> {
        self.get_for(node, period)
            .into_iter()
            .filter(|a| selector.matches(a))
            .collect()
    }

    /// Applies `adjustments` (must already be sorted by priority,
    /// ascending — lower priority applied first) to `base`, returning
    /// the adjusted value and whether anything actually changed it.
    pub fn apply_adjustments(&self, base: f64, adjustments: &[&Adjustment]) -> Result<(f64, bool)> {
        let mut value = base;
        let mut changed = false;

        for adj in adjustments {
            let before = value;
            value = self.apply_one(value, adj)?;
            if value != before {
                changed = true;
            }
        }

        Ok((value, changed))
    }

    fn apply_one(&self, base: f64, adj: &Adjustment) -> Result<f64> {
        match adj.adj_type {
            AdjustmentType::Additive => Ok(base + adj.value * adj.scale),
            AdjustmentType::Replacement => Ok(adj.value),
            AdjustmentType::Multiplicative => self.apply_multiplicative(base, adj),
        }
    }

    fn apply_multiplicative(&self, base: f64, adj: &Adjustment) -> Result<f64> {
        // Fractional exponent on a non-positive base is undefined over
        // the reals (would yield a complex number).
        if base <= 0.0 && adj.scale > 0.0 && adj.scale < 1.0 {
            return self.domain_violation(base, "fractional scale applied to a non-positive base");
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| base * adj.value.powf(adj.scale)));
        let result = match result {
            Ok(v) => v,
            Err(_) => return self.domain_violation(base, "overflow computing multiplicative adjustment"),
        };

        if !result.is_finite() {
            return self.domain_violation(base, "multiplicative adjustment produced a non-finite result");
        }

        Ok(result)
    }

    fn domain_violation(&self, base: f64, message: &str) -> Result<f64> {
        if self.strict {
            Err(GraphError::AdjustmentError(message.to_string()))
        } else {
            log::warn!("adjustment domain guard triggered ({message}); returning base value unchanged");
            Ok(base)
        }
    }
}

/// Sorts a set of adjustments by priority ascending (stable, so equal
/// priorities keep their relative insertion order — this is what makes
/// "the last, highest-priority REPLACEMENT wins" well defined, §8
/// invariant 6).
pub fn sorted_by_priority<'a>(adjustments: impl IntoIterator<Item = &'a Adjustment>) -> Vec<&'a Adjustment> {
    let mut v: Vec<&Adjustment> = adjustments.into_iter().collect();
    v.sort_by_key(|a| a.priority);
    v
}

/// Exports every stored adjustment as a JSON array of tabular records
/// with the column set §6.5 names (`node`, `period`, `value`, `reason`,
/// `type`, `tags`, `scale`, `priority`, `scenario`, `user`, `id`).
/// `Adjustment`'s own `Serialize` impl already produces exactly these
/// fields, so this is a thin wrapper rather than a bespoke row builder.
pub fn export_json(adjustments: &[&Adjustment]) -> Result<String> {
    serde_json::to_string(adjustments).map_err(|e| GraphError::AdjustmentError(format!("export failed: {e}")))
}

/// Ingests tabular adjustment records previously produced by
/// [`export_json`], validating field types via `serde`'s derived
/// `Deserialize` impl (§6.5 "ingestion validates types").
pub fn import_json(json: &str) -> Result<Vec<Adjustment>> {
    serde_json::from_str(json).map_err(|e| GraphError::AdjustmentError(format!("import failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn adj(value: f64, adj_type: AdjustmentType, scale: f64, priority: i64) -> Adjustment {
        AdjustmentBuilder::new("revenue", "2023Q2", value)
            .adj_type(adj_type)
            .scale(scale)
            .priority(priority)
            .build()
            .unwrap()
    }

    #[test]
    fn e4_additive_overlay() {
        let svc = AdjustmentService::new(false);
        let a = adj(100.0, AdjustmentType::Additive, 1.0, 0);
        let (value, changed) = svc.apply_adjustments(1100.0, &[&a]).unwrap();
        assert_eq!(value, 1200.0);
        assert!(changed);
    }

    #[test]
    fn additive_is_linear_for_equal_priority() {
        let svc = AdjustmentService::new(false);
        let a = adj(10.0, AdjustmentType::Additive, 1.0, 0);
        let b = adj(20.0, AdjustmentType::Additive, 0.5, 0);
        let (value, _) = svc.apply_adjustments(100.0, &[&a, &b]).unwrap();
        assert_eq!(value, 100.0 + 10.0 + 10.0);
    }

    #[test]
    fn replacement_last_wins() {
        let svc = AdjustmentService::new(false);
        let a = adj(10.0, AdjustmentType::Replacement, 1.0, 0);
        let b = adj(20.0, AdjustmentType::Replacement, 1.0, 1);
        let (value, _) = svc.apply_adjustments(100.0, &sorted_by_priority(vec![&a, &b])).unwrap();
        assert_eq!(value, 20.0);
    }

    #[test]
    fn e5_strict_multiplicative_domain_guard() {
        let a = adj(2.0, AdjustmentType::Multiplicative, 0.5, 0);

        let lenient = AdjustmentService::new(false);
        let (value, changed) = lenient.apply_adjustments(-100.0, &[&a]).unwrap();
        assert_eq!(value, -100.0);
        assert!(!changed);

        let strict = AdjustmentService::new(true);
        assert!(matches!(strict.apply_adjustments(-100.0, &[&a]), Err(GraphError::AdjustmentError(_))));
    }

    #[test]
    fn multiplicative_preserves_sign_for_positive_base() {
        let svc = AdjustmentService::new(true);
        let a = adj(2.0, AdjustmentType::Multiplicative, 1.0, 0);
        let (value, _) = svc.apply_adjustments(50.0, &[&a]).unwrap();
        assert_eq!(value, 100.0);
    }

    #[test]
    fn filter_tag_prefix_semantics() {
        let mut with_tag = AdjustmentBuilder::new("revenue", "2023Q2", 1.0).build().unwrap();
        with_tag.tags = HashSet::from(["A/B".to_string()]);
        let mut sibling = AdjustmentBuilder::new("revenue", "2023Q2", 1.0).build().unwrap();
        sibling.tags = HashSet::from(["A/BC".to_string()]);
        let mut child = AdjustmentBuilder::new("revenue", "2023Q2", 1.0).build().unwrap();
        child.tags = HashSet::from(["A/B/C".to_string()]);

        let filter = AdjustmentFilter {
            include_tags: Some(HashSet::from(["A/B".to_string()])),
            ..Default::default()
        };

        assert!(filter.matches(&with_tag));
        assert!(!filter.matches(&sibling));
        assert!(filter.matches(&child));
    }

    #[test]
    fn e4_scenario_filter_excludes_default_scenario_adjustment() {
        let mut svc = AdjustmentService::new(false);
        svc.add(AdjustmentBuilder::new("revenue", "2023Q2", 100.0).build().unwrap());

        let selector = AdjustmentSelector::Filter(AdjustmentFilter {
            include_scenarios: Some(HashSet::from(["stress_test".to_string()])),
            ..Default::default()
        });
        let matched = svc.get_filtered("revenue", "2023Q2", &selector);
        assert!(matched.is_empty());

        let (value, changed) = svc.apply_adjustments(1100.0, &matched).unwrap();
        assert_eq!(value, 1100.0);
        assert!(!changed);
    }

    #[test]
    fn exclude_dominates_include() {
        let mut a = AdjustmentBuilder::new("revenue", "2023Q2", 1.0).build().unwrap();
        a.tags = HashSet::from(["forecast".to_string()]);

        let filter = AdjustmentFilter {
            include_tags: Some(HashSet::from(["forecast".to_string()])),
            exclude_tags: Some(HashSet::from(["forecast".to_string()])),
            ..Default::default()
        };
        assert!(!filter.matches(&a));
    }
}
