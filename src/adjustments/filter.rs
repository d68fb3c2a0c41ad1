use super::types::{Adjustment, AdjustmentType};
use std::collections::HashSet;

/// A declarative selector over adjustments (§4.5). Every field is
/// optional and permissive when absent; `exclude_*` always dominates the
/// matching `include_*` (§8 invariant 7).
#[derive(Debug, Clone, Default)]
pub struct AdjustmentFilter {
    pub include_scenarios: Option<HashSet<String>>,
    pub exclude_scenarios: Option<HashSet<String>>,
    /// An adjustment matches if any of its tags equals, or is a
    /// `/`-separated descendant of, one of these prefixes.
    pub include_tags: Option<HashSet<String>>,
    pub exclude_tags: Option<HashSet<String>>,
    /// Unlike `include_tags`, this requires an exact match for every tag
    /// named here — it's a conjunction, not a prefix test.
    pub require_all_tags: Option<HashSet<String>>,
    pub include_types: Option<HashSet<AdjustmentType>>,
    pub exclude_types: Option<HashSet<AdjustmentType>>,
    pub period: Option<String>,
}

impl AdjustmentFilter {
    pub fn matches(&self, adj: &Adjustment) -> bool {
        if let Some(period) = &self.period {
            if &adj.period != period {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude_scenarios {
            if exclude.contains(&adj.scenario) {
                return false;
            }
        }
        if let Some(include) = &self.include_scenarios {
            if !include.contains(&adj.scenario) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude_types {
            if exclude.contains(&adj.adj_type) {
                return false;
            }
        }
        if let Some(include) = &self.include_types {
            if !include.contains(&adj.adj_type) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude_tags {
            if adj.tags.iter().any(|t| tag_matches_any(t, exclude)) {
                return false;
            }
        }
        if let Some(include) = &self.include_tags {
            if !adj.tags.iter().any(|t| tag_matches_any(t, include)) {
                return false;
            }
        }

        if let Some(required) = &self.require_all_tags {
            if !required.iter().all(|r| adj.tags.contains(r)) {
                return false;
            }
        }

        true
    }
}

/// `tag` matches `prefix` if equal, or if `tag` is a `/`-delimited
/// descendant of `prefix` (`"A/B"` matches prefix `"A"` but `"A/BC"`
/// does not).
fn tag_matches_any(tag: &str, prefixes: &HashSet<String>) -> bool {
    prefixes
        .iter()
        .any(|p| tag == p || tag.starts_with(&format!("{p}/")))
}
