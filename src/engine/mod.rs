//! The formula evaluator (§4.4): per-(node, period) memoization over a
//! committed [`GraphState`], with an AST cache keyed by formula text so
//! a formula shared by many nodes (or re-evaluated across a structural
//! change that didn't touch it) is parsed once.
//!
//! Evaluation is a recursive walk with memoization, in the same shape as
//! the lineage's `ComputationEngine::compute` (a DFS that builds a valid
//! evaluation order on the fly and caches as it goes) rather than a
//! strict linear pass over `state.order` — this is equivalent for a
//! committed (acyclic) state and lets single-node queries
//! (`calculate_one`) avoid visiting the whole graph.

use crate::error::{GraphError, Result};
use crate::expr::{self, Expr};
use crate::graph::GraphState;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub node: String,
    pub period: String,
    pub sorted_deps: Vec<String>,
    pub duration_ns: u128,
    pub value: f64,
}

pub type ValueMap = HashMap<(String, String), f64>;
pub type TraceMap = HashMap<(String, String), TraceEntry>;

#[derive(Debug, Default)]
pub struct CalculationEngine {
    ast_cache: HashMap<String, Expr>,
    value_cache: ValueMap,
}

impl CalculationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates every node in `state` for every period in `periods`,
    /// returning the full period map.
    pub fn calculate(&mut self, state: &GraphState, periods: &[String]) -> Result<ValueMap> {
        let mut out = HashMap::new();
        for code in state.order() {
            for period in periods {
                let value = self.eval(state, code, period, None)?;
                out.insert((code.clone(), period.clone()), value);
            }
        }
        Ok(out)
    }

    /// Same as [`Self::calculate`] but also returns a trace entry per
    /// `(node, period)` recording its sorted dependencies and wall time.
    pub fn calculate_with_trace(&mut self, state: &GraphState, periods: &[String]) -> Result<(ValueMap, TraceMap)> {
        let mut values = HashMap::new();
        let mut trace = HashMap::new();
        for code in state.order() {
            for period in periods {
                let value = self.eval(state, code, period, Some(&mut trace))?;
                values.insert((code.clone(), period.clone()), value);
            }
        }
        Ok((values, trace))
    }

    /// Evaluates a single `(code, period)` pair, computing dependencies
    /// as needed. Falls back to this explicit single-key path when a
    /// caller wants one value without materializing the whole period
    /// map (§4.7 `calculate(code, period)`).
    pub fn calculate_one(&mut self, state: &GraphState, code: &str, period: &str) -> Result<f64> {
        self.eval(state, code, period, None)
    }

    pub fn calculate_one_with_trace(
        &mut self,
        state: &GraphState,
        code: &str,
        period: &str,
    ) -> Result<(f64, TraceMap)> {
        let mut trace = HashMap::new();
        let value = self.eval(state, code, period, Some(&mut trace))?;
        Ok((value, trace))
    }

    fn eval(&mut self, state: &GraphState, code: &str, period: &str, mut trace: Option<&mut TraceMap>) -> Result<f64> {
        let key = (code.to_string(), period.to_string());
        if let Some(v) = self.value_cache.get(&key) {
            return Ok(*v);
        }

        let node = state
            .get_node(code)
            .ok_or_else(|| GraphError::NotFound(code.to_string()))?;

        let start = std::time::Instant::now();

        let value = if node.is_input() {
            *node
                .data
                .get(period)
                .ok_or_else(|| GraphError::MissingInput {
                    code: code.to_string(),
                    period: period.to_string(),
                })?
        } else {
            let formula = node.formula.clone().expect("formula node has a formula");
            let mut sorted_deps: Vec<String> = node.inputs.iter().cloned().collect();
            sorted_deps.sort();

            let mut env = HashMap::with_capacity(sorted_deps.len());
            for dep in &sorted_deps {
                let dep_value = self.eval(state, dep, period, trace.as_deref_mut())?;
                env.insert(dep.clone(), dep_value);
            }

            let ast = self.ast_for(&formula, code)?;
            expr::eval(&ast, &env).map_err(|e| GraphError::EvalError {
                code: code.to_string(),
                period: period.to_string(),
                message: e.to_string(),
            })?
        };

        if let Some(map) = trace.as_deref_mut() {
            let mut sorted_deps: Vec<String> = node.inputs.iter().cloned().collect();
            sorted_deps.sort();
            map.insert(
                key.clone(),
                TraceEntry {
                    node: code.to_string(),
                    period: period.to_string(),
                    sorted_deps,
                    duration_ns: start.elapsed().as_nanos(),
                    value,
                },
            );
        }

        self.value_cache.insert(key, value);
        Ok(value)
    }

    fn ast_for(&mut self, formula: &str, code: &str) -> Result<Expr> {
        if let Some(ast) = self.ast_cache.get(formula) {
            return Ok(ast.clone());
        }
        let ast = expr::parse(formula).map_err(|_| GraphError::InvalidFormula {
            code: code.to_string(),
            message: format!("could not parse formula '{formula}'"),
        })?;
        self.ast_cache.insert(formula.to_string(), ast.clone());
        Ok(ast)
    }

    /// Clears every cached value. Used after any structural change
    /// (add/remove/replace node) — conservative per §4.4's stated
    /// default (see SPEC_FULL.md's resolution of the invalidation-policy
    /// open question).
    pub fn clear_all(&mut self) {
        self.value_cache.clear();
    }

    /// Clears cached values keyed on `code` only, for callers who have
    /// asserted "downstream pure recomputation" per §4.4. This does not
    /// recompute or invalidate successors; the caller is responsible for
    /// knowing that's safe.
    pub fn invalidate_code(&mut self, code: &str) {
        self.value_cache.retain(|(c, _), _| c != code);
    }
}

/// Evaluates every node for every period in `periods`, running distinct
/// periods on a `rayon` thread pool (§5 "`calculate_parallel`"). Each
/// period gets its own `CalculationEngine` — caches are per-instance and
/// never shared across threads — so this never parallelizes node
/// evaluation *within* a period, only across the period dimension, which
/// keeps `state.order`'s dependency guarantee intact per period.
pub fn calculate_parallel(state: &GraphState, periods: &[String]) -> Result<ValueMap> {
    use rayon::prelude::*;

    let partials: Vec<Result<Vec<((String, String), f64)>>> = periods
        .par_iter()
        .map(|period| {
            let mut engine = CalculationEngine::new();
            let mut out = Vec::with_capacity(state.order().len());
            for code in state.order() {
                let value = engine.calculate_one(state, code, period)?;
                out.push(((code.clone(), period.clone()), value));
            }
            Ok(out)
        })
        .collect();

    let mut combined = HashMap::new();
    for partial in partials {
        for (key, value) in partial? {
            combined.insert(key, value);
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Builder;
    use std::collections::HashMap as Map;

    fn gross_profit_state() -> GraphState {
        let mut b = Builder::new();
        b.add_node("revenue", None, Some(Map::from([("2023".into(), 1000.0), ("2024".into(), 1200.0)])))
            .unwrap();
        b.add_node("cogs", None, Some(Map::from([("2023".into(), 600.0), ("2024".into(), 700.0)])))
            .unwrap();
        b.add_node("gross_profit", Some("revenue - cogs"), None).unwrap();
        b.commit().unwrap()
    }

    #[test]
    fn e1_gross_profit() {
        let state = gross_profit_state();
        let mut engine = CalculationEngine::new();
        let v = engine.calculate_one(&state, "gross_profit", "2023").unwrap();
        assert_eq!(v, 400.0);
    }

    #[test]
    fn e2_multi_period_with_cache() {
        let state = gross_profit_state();
        let mut engine = CalculationEngine::new();
        let periods = vec!["2023".to_string(), "2024".to_string()];
        let (values, trace) = engine.calculate_with_trace(&state, &periods).unwrap();

        assert_eq!(values[&("revenue".to_string(), "2023".to_string())], 1000.0);
        assert_eq!(values[&("cogs".to_string(), "2023".to_string())], 600.0);
        assert_eq!(values[&("gross_profit".to_string(), "2023".to_string())], 400.0);
        assert_eq!(values[&("revenue".to_string(), "2024".to_string())], 1200.0);
        assert_eq!(values[&("cogs".to_string(), "2024".to_string())], 700.0);
        assert_eq!(values[&("gross_profit".to_string(), "2024".to_string())], 500.0);

        for entry in trace.values() {
            assert!(entry.duration_ns < u128::MAX);
        }

        // Second call reads straight from cache and returns the same value.
        let v2 = engine.calculate_one(&state, "gross_profit", "2023").unwrap();
        assert_eq!(v2, 400.0);
    }

    #[test]
    fn missing_input_errors() {
        let mut b = Builder::new();
        b.add_node("a", None, Some(Map::new())).unwrap();
        let state = b.commit().unwrap();
        let mut engine = CalculationEngine::new();
        assert!(matches!(
            engine.calculate_one(&state, "a", "2023"),
            Err(GraphError::MissingInput { .. })
        ));
    }

    #[test]
    fn calculate_parallel_matches_sequential() {
        let state = gross_profit_state();
        let periods = vec!["2023".to_string(), "2024".to_string()];

        let sequential = CalculationEngine::new().calculate(&state, &periods).unwrap();
        let parallel = calculate_parallel(&state, &periods).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn value_cache_invalidation_reflects_new_value() {
        let mut b = Builder::new();
        b.add_node("a", None, Some(Map::from([("2023".into(), 1.0)]))).unwrap();
        b.add_node("b", Some("a * 2"), None).unwrap();
        let state = b.commit().unwrap();

        let mut engine = CalculationEngine::new();
        assert_eq!(engine.calculate_one(&state, "b", "2023").unwrap(), 2.0);

        let mut b2 = Builder::from_state(&state);
        b2.set_node_value("a", "2023", 5.0, true).unwrap();
        let state2 = b2.commit().unwrap();
        engine.clear_all();

        assert_eq!(engine.calculate_one(&state2, "b", "2023").unwrap(), 10.0);
    }
}
