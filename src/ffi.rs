//! Thin `pyo3` bindings exposing [`crate::facade::Graph`] to Python,
//! mirroring the lineage's `_core` extension-module pattern: a pure Rust
//! core paired with a minimal translation layer, never duplicating logic
//! here.
//!
//! Builds only with the `ffi` feature; off by default so `cargo test`
//! and library consumers never pay for `pyo3`.

use crate::adjustments::AdjustmentType;
use crate::error::GraphError;
use crate::facade::Graph;
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

fn to_py_err(err: GraphError) -> PyErr {
    match err {
        GraphError::NotFound(_) => PyKeyError::new_err(err.to_string()),
        GraphError::Cycle(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn adjustment_type_from_str(s: &str) -> PyResult<AdjustmentType> {
    match s.to_uppercase().as_str() {
        "ADDITIVE" => Ok(AdjustmentType::Additive),
        "MULTIPLICATIVE" => Ok(AdjustmentType::Multiplicative),
        "REPLACEMENT" => Ok(AdjustmentType::Replacement),
        other => Err(PyValueError::new_err(format!("unknown adjustment type '{other}'"))),
    }
}

#[pyclass(name = "Graph")]
pub struct PyGraph {
    inner: Graph,
}

#[pymethods]
impl PyGraph {
    #[new]
    #[pyo3(signature = (strict_adjustments=false))]
    fn new(strict_adjustments: bool) -> Self {
        PyGraph {
            inner: Graph::new(strict_adjustments),
        }
    }

    #[pyo3(signature = (code, formula=None, values=None))]
    fn add_item(&mut self, code: String, formula: Option<&str>, values: Option<HashMap<String, f64>>) -> PyResult<()> {
        self.inner.add_item(code, formula, values).map_err(to_py_err)
    }

    fn add_financial_statement_item(&mut self, code: String, values: HashMap<String, f64>) -> PyResult<()> {
        self.inner.add_financial_statement_item(code, values).map_err(to_py_err)
    }

    fn add_periods(&mut self, periods: Vec<String>) -> PyResult<()> {
        self.inner.add_periods(periods).map_err(to_py_err)
    }

    fn add_calculation(&mut self, code: String, formula: &str) -> PyResult<()> {
        self.inner.add_calculation(code, formula).map_err(to_py_err)
    }

    fn remove_node(&mut self, code: &str) -> PyResult<()> {
        self.inner.remove_node(code).map_err(to_py_err)
    }

    fn set_value(&mut self, code: &str, period: &str, value: f64, replace: bool) -> PyResult<()> {
        self.inner.set_value(code, period, value, replace).map_err(to_py_err)
    }

    fn calculate(&mut self, code: &str, period: &str) -> PyResult<f64> {
        self.inner.calculate(code, period).map_err(to_py_err)
    }

    #[pyo3(signature = (node, period, value, adj_type="ADDITIVE", scale=1.0, priority=0, tags=None, scenario="default".to_string(), reason=None, user=None))]
    #[allow(clippy::too_many_arguments)]
    fn add_adjustment(
        &mut self,
        node: String,
        period: String,
        value: f64,
        adj_type: &str,
        scale: f64,
        priority: i64,
        tags: Option<Vec<String>>,
        scenario: String,
        reason: Option<String>,
        user: Option<String>,
    ) -> PyResult<String> {
        let adj_type = adjustment_type_from_str(adj_type)?;
        let id = self
            .inner
            .add_adjustment(node, period, value, adj_type, scale, priority, tags.unwrap_or_default(), scenario, reason, user)
            .map_err(to_py_err)?;
        Ok(id.to_string())
    }

    fn get_adjusted_value(&mut self, code: &str, period: &str) -> PyResult<(f64, bool)> {
        self.inner.get_adjusted_value(code, period, None).map_err(to_py_err)
    }

    fn validate(&self) -> Vec<String> {
        self.inner.validate()
    }

    fn has_node(&self, code: &str) -> bool {
        self.inner.has_node(code)
    }

    fn topological_sort(&self) -> Vec<String> {
        self.inner.topological_sort().to_vec()
    }
}

/// Confirms the compiled extension module matches the crate version.
#[pyfunction]
fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn _core(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(pyo3::wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_class::<PyGraph>()?;
    Ok(())
}
