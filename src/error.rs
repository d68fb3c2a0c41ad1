//! The crate's unified error type.
//!
//! Pure domain code (period parsing, the builder, the engine, the
//! adjustment service) all return this one enum so callers never have to
//! match on a family of unrelated error types. The facade preserves the
//! variant but may attach additional context when it wraps a lower-level
//! failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("invalid period '{0}'")]
    InvalidPeriod(String),

    #[error("invalid formula for '{code}': {message}")]
    InvalidFormula { code: String, message: String },

    #[error("node '{code}' has no value for period '{period}'")]
    MissingInput { code: String, period: String },

    #[error("error evaluating '{code}' at period '{period}': {message}")]
    EvalError {
        code: String,
        period: String,
        message: String,
    },

    #[error("node '{code}' already has a value for period '{period}'")]
    DuplicateValue { code: String, period: String },

    #[error("node '{code}' is not an input node")]
    TypeMismatch { code: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("node '{0}' already exists")]
    AlreadyExists(String),

    #[error("cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("adjustment error: {0}")]
    AdjustmentError(String),

    #[error("failed to populate item '{item_id}': {message}")]
    PopulateError { item_id: String, message: String },
}
