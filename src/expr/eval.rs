//! Sandboxed evaluation of a parsed [`Expr`] over an environment mapping
//! names to values. There is no host-capability escape hatch here by
//! construction: the AST cannot represent a function call, attribute
//! access, or subscription (§6.4, §9 "Sandboxed expression evaluation"),
//! so the evaluator only ever sees numeric literals, names, and the
//! allowed operators.

use super::ast::{BinOp, CompareOp, Expr, UnaryOp};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    NameNotFound(String),
    DivisionByZero,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::NameNotFound(name) => write!(f, "name '{name}' is not defined"),
            EvalError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

/// Evaluates `expr` over `env`, Python-truthiness-free: comparisons and
/// the ternary condition are evaluated numerically (non-zero is truthy),
/// matching the host language's own coercion for the allowed subset.
pub fn eval(expr: &Expr, env: &HashMap<String, f64>) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Name(name) => env
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::NameNotFound(name.clone())),
        Expr::Unary { op, expr } => {
            let v = eval(expr, env)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Neg => -v,
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, env)?;
            let r = eval(rhs, env)?;
            match op {
                BinOp::Add => Ok(l + r),
                BinOp::Sub => Ok(l - r),
                BinOp::Mul => Ok(l * r),
                BinOp::Div => {
                    if r == 0.0 {
                        Err(EvalError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
                BinOp::Pow => Ok(l.powf(r)),
            }
        }
        Expr::Compare { op, lhs, rhs } => {
            let l = eval(lhs, env)?;
            let r = eval(rhs, env)?;
            let result = match op {
                CompareOp::Lt => l < r,
                CompareOp::Le => l <= r,
                CompareOp::Gt => l > r,
                CompareOp::Ge => l >= r,
                CompareOp::Eq => l == r,
                CompareOp::NotEq => l != r,
            };
            Ok(if result { 1.0 } else { 0.0 })
        }
        Expr::Ternary {
            cond,
            then_branch,
            else_branch,
        } => {
            if eval(cond, env)? != 0.0 {
                eval(then_branch, env)
            } else {
                eval(else_branch, env)
            }
        }
    }
}
