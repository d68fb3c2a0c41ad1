//! The parsed expression tree. Every variant here corresponds to a
//! construct the grammar in §6.4 allows — nothing else can be built, so
//! the evaluator (§4.4 / `expr::eval`) never needs to reject a node kind
//! at evaluation time.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Name(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

/// Identifiers that the grammar recognizes as keywords rather than names,
/// plus a defensive set of Python-keyword-lookalikes a formula author
/// might type by habit. None of these are ever valid node references.
pub const RESERVED_WORDS: &[&str] = &[
    "if", "else", "and", "or", "not", "in", "is", "for", "while", "True", "False", "None",
    "lambda", "def", "return", "import",
];

impl Expr {
    /// Collects every `Name` referenced by this expression, excluding
    /// reserved words (the tokenizer already turns `if`/`else` into
    /// keyword tokens, so this mainly guards against future grammar
    /// growth and defense-in-depth).
    pub fn collect_names(&self, out: &mut HashSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Name(name) => {
                if !RESERVED_WORDS.contains(&name.as_str()) {
                    out.insert(name.clone());
                }
            }
            Expr::Unary { expr, .. } => expr.collect_names(out),
            Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            Expr::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.collect_names(out);
                then_branch.collect_names(out);
                else_branch.collect_names(out);
            }
        }
    }

    pub fn referenced_names(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_names(&mut out);
        out
    }
}
