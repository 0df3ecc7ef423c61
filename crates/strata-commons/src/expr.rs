//! Predicate expression tree.
//!
//! The SQL layer parses view WHERE clauses and query predicates into this
//! tree before handing them to the catalog engine. The engine never parses
//! SQL text; it only walks these nodes to classify view updatability and
//! to derive scan boundaries for index selection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal runtime value appearing in a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarValue {
    Int(i64),
    /// Fixed-point decimal carried as its canonical text form; the engine
    /// never does arithmetic on it.
    Decimal(String),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::Decimal(v) => write!(f, "{}", v),
            ScalarValue::Text(v) => write!(f, "'{}'", v),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Date(v) => write!(f, "DATE '{}'", v),
        }
    }
}

/// Comparison operators understood by the classifier and the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Whether a function call can change value between evaluations.
///
/// `CURRENT_DATE()` and friends are `Volatile`: even when the surrounding
/// expression is shaped like a constant comparison, a volatile leaf denies
/// write-through because the pinned value would drift over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Volatility {
    Immutable,
    Volatile,
}

/// Parsed predicate node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a column by name.
    Column(String),
    Literal(ScalarValue),
    /// Positional bind parameter (`?`), constant for a given execution.
    BindParam(u32),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    FnCall {
        name: String,
        args: Vec<Expr>,
        volatility: Volatility,
    },
}

impl Expr {
    /// `column = value` shorthand.
    pub fn eq(column: impl Into<String>, value: ScalarValue) -> Self {
        Expr::compare(CompareOp::Eq, column, value)
    }

    pub fn compare(op: CompareOp, column: impl Into<String>, value: ScalarValue) -> Self {
        Expr::Compare {
            op,
            lhs: Box::new(Expr::Column(column.into())),
            rhs: Box::new(Expr::Literal(value)),
        }
    }

    pub fn and(conjuncts: Vec<Expr>) -> Self {
        Expr::And(conjuncts)
    }

    /// True when this subtree evaluates to the same value on every row of a
    /// single execution: literals, bind parameters, and immutable functions
    /// of constants. Column references and volatile calls are not constant.
    pub fn is_runtime_constant(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::BindParam(_) => true,
            Expr::FnCall {
                volatility, args, ..
            } => *volatility == Volatility::Immutable && args.iter().all(Expr::is_runtime_constant),
            Expr::Compare { .. } | Expr::And(_) | Expr::Or(_) | Expr::Not(_) | Expr::Column(_) => {
                false
            }
        }
    }

    /// Collects every column name referenced anywhere in the tree.
    pub fn referenced_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Column(name) => {
                if !out.iter().any(|c| c == name) {
                    out.push(name.clone());
                }
            }
            Expr::Literal(_) | Expr::BindParam(_) => {}
            Expr::Compare { lhs, rhs, .. } => {
                lhs.referenced_columns(out);
                rhs.referenced_columns(out);
            }
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.referenced_columns(out);
                }
            }
            Expr::Not(inner) => inner.referenced_columns(out),
            Expr::FnCall { args, .. } => {
                for arg in args {
                    arg.referenced_columns(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_constant() {
        assert!(Expr::Literal(ScalarValue::Int(1)).is_runtime_constant());
        assert!(Expr::BindParam(0).is_runtime_constant());
        assert!(!Expr::Column("k1".into()).is_runtime_constant());
    }

    #[test]
    fn test_immutable_fn_of_constants_is_constant() {
        let expr = Expr::FnCall {
            name: "TO_DATE".into(),
            args: vec![Expr::Literal(ScalarValue::Text("2020-01-01".into()))],
            volatility: Volatility::Immutable,
        };
        assert!(expr.is_runtime_constant());
    }

    #[test]
    fn test_volatile_fn_is_not_constant() {
        let expr = Expr::FnCall {
            name: "CURRENT_DATE".into(),
            args: vec![],
            volatility: Volatility::Volatile,
        };
        assert!(!expr.is_runtime_constant());
    }

    #[test]
    fn test_referenced_columns_deduplicates() {
        let expr = Expr::And(vec![
            Expr::eq("k1", ScalarValue::Int(1)),
            Expr::compare(CompareOp::Gt, "k1", ScalarValue::Int(0)),
            Expr::eq("v2", ScalarValue::Int(9)),
        ]);
        let mut cols = Vec::new();
        expr.referenced_columns(&mut cols);
        assert_eq!(cols, vec!["k1".to_string(), "v2".to_string()]);
    }
}
