//! Logical scan boundaries.
//!
//! Constraints are extracted from a conjunctive predicate and turned into
//! per-segment scan ranges over a key layout. Bounds carry runtime-constant
//! expressions (literals, bind parameters); byte encoding of the resulting
//! boundaries belongs to the storage layer, not here.

use std::collections::HashMap;
use std::ops::Bound;
use strata_commons::{CompareOp, Expr, KeyLayout};

/// Accumulated constraint on a single column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnConstraint {
    pub eq: Option<Expr>,
    pub lower: Option<(Expr, bool)>, // (value, inclusive)
    pub upper: Option<(Expr, bool)>,
}

impl ColumnConstraint {
    fn apply(&mut self, op: CompareOp, value: Expr) {
        match op {
            CompareOp::Eq => self.eq = Some(value),
            CompareOp::Gt => self.lower = Some((value, false)),
            CompareOp::Ge => self.lower = Some((value, true)),
            CompareOp::Lt => self.upper = Some((value, false)),
            CompareOp::Le => self.upper = Some((value, true)),
            // Inequality does not narrow a scan.
            CompareOp::Ne => {}
        }
    }
}

/// One key segment's scan boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRange {
    pub column: String,
    pub lower: Bound<Expr>,
    pub upper: Bound<Expr>,
}

impl ScanRange {
    pub fn point(column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: column.into(),
            lower: Bound::Included(value.clone()),
            upper: Bound::Included(value),
        }
    }

    pub fn is_point(&self) -> bool {
        matches!((&self.lower, &self.upper), (Bound::Included(a), Bound::Included(b)) if a == b)
    }
}

/// Extracts per-column constraints from a predicate. Only conjunctions of
/// comparisons against runtime constants contribute; disjunctions and other
/// shapes constrain nothing (a full scan is always a safe over-read).
pub fn extract_constraints(predicate: Option<&Expr>) -> HashMap<String, ColumnConstraint> {
    let mut constraints: HashMap<String, ColumnConstraint> = HashMap::new();
    let mut stack = match predicate {
        Some(expr) => vec![expr],
        None => Vec::new(),
    };
    while let Some(expr) = stack.pop() {
        match expr {
            Expr::And(children) => stack.extend(children.iter()),
            Expr::Compare { op, lhs, rhs } => {
                let (column, op, value) = match (lhs.as_ref(), rhs.as_ref()) {
                    (Expr::Column(name), value) if value.is_runtime_constant() => {
                        (name, *op, value)
                    }
                    // `1 < k1` constrains k1 from below: flip the operator.
                    (value, Expr::Column(name)) if value.is_runtime_constant() => {
                        (name, flip(*op), value)
                    }
                    _ => continue,
                };
                constraints
                    .entry(column.clone())
                    .or_default()
                    .apply(op, value.clone());
            }
            _ => {}
        }
    }
    constraints
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Le => CompareOp::Ge,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Ge => CompareOp::Le,
        CompareOp::Eq | CompareOp::Ne => op,
    }
}

/// Walks a key layout left to right, emitting point ranges for every
/// equality-constrained leading segment and at most one trailing range
/// segment. Returns the ranges and the equality-prefix length.
pub fn ranges_for_layout(
    layout: &KeyLayout,
    constraints: &HashMap<String, ColumnConstraint>,
) -> (Vec<ScanRange>, usize) {
    let mut ranges = Vec::new();
    let mut eq_prefix = 0;
    for segment in &layout.segments {
        let constraint = match constraints.get(&segment.column) {
            Some(constraint) => constraint,
            None => break,
        };
        if let Some(value) = &constraint.eq {
            ranges.push(ScanRange::point(&segment.column, value.clone()));
            eq_prefix += 1;
        } else if constraint.lower.is_some() || constraint.upper.is_some() {
            let lower = match &constraint.lower {
                Some((value, true)) => Bound::Included(value.clone()),
                Some((value, false)) => Bound::Excluded(value.clone()),
                None => Bound::Unbounded,
            };
            let upper = match &constraint.upper {
                Some((value, true)) => Bound::Included(value.clone()),
                Some((value, false)) => Bound::Excluded(value.clone()),
                None => Bound::Unbounded,
            };
            ranges.push(ScanRange {
                column: segment.column.clone(),
                lower,
                upper,
            });
            break;
        } else {
            break;
        }
    }
    (ranges, eq_prefix)
}
