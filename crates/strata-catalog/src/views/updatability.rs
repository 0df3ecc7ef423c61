//! Predicate-driven updatability classification.
//!
//! A small interpreter over the boolean expression tree: plain match
//! dispatch on node variants, no trait objects. Classification always
//! succeeds with a verdict: a view whose predicate denies write-through is
//! created read-only, and the write fails later, at write time.

use strata_commons::{CompareOp, Expr, KeyLayout};

/// One primary-key column pinned to a runtime constant by a view predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedColumn {
    /// Position within the parent's key layout.
    pub position: usize,
    pub column: String,
    /// The constant expression the column is pinned to.
    pub value: Expr,
}

/// Verdict of [`classify_predicate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Updatability {
    /// Writes may pass through. Carries the pinned PK prefix in key order so
    /// the write path can fill omitted key columns implicitly.
    Updatable { pinned: Vec<PinnedColumn> },
    ReadOnly,
}

impl Updatability {
    pub fn is_updatable(&self) -> bool {
        matches!(self, Updatability::Updatable { .. })
    }
}

/// Classifies a view predicate against the parent's key layout.
///
/// Updatable iff the tree is a conjunction of equality comparisons, each
/// pinning a parent PK column to a runtime constant (literal, bind
/// parameter, or immutable function of constants), and the pinned columns
/// form a contiguous leading prefix starting at key position 0. Everything
/// else (range operators, disjunction, negation, a volatile call such as
/// current-time arithmetic, a non-key or non-leading column) is read-only.
///
/// A view with no predicate restricts nothing and stays updatable.
pub fn classify_predicate(parent_key: &KeyLayout, predicate: Option<&Expr>) -> Updatability {
    let predicate = match predicate {
        None => {
            return Updatability::Updatable { pinned: Vec::new() };
        }
        Some(expr) => expr,
    };

    let mut conjuncts = Vec::new();
    if !flatten_conjunction(predicate, &mut conjuncts) {
        return Updatability::ReadOnly;
    }

    let mut pinned: Vec<PinnedColumn> = Vec::new();
    for conjunct in conjuncts {
        match pin_from_equality(parent_key, conjunct) {
            Some(pin) => {
                // The same column pinned twice keeps its first binding; the
                // shape is still a pure equality conjunction.
                if !pinned.iter().any(|p| p.position == pin.position) {
                    pinned.push(pin);
                }
            }
            None => return Updatability::ReadOnly,
        }
    }

    pinned.sort_by_key(|p| p.position);
    // Contiguous leading prefix from position 0, at least one column.
    let contiguous = !pinned.is_empty() && pinned.iter().enumerate().all(|(i, p)| p.position == i);
    if contiguous {
        Updatability::Updatable { pinned }
    } else {
        Updatability::ReadOnly
    }
}

/// Collects every `pk column = constant` pin from a predicate without
/// judging overall updatability. The index resolver constant-folds these
/// columns out of a query's coverage requirement even when the view as a
/// whole is read-only. Non-conjunctive subtrees contribute nothing.
pub fn collect_equality_pins(parent_key: &KeyLayout, predicate: Option<&Expr>) -> Vec<PinnedColumn> {
    let mut pinned: Vec<PinnedColumn> = Vec::new();
    let mut stack = match predicate {
        Some(expr) => vec![expr],
        None => return pinned,
    };
    while let Some(expr) = stack.pop() {
        match expr {
            Expr::And(children) => stack.extend(children.iter()),
            Expr::Compare { .. } => {
                if let Some(pin) = pin_from_equality(parent_key, expr) {
                    if !pinned.iter().any(|p| p.position == pin.position) {
                        pinned.push(pin);
                    }
                }
            }
            _ => {}
        }
    }
    pinned.sort_by_key(|p| p.position);
    pinned
}

/// Flattens nested ANDs into `out`. Returns false on any node that is not
/// a conjunction or comparison, which immediately denies updatability.
fn flatten_conjunction<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) -> bool {
    match expr {
        Expr::And(children) => children.iter().all(|c| flatten_conjunction(c, out)),
        Expr::Compare { .. } => {
            out.push(expr);
            true
        }
        _ => false,
    }
}

/// `column = constant` (either operand order) over a parent key column.
fn pin_from_equality(parent_key: &KeyLayout, expr: &Expr) -> Option<PinnedColumn> {
    let (op, lhs, rhs) = match expr {
        Expr::Compare { op, lhs, rhs } => (*op, lhs.as_ref(), rhs.as_ref()),
        _ => return None,
    };
    if op != CompareOp::Eq {
        return None;
    }
    let (column, value) = match (lhs, rhs) {
        (Expr::Column(name), value) if value.is_runtime_constant() => (name, value),
        (value, Expr::Column(name)) if value.is_runtime_constant() => (name, value),
        _ => return None,
    };
    let position = parent_key.position_of(column)?;
    Some(PinnedColumn {
        position,
        column: column.clone(),
        value: value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_commons::{KeySegment, ScalarValue, Volatility};

    fn pk3() -> KeyLayout {
        KeyLayout::new(vec![
            KeySegment::asc("k1"),
            KeySegment::asc("k2"),
            KeySegment::asc("k3"),
        ])
    }

    #[test]
    fn test_no_predicate_is_updatable() {
        assert!(classify_predicate(&pk3(), None).is_updatable());
    }

    #[test]
    fn test_leading_equality_is_updatable() {
        let predicate = Expr::eq("k1", ScalarValue::Int(1));
        match classify_predicate(&pk3(), Some(&predicate)) {
            Updatability::Updatable { pinned } => {
                assert_eq!(pinned.len(), 1);
                assert_eq!(pinned[0].column, "k1");
                assert_eq!(pinned[0].position, 0);
            }
            Updatability::ReadOnly => panic!("expected updatable"),
        }
    }

    #[test]
    fn test_full_prefix_conjunction_is_updatable() {
        let predicate = Expr::and(vec![
            Expr::eq("k2", ScalarValue::Int(2)),
            Expr::eq("k1", ScalarValue::Int(1)),
        ]);
        match classify_predicate(&pk3(), Some(&predicate)) {
            Updatability::Updatable { pinned } => {
                // Ordered by key position regardless of predicate order.
                assert_eq!(pinned[0].column, "k1");
                assert_eq!(pinned[1].column, "k2");
            }
            Updatability::ReadOnly => panic!("expected updatable"),
        }
    }

    #[test]
    fn test_range_is_read_only() {
        let predicate = Expr::compare(CompareOp::Gt, "k1", ScalarValue::Int(1));
        assert!(!classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }

    #[test]
    fn test_gap_in_prefix_is_read_only() {
        // k2 pinned without k1: not a leading prefix.
        let predicate = Expr::eq("k2", ScalarValue::Int(2));
        assert!(!classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }

    #[test]
    fn test_non_key_column_is_read_only() {
        let predicate = Expr::and(vec![
            Expr::eq("k1", ScalarValue::Int(1)),
            Expr::eq("v2", ScalarValue::Int(9)),
        ]);
        assert!(!classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }

    #[test]
    fn test_disjunction_is_read_only() {
        let predicate = Expr::Or(vec![
            Expr::eq("k1", ScalarValue::Int(1)),
            Expr::eq("k1", ScalarValue::Int(2)),
        ]);
        assert!(!classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }

    #[test]
    fn test_bind_param_pin_is_updatable() {
        let predicate = Expr::Compare {
            op: CompareOp::Eq,
            lhs: Box::new(Expr::Column("k1".into())),
            rhs: Box::new(Expr::BindParam(0)),
        };
        assert!(classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }

    #[test]
    fn test_immutable_fn_pin_is_updatable() {
        let predicate = Expr::Compare {
            op: CompareOp::Eq,
            lhs: Box::new(Expr::Column("k1".into())),
            rhs: Box::new(Expr::FnCall {
                name: "TO_NUMBER".into(),
                args: vec![Expr::Literal(ScalarValue::Text("1".into()))],
                volatility: Volatility::Immutable,
            }),
        };
        assert!(classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }

    #[test]
    fn test_volatile_fn_is_read_only_even_with_equality() {
        // k1 = CURRENT_DATE() - 5 is literal-shaped but drifts over time.
        let predicate = Expr::Compare {
            op: CompareOp::Eq,
            lhs: Box::new(Expr::Column("k1".into())),
            rhs: Box::new(Expr::FnCall {
                name: "CURRENT_DATE".into(),
                args: vec![],
                volatility: Volatility::Volatile,
            }),
        };
        assert!(!classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }

    #[test]
    fn test_reversed_operands_still_pin() {
        let predicate = Expr::Compare {
            op: CompareOp::Eq,
            lhs: Box::new(Expr::Literal(ScalarValue::Int(1))),
            rhs: Box::new(Expr::Column("k1".into())),
        };
        assert!(classify_predicate(&pk3(), Some(&predicate)).is_updatable());
    }
}
