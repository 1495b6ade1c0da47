//! Formula encoding.
//!
//! Folds an execution's covered paths into one guarded value (a chain
//! of if-then-else selections in discovery order) and separates out
//! the residual domain the unrolling bound could not reach. The
//! equivalence oracle works on these, never on raw paths.

use crate::infer::Sort;
use crate::solve::bounds;
use crate::sym::{ExecResult, Outcome, SymExpr};

/// One function, encoded for the oracle.
#[derive(Clone, Debug)]
pub struct EncodedFunction {
    pub name: String,
    /// Unified parameter sorts shared by both sides of a comparison.
    pub params: Vec<Sort>,
    /// The returned value as a single expression over the inputs.
    /// Meaningful only where `covered` holds.
    pub body: SymExpr,
    /// Disjunction of the conditions of paths that reached an outcome.
    pub covered: SymExpr,
    /// Disjunction of the conditions of bound-exceeded paths.
    pub residual: SymExpr,
    /// Some feasible path hit the unrolling bound.
    pub unbounded: bool,
    /// The path ceiling dropped states whose conditions are not
    /// provably empty: the encoding has a coverage gap.
    pub partial: bool,
    pub path_count: usize,
    pub covered_count: usize,
}

/// Encode an execution result. Paths fold in discovery order; the
/// last covered path supplies the default arm, which is sound because
/// a full exploration's conditions partition the input space.
pub fn encode(name: &str, params: &[Sort], exec: &ExecResult) -> EncodedFunction {
    let mut covered: Vec<(&SymExpr, SymExpr)> = Vec::new();
    let mut covered_cond = SymExpr::Bool(false);
    let mut residual = SymExpr::Bool(false);

    for path in &exec.paths {
        match &path.outcome {
            Outcome::Returned(v) => {
                covered.push((&path.condition, v.clone()));
                covered_cond = covered_cond.or(path.condition.clone());
            }
            Outcome::ImplicitNone => {
                covered.push((&path.condition, SymExpr::NoneVal));
                covered_cond = covered_cond.or(path.condition.clone());
            }
            Outcome::BoundExceeded => {
                residual = residual.or(path.condition.clone());
            }
        }
    }

    let body = match covered.last() {
        Some((_, last)) => {
            let mut acc = last.clone();
            for (cond, value) in covered[..covered.len() - 1].iter().rev() {
                acc = SymExpr::Ite(
                    Box::new((*cond).clone()),
                    Box::new(value.clone()),
                    Box::new(acc),
                )
                .simplify();
            }
            acc
        }
        None => SymExpr::NoneVal,
    };

    let unbounded = residual != SymExpr::Bool(false);
    let partial = exec.truncated
        && exec
            .dropped
            .iter()
            .any(|cond| !bounds::definitely_unsat(cond));

    EncodedFunction {
        name: name.to_string(),
        params: params.to_vec(),
        body,
        covered: covered_cond,
        residual,
        unbounded,
        partial,
        path_count: exec.paths.len(),
        covered_count: covered.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sym::Path;

    fn input(i: u32, name: &str) -> SymExpr {
        SymExpr::input(i, name, Sort::Int)
    }

    #[test]
    fn test_single_path_body() {
        let exec = ExecResult {
            paths: vec![Path {
                condition: SymExpr::Bool(true),
                outcome: Outcome::Returned(SymExpr::Add(
                    Box::new(input(0, "x")),
                    Box::new(SymExpr::Int(1)),
                )),
            }],
            truncated: false,
            dropped: vec![],
        };
        let enc = encode("f", &[Sort::Int], &exec);
        assert_eq!(enc.body.to_string(), "(x + 1)");
        assert_eq!(enc.covered, SymExpr::Bool(true));
        assert!(!enc.unbounded);
        assert!(!enc.partial);
        assert_eq!(enc.covered_count, 1);
    }

    #[test]
    fn test_two_paths_fold_in_discovery_order() {
        let gt = SymExpr::Gt(Box::new(input(0, "x")), Box::new(SymExpr::Int(0)));
        let exec = ExecResult {
            paths: vec![
                Path {
                    condition: gt.clone(),
                    outcome: Outcome::Returned(SymExpr::Int(1)),
                },
                Path {
                    condition: gt.clone().negate(),
                    outcome: Outcome::Returned(SymExpr::Int(0)),
                },
            ],
            truncated: false,
            dropped: vec![],
        };
        let enc = encode("f", &[Sort::Int], &exec);
        assert_eq!(enc.body.to_string(), "(1 if (x > 0) else 0)");
        assert_eq!(enc.covered, SymExpr::Bool(true));
    }

    #[test]
    fn test_bound_exceeded_goes_to_residual() {
        let big = SymExpr::Ge(Box::new(input(0, "n")), Box::new(SymExpr::Int(11)));
        let exec = ExecResult {
            paths: vec![
                Path {
                    condition: big.clone().negate(),
                    outcome: Outcome::Returned(SymExpr::Int(1)),
                },
                Path {
                    condition: big.clone(),
                    outcome: Outcome::BoundExceeded,
                },
            ],
            truncated: false,
            dropped: vec![],
        };
        let enc = encode("f", &[Sort::Int], &exec);
        assert!(enc.unbounded);
        assert_eq!(enc.residual, big);
        assert_eq!(enc.covered_count, 1);
        assert_eq!(enc.path_count, 2);
    }

    #[test]
    fn test_implicit_none_becomes_none_value() {
        let exec = ExecResult {
            paths: vec![Path {
                condition: SymExpr::Bool(true),
                outcome: Outcome::ImplicitNone,
            }],
            truncated: false,
            dropped: vec![],
        };
        let enc = encode("f", &[Sort::Int], &exec);
        assert_eq!(enc.body, SymExpr::NoneVal);
    }

    #[test]
    fn test_feasible_dropped_state_marks_partial() {
        let exec = ExecResult {
            paths: vec![Path {
                condition: SymExpr::Bool(true),
                outcome: Outcome::Returned(SymExpr::Int(0)),
            }],
            truncated: true,
            dropped: vec![SymExpr::Gt(Box::new(input(0, "x")), Box::new(SymExpr::Int(5)))],
        };
        let enc = encode("f", &[Sort::Int], &exec);
        assert!(enc.partial);
    }

    #[test]
    fn test_infeasible_dropped_state_is_not_partial() {
        let contradiction = SymExpr::Gt(Box::new(input(0, "x")), Box::new(SymExpr::Int(5)))
            .and(SymExpr::Lt(Box::new(input(0, "x")), Box::new(SymExpr::Int(0))));
        let exec = ExecResult {
            paths: vec![Path {
                condition: SymExpr::Bool(true),
                outcome: Outcome::Returned(SymExpr::Int(0)),
            }],
            truncated: true,
            dropped: vec![contradiction],
        };
        let enc = encode("f", &[Sort::Int], &exec);
        assert!(!enc.partial);
    }
}
