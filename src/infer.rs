//! Sort inference for untyped source functions.
//!
//! The source subset carries no annotations, so every variable's sort
//! is recovered from usage: arithmetic pins a variable to `Int`,
//! boolean literals to `Bool`, `len`/subscripting/iteration over a
//! non-range iterable to `Seq`. Booleans widen to integers when mixed
//! (the source language treats `True` as 1), but a variable used both
//! numerically and as a sequence has no consistent sort and the
//! function is rejected as ambiguous.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{BinOp, Expr, ForIter, FunctionDef, Stmt, UnOp};
use crate::span::{Span, Spanned};

// ─── Sorts ─────────────────────────────────────────────────────────

/// The sort of a value in the logical encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sort {
    /// Unbounded integer. The default for unconstrained parameters.
    Int,
    Bool,
    /// Fixed-width machine integer. Reserved for overflow-sensitive
    /// operations; nothing in the accepted subset produces one today,
    /// but signatures carrying it still compare by width.
    BitVec(u32),
    /// Sequence of unknown element sort. Inferable but not executable:
    /// sequence operations stop the symbolic stage with an
    /// unsupported-construct error.
    Seq,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Int => write!(f, "Int"),
            Sort::Bool => write!(f, "Bool"),
            Sort::BitVec(w) => write!(f, "BitVec({w})"),
            Sort::Seq => write!(f, "Seq"),
        }
    }
}

impl Sort {
    /// Whether two sorts denote comparable values under the numeric
    /// reading of booleans.
    pub fn compatible(self, other: Sort) -> bool {
        match (self, other) {
            (Sort::Int, Sort::Int)
            | (Sort::Bool, Sort::Bool)
            | (Sort::Int, Sort::Bool)
            | (Sort::Bool, Sort::Int)
            | (Sort::Seq, Sort::Seq) => true,
            (Sort::BitVec(a), Sort::BitVec(b)) => a == b,
            _ => false,
        }
    }
}

// ─── Errors ────────────────────────────────────────────────────────

/// A variable was used at two irreconcilable sorts.
#[derive(Clone, Debug)]
pub struct AmbiguousSort {
    pub var: String,
    pub first: Sort,
    pub second: Sort,
    pub span: Span,
}

impl fmt::Display for AmbiguousSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ambiguous sort for '{}': used as {} and as {}",
            self.var, self.first, self.second
        )
    }
}

/// The two functions do not take comparable inputs.
#[derive(Clone, Debug)]
pub struct SignatureMismatch {
    pub reason: String,
}

impl fmt::Display for SignatureMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signature mismatch: {}", self.reason)
    }
}

// ─── Inference Result ──────────────────────────────────────────────

/// Inferred sorts for one function.
#[derive(Clone, Debug)]
pub struct SortMap {
    /// Parameter sorts in positional order. Unconstrained parameters
    /// default to `Int`.
    pub params: Vec<(String, Sort)>,
    pub locals: HashMap<String, Sort>,
}

/// Compare two inferred signatures positionally. On success, returns
/// the unified parameter sorts both executions will use.
pub fn unify_signatures(a: &SortMap, b: &SortMap) -> Result<Vec<Sort>, SignatureMismatch> {
    if a.params.len() != b.params.len() {
        return Err(SignatureMismatch {
            reason: format!(
                "arity differs ({} vs {} parameters)",
                a.params.len(),
                b.params.len()
            ),
        });
    }
    let mut unified = Vec::with_capacity(a.params.len());
    for (i, ((name_a, sort_a), (name_b, sort_b))) in a.params.iter().zip(&b.params).enumerate() {
        if !sort_a.compatible(*sort_b) {
            return Err(SignatureMismatch {
                reason: format!(
                    "parameter {} has sort {} ('{}') on one side and {} ('{}') on the other",
                    i + 1,
                    sort_a,
                    name_a,
                    sort_b,
                    name_b
                ),
            });
        }
        // Bool widens to Int when the sides disagree.
        let sort = match (sort_a, sort_b) {
            (Sort::Bool, Sort::Bool) => Sort::Bool,
            (Sort::Seq, Sort::Seq) => Sort::Seq,
            (Sort::BitVec(w), _) => Sort::BitVec(*w),
            _ => Sort::Int,
        };
        unified.push(sort);
    }
    Ok(unified)
}

// ─── Inferencer ────────────────────────────────────────────────────

/// Infer sorts for every variable in `func` from its usage.
pub fn infer_sorts(func: &FunctionDef) -> Result<SortMap, AmbiguousSort> {
    let mut inf = Inferencer::default();
    for p in &func.params {
        inf.vars.insert(p.name.node.clone(), None);
    }
    inf.walk_body(&func.body)?;

    let params = func
        .params
        .iter()
        .map(|p| {
            let sort = inf
                .vars
                .get(&p.name.node)
                .copied()
                .flatten()
                .unwrap_or(Sort::Int);
            (p.name.node.clone(), sort)
        })
        .collect();
    let locals = inf
        .vars
        .into_iter()
        .filter_map(|(name, sort)| sort.map(|s| (name, s)))
        .collect();
    Ok(SortMap { params, locals })
}

#[derive(Default)]
struct Inferencer {
    /// `None` means the variable is known but unconstrained so far.
    vars: HashMap<String, Option<Sort>>,
}

impl Inferencer {
    fn constrain(&mut self, name: &str, sort: Sort, span: Span) -> Result<(), AmbiguousSort> {
        let slot = self.vars.entry(name.to_string()).or_insert(None);
        match *slot {
            None => {
                *slot = Some(sort);
                Ok(())
            }
            Some(prev) if prev == sort => Ok(()),
            // Numeric booleans: Bool and Int reconcile to Int.
            Some(Sort::Bool) if sort == Sort::Int => {
                *slot = Some(Sort::Int);
                Ok(())
            }
            Some(Sort::Int) if sort == Sort::Bool => Ok(()),
            Some(prev) => Err(AmbiguousSort {
                var: name.to_string(),
                first: prev,
                second: sort,
                span,
            }),
        }
    }

    fn walk_body(&mut self, body: &[Spanned<Stmt>]) -> Result<(), AmbiguousSort> {
        for stmt in body {
            self.walk_stmt(stmt)?;
        }
        Ok(())
    }

    fn walk_stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<(), AmbiguousSort> {
        match &stmt.node {
            Stmt::Assign { target, value } => {
                let sort = self.expr_sort(value)?;
                if let Some(sort) = sort {
                    self.constrain(&target.node, sort, target.span)?;
                } else {
                    self.vars.entry(target.node.clone()).or_insert(None);
                }
            }
            Stmt::AugAssign { target, value, .. } => {
                // Augmented operators are all arithmetic.
                self.expr_sort(value)?;
                self.constrain_numeric(value)?;
                self.constrain(&target.node, Sort::Int, target.span)?;
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr_sort(cond)?;
                self.walk_body(then_body)?;
                if let Some(else_body) = else_body {
                    self.walk_body(else_body)?;
                }
            }
            Stmt::While { cond, body } => {
                self.expr_sort(cond)?;
                self.walk_body(body)?;
            }
            Stmt::For { var, iter, body } => {
                match iter {
                    ForIter::Range { start, end } => {
                        if let Some(start) = start {
                            self.constrain_numeric(start)?;
                            self.expr_sort(start)?;
                        }
                        self.constrain_numeric(end)?;
                        self.expr_sort(end)?;
                        self.constrain(&var.node, Sort::Int, var.span)?;
                    }
                    ForIter::Seq(iterable) => {
                        if let Expr::Var(name) = &iterable.node {
                            self.constrain(name, Sort::Seq, iterable.span)?;
                        }
                        self.expr_sort(iterable)?;
                        self.vars.entry(var.node.clone()).or_insert(None);
                    }
                }
                self.walk_body(body)?;
            }
            Stmt::Return(Some(value)) => {
                self.expr_sort(value)?;
            }
            Stmt::Return(None) | Stmt::Pass => {}
            Stmt::Expr(value) => {
                self.expr_sort(value)?;
            }
        }
        Ok(())
    }

    /// The sort of an expression, constraining variables it touches.
    /// `None` means the sort is not determined by this expression
    /// alone (a bare variable read, or a call result).
    fn expr_sort(&mut self, expr: &Spanned<Expr>) -> Result<Option<Sort>, AmbiguousSort> {
        match &expr.node {
            Expr::Literal(lit) => Ok(match lit {
                crate::ast::Literal::Integer(_) => Some(Sort::Int),
                crate::ast::Literal::Bool(_) => Some(Sort::Bool),
                crate::ast::Literal::None => None,
            }),
            Expr::Var(name) => {
                Ok(self.vars.entry(name.clone()).or_insert(None).as_ref().copied())
            }
            Expr::UnaryOp { op, operand } => {
                let inner = self.expr_sort(operand)?;
                match op {
                    UnOp::Neg => {
                        self.constrain_numeric(operand)?;
                        Ok(Some(Sort::Int))
                    }
                    UnOp::Not => {
                        let _ = inner;
                        Ok(Some(Sort::Bool))
                    }
                }
            }
            Expr::BinOp { op, lhs, rhs } => {
                let ls = self.expr_sort(lhs)?;
                let rs = self.expr_sort(rhs)?;
                if op.is_arith() {
                    self.constrain_numeric(lhs)?;
                    self.constrain_numeric(rhs)?;
                    Ok(Some(Sort::Int))
                } else if op.is_compare() {
                    if matches!(op, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge) {
                        self.constrain_numeric(lhs)?;
                        self.constrain_numeric(rhs)?;
                    }
                    Ok(Some(Sort::Bool))
                } else {
                    // and / or return one of the operands, so a single
                    // sort is only known when both sides share it.
                    Ok(if ls == rs { ls } else { None })
                }
            }
            Expr::Call { func, args } => {
                if func.node == "len" {
                    if let Some(arg) = args.first() {
                        if let Expr::Var(name) = &arg.node {
                            self.constrain(name, Sort::Seq, arg.span)?;
                        }
                        self.expr_sort(arg)?;
                    }
                    return Ok(Some(Sort::Int));
                }
                for arg in args {
                    self.expr_sort(arg)?;
                }
                Ok(None)
            }
            Expr::Subscript { value, index } => {
                if let Expr::Var(name) = &value.node {
                    self.constrain(name, Sort::Seq, value.span)?;
                }
                self.expr_sort(value)?;
                self.constrain_numeric(index)?;
                self.expr_sort(index)?;
                Ok(None)
            }
        }
    }

    /// Bare variables in numeric positions are pinned to `Int`.
    fn constrain_numeric(&mut self, expr: &Spanned<Expr>) -> Result<(), AmbiguousSort> {
        if let Expr::Var(name) = &expr.node {
            self.constrain(name, Sort::Int, expr.span)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(source: &str) -> Result<SortMap, AmbiguousSort> {
        let module = crate::parse_source_silent(source, "test.py").unwrap();
        infer_sorts(&module.primary().node)
    }

    #[test]
    fn test_arithmetic_param_is_int() {
        let sorts = infer("def f(x):\n    return x + 1\n").unwrap();
        assert_eq!(sorts.params, vec![("x".to_string(), Sort::Int)]);
    }

    #[test]
    fn test_unconstrained_param_defaults_to_int() {
        let sorts = infer("def f(x, y):\n    return x\n").unwrap();
        assert_eq!(sorts.params[0].1, Sort::Int);
        assert_eq!(sorts.params[1].1, Sort::Int);
    }

    #[test]
    fn test_bool_assignment() {
        let sorts = infer("def f(x):\n    flag = True\n    return flag\n").unwrap();
        assert_eq!(sorts.locals.get("flag"), Some(&Sort::Bool));
    }

    #[test]
    fn test_bool_widens_to_int() {
        // flag holds a boolean, then takes part in arithmetic.
        let sorts = infer("def f(x):\n    flag = True\n    flag = flag + 1\n    return flag\n")
            .unwrap();
        assert_eq!(sorts.locals.get("flag"), Some(&Sort::Int));
    }

    #[test]
    fn test_len_pins_sequence() {
        let sorts = infer("def f(xs):\n    return len(xs)\n").unwrap();
        assert_eq!(sorts.params[0].1, Sort::Seq);
    }

    #[test]
    fn test_subscript_pins_sequence() {
        let sorts = infer("def f(xs, i):\n    return xs[i]\n").unwrap();
        assert_eq!(sorts.params[0].1, Sort::Seq);
        assert_eq!(sorts.params[1].1, Sort::Int);
    }

    #[test]
    fn test_mixed_use_is_ambiguous() {
        let err = infer("def f(x):\n    y = x + 1\n    return len(x)\n").unwrap_err();
        assert_eq!(err.var, "x");
        assert!(err.to_string().contains("ambiguous sort"));
    }

    #[test]
    fn test_for_range_var_is_int() {
        let sorts = infer("def f(n):\n    t = 0\n    for i in range(n):\n        t += i\n    return t\n")
            .unwrap();
        assert_eq!(sorts.params[0].1, Sort::Int);
        assert_eq!(sorts.locals.get("i"), Some(&Sort::Int));
        assert_eq!(sorts.locals.get("t"), Some(&Sort::Int));
    }

    #[test]
    fn test_signature_arity_mismatch() {
        let a = infer("def f(x):\n    return x + 1\n").unwrap();
        let b = infer("def g(x, y):\n    return x + y\n").unwrap();
        let err = unify_signatures(&a, &b).unwrap_err();
        assert!(err.reason.contains("arity"));
    }

    #[test]
    fn test_signature_sort_mismatch() {
        let a = infer("def f(x):\n    return x + 1\n").unwrap();
        let b = infer("def g(xs):\n    return len(xs)\n").unwrap();
        let err = unify_signatures(&a, &b).unwrap_err();
        assert!(err.reason.contains("sort") || err.reason.contains("Seq"));
    }

    #[test]
    fn test_signature_bool_int_unify() {
        let a = infer("def f(x):\n    return x + 1\n").unwrap();
        let b = infer("def g(b):\n    if b:\n        return 1\n    return 0\n").unwrap();
        let unified = unify_signatures(&a, &b).unwrap();
        assert_eq!(unified, vec![Sort::Int]);
    }

    #[test]
    fn test_sort_display() {
        assert_eq!(Sort::Int.to_string(), "Int");
        assert_eq!(Sort::BitVec(32).to_string(), "BitVec(32)");
    }
}
