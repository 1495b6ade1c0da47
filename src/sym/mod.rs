//! Symbolic values and execution paths.
//!
//! The executor runs a function on symbolic inputs and produces one
//! `Path` per feasible way through the body: a condition over the
//! inputs plus what the function does when the condition holds. Loop
//! and recursion unrolling is bounded, so a path may also end in
//! `BoundExceeded` — behavior the chosen bound could not reach, kept
//! as a first-class outcome rather than an error.

pub mod executor;


use std::fmt;

use crate::infer::Sort;

// ─── Symbolic Expressions ──────────────────────────────────────────

/// An expression over the function's inputs. Substitution-based
/// execution keeps these closed under the input variables: locals
/// never appear, only `Input` leaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymExpr {
    Int(i128),
    Bool(bool),
    /// The `None` value. Compares equal only to itself.
    NoneVal,
    Input {
        index: u32,
        name: String,
        sort: Sort,
    },
    Neg(Box<SymExpr>),
    Not(Box<SymExpr>),
    Add(Box<SymExpr>, Box<SymExpr>),
    Sub(Box<SymExpr>, Box<SymExpr>),
    Mul(Box<SymExpr>, Box<SymExpr>),
    /// Floor division (rounds toward negative infinity).
    FloorDiv(Box<SymExpr>, Box<SymExpr>),
    /// Floor modulo (result takes the sign of the divisor).
    Mod(Box<SymExpr>, Box<SymExpr>),
    Eq(Box<SymExpr>, Box<SymExpr>),
    Ne(Box<SymExpr>, Box<SymExpr>),
    Lt(Box<SymExpr>, Box<SymExpr>),
    Le(Box<SymExpr>, Box<SymExpr>),
    Gt(Box<SymExpr>, Box<SymExpr>),
    Ge(Box<SymExpr>, Box<SymExpr>),
    And(Box<SymExpr>, Box<SymExpr>),
    Or(Box<SymExpr>, Box<SymExpr>),
    /// `then` if `cond` holds, else `other`.
    Ite(Box<SymExpr>, Box<SymExpr>, Box<SymExpr>),
}

/// Floor division, the source language's `//`. `None` on division by
/// zero or overflow.
pub(crate) fn div_floor(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Floor modulo, the source language's `%`.
pub(crate) fn mod_floor(a: i128, b: i128) -> Option<i128> {
    let q = div_floor(a, b)?;
    a.checked_sub(b.checked_mul(q)?)
}

impl SymExpr {
    pub fn input(index: u32, name: &str, sort: Sort) -> SymExpr {
        SymExpr::Input {
            index,
            name: name.to_string(),
            sort,
        }
    }

    /// The sort of this expression. `None` for the `None` value.
    pub fn sort(&self) -> Option<Sort> {
        match self {
            SymExpr::Int(_) => Some(Sort::Int),
            SymExpr::Bool(_) => Some(Sort::Bool),
            SymExpr::NoneVal => None,
            SymExpr::Input { sort, .. } => Some(*sort),
            SymExpr::Neg(_)
            | SymExpr::Add(..)
            | SymExpr::Sub(..)
            | SymExpr::Mul(..)
            | SymExpr::FloorDiv(..)
            | SymExpr::Mod(..) => Some(Sort::Int),
            SymExpr::Not(_)
            | SymExpr::Eq(..)
            | SymExpr::Ne(..)
            | SymExpr::Lt(..)
            | SymExpr::Le(..)
            | SymExpr::Gt(..)
            | SymExpr::Ge(..)
            | SymExpr::And(..)
            | SymExpr::Or(..) => Some(Sort::Bool),
            SymExpr::Ite(_, t, e) => t.sort().or_else(|| e.sort()),
        }
    }

    /// Truth value of this expression as a condition. Integers are
    /// true when nonzero, `None` is false.
    pub fn truthy(self) -> SymExpr {
        match self.sort() {
            Some(Sort::Bool) => self,
            None => SymExpr::Bool(false),
            _ => SymExpr::Ne(Box::new(self), Box::new(SymExpr::Int(0))).simplify(),
        }
    }

    /// The numeric reading of this expression (`True` is 1).
    pub fn as_int(self) -> SymExpr {
        match self.sort() {
            Some(Sort::Bool) => match self {
                SymExpr::Bool(b) => SymExpr::Int(b as i128),
                cond => SymExpr::Ite(
                    Box::new(cond),
                    Box::new(SymExpr::Int(1)),
                    Box::new(SymExpr::Int(0)),
                ),
            },
            _ => self,
        }
    }

    pub fn and(self, other: SymExpr) -> SymExpr {
        SymExpr::And(Box::new(self), Box::new(other)).simplify()
    }

    pub fn or(self, other: SymExpr) -> SymExpr {
        SymExpr::Or(Box::new(self), Box::new(other)).simplify()
    }

    pub fn negate(self) -> SymExpr {
        SymExpr::Not(Box::new(self)).simplify()
    }

    /// Replace every occurrence of input `index` with `value`.
    pub fn substitute(&self, index: u32, value: &SymExpr) -> SymExpr {
        let sub = |e: &SymExpr| Box::new(e.substitute(index, value));
        match self {
            SymExpr::Input { index: i, .. } if *i == index => value.clone(),
            SymExpr::Int(_) | SymExpr::Bool(_) | SymExpr::NoneVal | SymExpr::Input { .. } => {
                self.clone()
            }
            SymExpr::Neg(e) => SymExpr::Neg(sub(e)),
            SymExpr::Not(e) => SymExpr::Not(sub(e)),
            SymExpr::Add(a, b) => SymExpr::Add(sub(a), sub(b)),
            SymExpr::Sub(a, b) => SymExpr::Sub(sub(a), sub(b)),
            SymExpr::Mul(a, b) => SymExpr::Mul(sub(a), sub(b)),
            SymExpr::FloorDiv(a, b) => SymExpr::FloorDiv(sub(a), sub(b)),
            SymExpr::Mod(a, b) => SymExpr::Mod(sub(a), sub(b)),
            SymExpr::Eq(a, b) => SymExpr::Eq(sub(a), sub(b)),
            SymExpr::Ne(a, b) => SymExpr::Ne(sub(a), sub(b)),
            SymExpr::Lt(a, b) => SymExpr::Lt(sub(a), sub(b)),
            SymExpr::Le(a, b) => SymExpr::Le(sub(a), sub(b)),
            SymExpr::Gt(a, b) => SymExpr::Gt(sub(a), sub(b)),
            SymExpr::Ge(a, b) => SymExpr::Ge(sub(a), sub(b)),
            SymExpr::And(a, b) => SymExpr::And(sub(a), sub(b)),
            SymExpr::Or(a, b) => SymExpr::Or(sub(a), sub(b)),
            SymExpr::Ite(c, t, e) => SymExpr::Ite(sub(c), sub(t), sub(e)),
        }
    }

    /// Constant-fold and normalize. Constants migrate to the right of
    /// `Add` and `Mul`, subtraction of a constant becomes addition,
    /// and chained constant offsets collapse, so loop-updated values
    /// like `((n - 1) - 1)` settle into `(n + -2)`.
    pub fn simplify(self) -> SymExpr {
        match self {
            SymExpr::Int(_)
            | SymExpr::Bool(_)
            | SymExpr::NoneVal
            | SymExpr::Input { .. } => self,

            SymExpr::Neg(e) => match e.simplify() {
                SymExpr::Int(v) => match v.checked_neg() {
                    Some(n) => SymExpr::Int(n),
                    None => SymExpr::Neg(Box::new(SymExpr::Int(v))),
                },
                SymExpr::Neg(inner) => *inner,
                e => SymExpr::Neg(Box::new(e)),
            },

            SymExpr::Not(e) => match e.simplify() {
                SymExpr::Bool(b) => SymExpr::Bool(!b),
                SymExpr::Not(inner) => *inner,
                SymExpr::Eq(a, b) => SymExpr::Ne(a, b),
                SymExpr::Ne(a, b) => SymExpr::Eq(a, b),
                SymExpr::Lt(a, b) => SymExpr::Ge(a, b),
                SymExpr::Le(a, b) => SymExpr::Gt(a, b),
                SymExpr::Gt(a, b) => SymExpr::Le(a, b),
                SymExpr::Ge(a, b) => SymExpr::Lt(a, b),
                e => SymExpr::Not(Box::new(e)),
            },

            SymExpr::Add(a, b) => Self::fold_add(a.simplify(), b.simplify()),
            SymExpr::Sub(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match b {
                    // a - k  ==>  a + (-k)
                    SymExpr::Int(k) => match k.checked_neg() {
                        Some(nk) => Self::fold_add(a, SymExpr::Int(nk)),
                        None => SymExpr::Sub(Box::new(a), Box::new(SymExpr::Int(k))),
                    },
                    b if a == b => SymExpr::Int(0),
                    b => SymExpr::Sub(Box::new(a), Box::new(b)),
                }
            }
            SymExpr::Mul(a, b) => Self::fold_mul(a.simplify(), b.simplify()),

            SymExpr::FloorDiv(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (&a, &b) {
                    (SymExpr::Int(x), SymExpr::Int(y)) => match div_floor(*x, *y) {
                        Some(v) => SymExpr::Int(v),
                        None => SymExpr::FloorDiv(Box::new(a), Box::new(b)),
                    },
                    (_, SymExpr::Int(1)) => a,
                    _ => SymExpr::FloorDiv(Box::new(a), Box::new(b)),
                }
            }
            SymExpr::Mod(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (&a, &b) {
                    (SymExpr::Int(x), SymExpr::Int(y)) => match mod_floor(*x, *y) {
                        Some(v) => SymExpr::Int(v),
                        None => SymExpr::Mod(Box::new(a), Box::new(b)),
                    },
                    (_, SymExpr::Int(1)) => SymExpr::Int(0),
                    _ => SymExpr::Mod(Box::new(a), Box::new(b)),
                }
            }

            SymExpr::Eq(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), CmpOp::Eq),
            SymExpr::Ne(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), CmpOp::Ne),
            SymExpr::Lt(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), CmpOp::Lt),
            SymExpr::Le(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), CmpOp::Le),
            SymExpr::Gt(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), CmpOp::Gt),
            SymExpr::Ge(a, b) => Self::fold_cmp(a.simplify(), b.simplify(), CmpOp::Ge),

            SymExpr::And(a, b) => match (a.simplify(), b.simplify()) {
                (SymExpr::Bool(false), _) | (_, SymExpr::Bool(false)) => SymExpr::Bool(false),
                (SymExpr::Bool(true), b) => b,
                (a, SymExpr::Bool(true)) => a,
                (a, b) if a == b => a,
                (a, b) if complements(&a, &b) => SymExpr::Bool(false),
                (a, b) => SymExpr::And(Box::new(a), Box::new(b)),
            },
            SymExpr::Or(a, b) => match (a.simplify(), b.simplify()) {
                (SymExpr::Bool(true), _) | (_, SymExpr::Bool(true)) => SymExpr::Bool(true),
                (SymExpr::Bool(false), b) => b,
                (a, SymExpr::Bool(false)) => a,
                (a, b) if a == b => a,
                (a, b) if complements(&a, &b) => SymExpr::Bool(true),
                (a, b) => SymExpr::Or(Box::new(a), Box::new(b)),
            },

            SymExpr::Ite(c, t, e) => match (c.simplify(), t.simplify(), e.simplify()) {
                (SymExpr::Bool(true), t, _) => t,
                (SymExpr::Bool(false), _, e) => e,
                (_, t, e) if t == e => t,
                (c, SymExpr::Bool(true), SymExpr::Bool(false)) => c,
                (c, SymExpr::Bool(false), SymExpr::Bool(true)) => c.negate(),
                (c, t, e) => SymExpr::Ite(Box::new(c), Box::new(t), Box::new(e)),
            },
        }
    }

    fn fold_add(a: SymExpr, b: SymExpr) -> SymExpr {
        match (a, b) {
            (SymExpr::Int(x), SymExpr::Int(y)) => match x.checked_add(y) {
                Some(v) => SymExpr::Int(v),
                None => SymExpr::Add(Box::new(SymExpr::Int(x)), Box::new(SymExpr::Int(y))),
            },
            (a, SymExpr::Int(0)) => a,
            (SymExpr::Int(0), b) => b,
            // Constants go right.
            (SymExpr::Int(k), b) => Self::fold_add(b, SymExpr::Int(k)),
            // (e + j) + k  ==>  e + (j + k)
            (SymExpr::Add(e, j), SymExpr::Int(k)) => {
                if let SymExpr::Int(j) = *j {
                    match j.checked_add(k) {
                        Some(v) => Self::fold_add(*e, SymExpr::Int(v)),
                        None => SymExpr::Add(
                            Box::new(SymExpr::Add(e, Box::new(SymExpr::Int(j)))),
                            Box::new(SymExpr::Int(k)),
                        ),
                    }
                } else {
                    SymExpr::Add(Box::new(SymExpr::Add(e, j)), Box::new(SymExpr::Int(k)))
                }
            }
            (a, b) => SymExpr::Add(Box::new(a), Box::new(b)),
        }
    }

    fn fold_mul(a: SymExpr, b: SymExpr) -> SymExpr {
        match (a, b) {
            (SymExpr::Int(x), SymExpr::Int(y)) => match x.checked_mul(y) {
                Some(v) => SymExpr::Int(v),
                None => SymExpr::Mul(Box::new(SymExpr::Int(x)), Box::new(SymExpr::Int(y))),
            },
            (_, SymExpr::Int(0)) | (SymExpr::Int(0), _) => SymExpr::Int(0),
            (a, SymExpr::Int(1)) => a,
            (SymExpr::Int(1), b) => b,
            (SymExpr::Int(k), b) => Self::fold_mul(b, SymExpr::Int(k)),
            (SymExpr::Mul(e, j), SymExpr::Int(k)) => {
                if let SymExpr::Int(j) = *j {
                    match j.checked_mul(k) {
                        Some(v) => Self::fold_mul(*e, SymExpr::Int(v)),
                        None => SymExpr::Mul(
                            Box::new(SymExpr::Mul(e, Box::new(SymExpr::Int(j)))),
                            Box::new(SymExpr::Int(k)),
                        ),
                    }
                } else {
                    SymExpr::Mul(Box::new(SymExpr::Mul(e, j)), Box::new(SymExpr::Int(k)))
                }
            }
            (a, b) => SymExpr::Mul(Box::new(a), Box::new(b)),
        }
    }

    fn fold_cmp(a: SymExpr, b: SymExpr, op: CmpOp) -> SymExpr {
        // Numeric reading of boolean constants in mixed comparisons.
        let lift = |e: &SymExpr| -> Option<i128> {
            match e {
                SymExpr::Int(v) => Some(*v),
                SymExpr::Bool(b) => Some(*b as i128),
                _ => None,
            }
        };
        if let (Some(x), Some(y)) = (lift(&a), lift(&b)) {
            return SymExpr::Bool(match op {
                CmpOp::Eq => x == y,
                CmpOp::Ne => x != y,
                CmpOp::Lt => x < y,
                CmpOp::Le => x <= y,
                CmpOp::Gt => x > y,
                CmpOp::Ge => x >= y,
            });
        }
        // None compares equal only to itself.
        if matches!(a, SymExpr::NoneVal) || matches!(b, SymExpr::NoneVal) {
            let both_none = a == b;
            match op {
                CmpOp::Eq => return SymExpr::Bool(both_none),
                CmpOp::Ne => return SymExpr::Bool(!both_none),
                _ => {}
            }
        }
        if a == b {
            return SymExpr::Bool(matches!(op, CmpOp::Eq | CmpOp::Le | CmpOp::Ge));
        }
        let (a, b) = (Box::new(a), Box::new(b));
        match op {
            CmpOp::Eq => SymExpr::Eq(a, b),
            CmpOp::Ne => SymExpr::Ne(a, b),
            CmpOp::Lt => SymExpr::Lt(a, b),
            CmpOp::Le => SymExpr::Le(a, b),
            CmpOp::Gt => SymExpr::Gt(a, b),
            CmpOp::Ge => SymExpr::Ge(a, b),
        }
    }
}

/// Whether two conditions are exact negations of one another, so a
/// branch and its fallthrough recombine to the full domain.
fn complements(a: &SymExpr, b: &SymExpr) -> bool {
    match (a, b) {
        (SymExpr::Not(inner), other) | (other, SymExpr::Not(inner)) => inner.as_ref() == other,
        (SymExpr::Eq(p, q), SymExpr::Ne(r, s))
        | (SymExpr::Ne(p, q), SymExpr::Eq(r, s))
        | (SymExpr::Lt(p, q), SymExpr::Ge(r, s))
        | (SymExpr::Ge(p, q), SymExpr::Lt(r, s))
        | (SymExpr::Le(p, q), SymExpr::Gt(r, s))
        | (SymExpr::Gt(p, q), SymExpr::Le(r, s)) => p == r && q == s,
        _ => false,
    }
}

#[derive(Clone, Copy)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Int(v) => write!(f, "{v}"),
            SymExpr::Bool(true) => write!(f, "True"),
            SymExpr::Bool(false) => write!(f, "False"),
            SymExpr::NoneVal => write!(f, "None"),
            SymExpr::Input { name, .. } => write!(f, "{name}"),
            SymExpr::Neg(e) => write!(f, "-{e}"),
            SymExpr::Not(e) => write!(f, "not {e}"),
            SymExpr::Add(a, b) => write!(f, "({a} + {b})"),
            SymExpr::Sub(a, b) => write!(f, "({a} - {b})"),
            SymExpr::Mul(a, b) => write!(f, "({a} * {b})"),
            SymExpr::FloorDiv(a, b) => write!(f, "({a} // {b})"),
            SymExpr::Mod(a, b) => write!(f, "({a} % {b})"),
            SymExpr::Eq(a, b) => write!(f, "({a} == {b})"),
            SymExpr::Ne(a, b) => write!(f, "({a} != {b})"),
            SymExpr::Lt(a, b) => write!(f, "({a} < {b})"),
            SymExpr::Le(a, b) => write!(f, "({a} <= {b})"),
            SymExpr::Gt(a, b) => write!(f, "({a} > {b})"),
            SymExpr::Ge(a, b) => write!(f, "({a} >= {b})"),
            SymExpr::And(a, b) => write!(f, "({a} and {b})"),
            SymExpr::Or(a, b) => write!(f, "({a} or {b})"),
            SymExpr::Ite(c, t, e) => write!(f, "({t} if {c} else {e})"),
        }
    }
}

// ─── Paths ─────────────────────────────────────────────────────────

/// What a function does at the end of one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Returned(SymExpr),
    /// Fell off the end of the body without an explicit return.
    ImplicitNone,
    /// The unrolling bound stopped exploration before an outcome.
    BoundExceeded,
}

/// One feasible way through a function: a condition over the inputs
/// and the outcome when it holds. Conditions of a full exploration
/// partition the input space.
#[derive(Clone, Debug)]
pub struct Path {
    pub condition: SymExpr,
    pub outcome: Outcome,
}

/// All paths discovered for one function, in discovery order.
#[derive(Clone, Debug)]
pub struct ExecResult {
    pub paths: Vec<Path>,
    /// Exploration hit the path ceiling and dropped pending states.
    pub truncated: bool,
    /// Conditions of the dropped states, for coverage-gap reporting.
    pub dropped: Vec<SymExpr>,
}

impl ExecResult {
    /// Number of paths that reached a real outcome.
    pub fn covered_count(&self) -> usize {
        self.paths
            .iter()
            .filter(|p| !matches!(p.outcome, Outcome::BoundExceeded))
            .count()
    }

    pub fn bounded_count(&self) -> usize {
        self.paths.len() - self.covered_count()
    }
}
