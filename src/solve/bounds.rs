//! Interval bounds over path conditions.
//!
//! A condition is a conjunction of comparisons between linear terms
//! in single inputs (loop exits and branch guards all look like
//! `(n + -2) > 0`). Propagating those comparisons into per-input
//! intervals decides many conjunctions outright and pins inputs to
//! single values for substitution.

use std::collections::HashMap;

use crate::sym::SymExpr;

/// A closed integer interval, unbounded on either side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Interval {
    pub lo: Option<i128>,
    pub hi: Option<i128>,
}

impl Interval {
    fn full() -> Self {
        Self { lo: None, hi: None }
    }

    fn empty(&self) -> bool {
        matches!((self.lo, self.hi), (Some(lo), Some(hi)) if lo > hi)
    }

    pub(crate) fn singleton(&self) -> Option<i128> {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }

    fn clamp_lo(&mut self, v: i128) {
        self.lo = Some(self.lo.map_or(v, |lo| lo.max(v)));
    }

    fn clamp_hi(&mut self, v: i128) {
        self.hi = Some(self.hi.map_or(v, |hi| hi.min(v)));
    }

    pub(crate) fn contains(&self, v: i128) -> bool {
        self.lo.map_or(true, |lo| v >= lo) && self.hi.map_or(true, |hi| v <= hi)
    }
}

/// Per-input facts recovered from a conjunction.
#[derive(Clone, Debug, Default)]
pub(crate) struct Facts {
    pub ints: HashMap<u32, Interval>,
    pub bools: HashMap<u32, bool>,
}

impl Facts {
    pub(crate) fn interval(&self, index: u32) -> Interval {
        self.ints.get(&index).copied().unwrap_or(Interval::full())
    }
}

/// `x + k` or just `k`: the linear shapes branch guards take.
struct Lin {
    /// `(index, negated)`; `None` for a constant term.
    var: Option<(u32, bool)>,
    k: i128,
}

fn linearize(e: &SymExpr) -> Option<Lin> {
    match e {
        SymExpr::Int(v) => Some(Lin { var: None, k: *v }),
        SymExpr::Bool(b) => Some(Lin {
            var: None,
            k: *b as i128,
        }),
        SymExpr::Input { index, .. } => Some(Lin {
            var: Some((*index, false)),
            k: 0,
        }),
        SymExpr::Neg(inner) => {
            let lin = linearize(inner)?;
            Some(Lin {
                var: lin.var.map(|(i, neg)| (i, !neg)),
                k: lin.k.checked_neg()?,
            })
        }
        SymExpr::Add(a, b) => {
            let (la, lb) = (linearize(a)?, linearize(b)?);
            match (la.var, lb.var) {
                (v, None) | (None, v) => Some(Lin {
                    var: v,
                    k: la.k.checked_add(lb.k)?,
                }),
                _ => None,
            }
        }
        SymExpr::Sub(a, b) => {
            let (la, lb) = (linearize(a)?, linearize(b)?);
            let k = la.k.checked_sub(lb.k)?;
            match (la.var, lb.var) {
                (v, None) => Some(Lin { var: v, k }),
                (None, Some((i, neg))) => Some(Lin {
                    var: Some((i, !neg)),
                    k,
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Rel {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Rel {
    fn flip(self) -> Rel {
        match self {
            Rel::Eq => Rel::Eq,
            Rel::Ne => Rel::Ne,
            Rel::Lt => Rel::Gt,
            Rel::Le => Rel::Ge,
            Rel::Gt => Rel::Lt,
            Rel::Ge => Rel::Le,
        }
    }

    fn holds(self, a: i128, b: i128) -> bool {
        match self {
            Rel::Eq => a == b,
            Rel::Ne => a != b,
            Rel::Lt => a < b,
            Rel::Le => a <= b,
            Rel::Gt => a > b,
            Rel::Ge => a >= b,
        }
    }
}

/// Collect the conjuncts of an expression.
pub(crate) fn conjuncts(e: &SymExpr) -> Vec<&SymExpr> {
    let mut out = Vec::new();
    let mut stack = vec![e];
    while let Some(e) = stack.pop() {
        match e {
            SymExpr::And(a, b) => {
                stack.push(b);
                stack.push(a);
            }
            _ => out.push(e),
        }
    }
    out
}

/// Propagate a conjunction into per-input facts. `None` means the
/// conjunction is provably unsatisfiable.
pub(crate) fn propagate(atoms: &[&SymExpr]) -> Option<Facts> {
    let mut facts = Facts::default();
    for atom in atoms {
        if !apply_atom(atom, &mut facts) {
            return None;
        }
    }
    if facts.ints.values().any(Interval::empty) {
        return None;
    }
    Some(facts)
}

/// Fold one atom into the facts. `false` means contradiction.
fn apply_atom(atom: &SymExpr, facts: &mut Facts) -> bool {
    let (a, b, rel) = match atom {
        SymExpr::Bool(false) => return false,
        SymExpr::Bool(true) => return true,
        SymExpr::Input { index, .. } => return set_bool(facts, *index, true),
        SymExpr::Not(inner) => {
            if let SymExpr::Input { index, .. } = inner.as_ref() {
                return set_bool(facts, *index, false);
            }
            return true;
        }
        // A disjunction prunes only when every branch does.
        SymExpr::Or(a, b) => return !(definitely_unsat(a) && definitely_unsat(b)),
        SymExpr::Eq(a, b) => (a, b, Rel::Eq),
        SymExpr::Ne(a, b) => (a, b, Rel::Ne),
        SymExpr::Lt(a, b) => (a, b, Rel::Lt),
        SymExpr::Le(a, b) => (a, b, Rel::Le),
        SymExpr::Gt(a, b) => (a, b, Rel::Gt),
        SymExpr::Ge(a, b) => (a, b, Rel::Ge),
        _ => return true,
    };

    let (Some(la), Some(lb)) = (linearize(a), linearize(b)) else {
        return true;
    };

    match (la.var, lb.var) {
        (None, None) => rel.holds(la.k, lb.k),
        // x + j rel k  ==>  x rel (k - j)
        (Some((i, false)), None) => match la.k.checked_sub(lb.k).map(i128::checked_neg) {
            Some(Some(c)) => tighten(facts, i, rel, c),
            _ => true,
        },
        (None, Some((i, false))) => match lb.k.checked_sub(la.k).map(i128::checked_neg) {
            Some(Some(c)) => tighten(facts, i, rel.flip(), c),
            _ => true,
        },
        // Same input on both sides with the same sign: the variable
        // cancels.
        (Some((i, na)), Some((j, nb))) if i == j && na == nb => rel.holds(la.k, lb.k),
        _ => true,
    }
}

fn tighten(facts: &mut Facts, index: u32, rel: Rel, c: i128) -> bool {
    let iv = facts.ints.entry(index).or_insert(Interval::full());
    match rel {
        Rel::Eq => {
            iv.clamp_lo(c);
            iv.clamp_hi(c);
        }
        Rel::Ne => {
            if iv.singleton() == Some(c) {
                return false;
            }
            if iv.lo == Some(c) {
                iv.lo = c.checked_add(1);
            }
            if iv.hi == Some(c) {
                iv.hi = c.checked_sub(1);
            }
        }
        Rel::Lt => match c.checked_sub(1) {
            Some(v) => iv.clamp_hi(v),
            None => return false,
        },
        Rel::Le => iv.clamp_hi(c),
        Rel::Gt => match c.checked_add(1) {
            Some(v) => iv.clamp_lo(v),
            None => return false,
        },
        Rel::Ge => iv.clamp_lo(c),
    }
    !iv.empty()
}

fn set_bool(facts: &mut Facts, index: u32, value: bool) -> bool {
    match facts.bools.insert(index, value) {
        Some(prev) => prev == value,
        None => true,
    }
}

/// Whether the condition has no satisfying assignment, by interval
/// reasoning alone. `false` means "not provably empty".
pub(crate) fn definitely_unsat(cond: &SymExpr) -> bool {
    propagate(&conjuncts(cond)).is_none()
}
