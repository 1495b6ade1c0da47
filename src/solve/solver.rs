//! The builtin decision procedure.
//!
//! Bounded execution produces formulas from a narrow fragment: branch
//! guards that are linear in single inputs, if-then-else selections
//! over them, and polynomial return values. The procedure splits the
//! boolean structure into conjunctive cases, then decides each case
//! by polynomial normalization, interval propagation, singleton
//! substitution, and finally a bounded concrete search for a witness.
//! Satisfiable answers always carry a model verified by evaluation;
//! unsatisfiable answers come only from sound pruning.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::infer::Sort;
use crate::solve::bounds::{self, Facts};
use crate::solve::eval::eval_sym;
use crate::solve::{Backend, InputSig, SatOutcome, Value};
use crate::sym::SymExpr;

/// Ceiling on conjunctive cases explored per query. Contradictory
/// cases die at the first split after their guard becomes an atom, so
/// the selection chains of two deeply unrolled functions only keep
/// their mutually consistent combinations alive.
const MAX_SPLITS: usize = 50_000;

/// Ceiling on witness candidates tried per case.
const MAX_COMBOS: usize = 20_000;

/// Interesting integer witnesses, tried alongside interval endpoints.
const SEED_VALUES: [i128; 10] = [0, 1, -1, 2, 5, 10, -2, 3, 7, -10];

pub(crate) struct Builtin;

impl Backend for Builtin {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn check_sat(&self, formula: &SymExpr, inputs: &[InputSig], deadline: Instant) -> SatOutcome {
        let mut ctx = Ctx {
            original: formula,
            inputs,
            deadline,
            splits: 0,
        };
        ctx.solve(vec![formula.clone().simplify()], HashMap::new())
    }
}

struct Ctx<'a> {
    original: &'a SymExpr,
    inputs: &'a [InputSig],
    deadline: Instant,
    splits: usize,
}

impl Ctx<'_> {
    fn timed_out(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Decide a conjunction of goals. `fixed` carries inputs already
    /// pinned by substitution on this case's ancestors.
    fn solve(&mut self, mut goals: Vec<SymExpr>, fixed: HashMap<u32, Value>) -> SatOutcome {
        if self.timed_out() {
            return SatOutcome::Unknown("solver timeout".to_string());
        }
        self.splits += 1;
        if self.splits > MAX_SPLITS {
            return SatOutcome::Unknown("case split budget exhausted".to_string());
        }

        // Feasibility before any further splitting: a guard that
        // contradicts the atoms already collected kills the whole
        // case, including every sibling split it would have spawned.
        let atom_goals: Vec<&SymExpr> = goals.iter().filter(|g| is_atom(g)).collect();
        if bounds::propagate(&atom_goals).is_none() {
            return SatOutcome::Unsat;
        }

        let Some(idx) = goals.iter().position(|g| !is_atom(g)) else {
            return self.leaf(goals, fixed);
        };
        let goal = goals.swap_remove(idx);

        match goal {
            SymExpr::Bool(true) => self.solve(goals, fixed),
            SymExpr::Bool(false) => SatOutcome::Unsat,
            SymExpr::And(a, b) => {
                goals.push(*a);
                goals.push(*b);
                self.solve(goals, fixed)
            }
            SymExpr::Or(a, b) => self.branch(&goals, &fixed, vec![*a], vec![*b]),
            SymExpr::Ite(c, t, e) => {
                // Boolean position: (c and t) or (not c and e).
                let cond = *c;
                self.branch(
                    &goals,
                    &fixed,
                    vec![cond.clone(), *t],
                    vec![cond.negate(), *e],
                )
            }
            SymExpr::Not(inner) => {
                match *inner {
                    // Comparisons were flipped by simplification;
                    // what is left is boolean structure.
                    SymExpr::And(a, b) => {
                        goals.push(SymExpr::Or(
                            Box::new(SymExpr::Not(a)),
                            Box::new(SymExpr::Not(b)),
                        ));
                    }
                    SymExpr::Or(a, b) => {
                        goals.push((*a).negate());
                        goals.push((*b).negate());
                    }
                    SymExpr::Ite(c, t, e) => {
                        goals.push(SymExpr::Ite(
                            c,
                            Box::new(SymExpr::Not(t)),
                            Box::new(SymExpr::Not(e)),
                        ));
                    }
                    SymExpr::Bool(b) => {
                        if b {
                            return SatOutcome::Unsat;
                        }
                    }
                    other => goals.push(SymExpr::Not(Box::new(other)).simplify()),
                }
                self.solve(goals, fixed)
            }
            SymExpr::Eq(a, b) if both_bool(&a, &b) => {
                let (a, b) = (*a, *b);
                self.branch(
                    &goals,
                    &fixed,
                    vec![a.clone(), b.clone()],
                    vec![a.negate(), b.negate()],
                )
            }
            SymExpr::Ne(a, b) if both_bool(&a, &b) => {
                let (a, b) = (*a, *b);
                self.branch(
                    &goals,
                    &fixed,
                    vec![a.clone(), b.clone().negate()],
                    vec![a.negate(), b],
                )
            }
            atom => match replace_first_ite(&atom) {
                // A selection nested inside a comparison: branch on
                // its condition and compare each arm.
                Some((cond, then_atom, else_atom)) => self.branch(
                    &goals,
                    &fixed,
                    vec![cond.clone(), then_atom.simplify()],
                    vec![cond.negate(), else_atom.simplify()],
                ),
                None => {
                    goals.push(atom);
                    self.leaf_or_recurse(goals, fixed)
                }
            },
        }
    }

    /// An atom `is_atom` rejected but that has no rewrite: treat it
    /// as opaque and carry on.
    fn leaf_or_recurse(&mut self, goals: Vec<SymExpr>, fixed: HashMap<u32, Value>) -> SatOutcome {
        if goals.iter().all(is_atom_or_opaque) {
            self.leaf(goals, fixed)
        } else {
            self.solve(goals, fixed)
        }
    }

    fn branch(
        &mut self,
        goals: &[SymExpr],
        fixed: &HashMap<u32, Value>,
        left: Vec<SymExpr>,
        right: Vec<SymExpr>,
    ) -> SatOutcome {
        let mut left_goals = goals.to_vec();
        left_goals.extend(left);
        let mut right_goals = goals.to_vec();
        right_goals.extend(right);

        match self.solve(left_goals, fixed.clone()) {
            SatOutcome::Sat(model) => SatOutcome::Sat(model),
            SatOutcome::Unsat => self.solve(right_goals, fixed.clone()),
            SatOutcome::Unknown(reason) => match self.solve(right_goals, fixed.clone()) {
                SatOutcome::Sat(model) => SatOutcome::Sat(model),
                _ => SatOutcome::Unknown(reason),
            },
        }
    }

    /// Decide a purely conjunctive case.
    fn leaf(&mut self, mut atoms: Vec<SymExpr>, mut fixed: HashMap<u32, Value>) -> SatOutcome {
        let facts = loop {
            if self.timed_out() {
                return SatOutcome::Unknown("solver timeout".to_string());
            }

            // Polynomially identical sides decide equalities outright.
            let mut i = 0;
            while i < atoms.len() {
                match &atoms[i] {
                    SymExpr::Eq(a, b) if poly_equal(a, b) => {
                        atoms.swap_remove(i);
                        continue;
                    }
                    SymExpr::Ne(a, b) if poly_equal(a, b) => return SatOutcome::Unsat,
                    _ => {}
                }
                i += 1;
            }

            let refs: Vec<&SymExpr> = atoms.iter().collect();
            let Some(facts) = bounds::propagate(&refs) else {
                return SatOutcome::Unsat;
            };

            // Pin single-valued inputs and fold them in.
            let mut pinned = Vec::new();
            for (&index, interval) in &facts.ints {
                if fixed.contains_key(&index) {
                    continue;
                }
                if let Some(v) = interval.singleton() {
                    pinned.push((index, Value::Int(v)));
                }
            }
            for (&index, &b) in &facts.bools {
                if !fixed.contains_key(&index) {
                    pinned.push((index, Value::Bool(b)));
                }
            }
            if pinned.is_empty() {
                break facts;
            }
            for (index, value) in pinned {
                let expr = match value {
                    Value::Int(v) => SymExpr::Int(v),
                    Value::Bool(b) => SymExpr::Bool(b),
                    Value::None => SymExpr::NoneVal,
                };
                for atom in &mut atoms {
                    *atom = atom.substitute(index, &expr).simplify();
                }
                fixed.insert(index, value);
            }
            atoms.retain(|a| *a != SymExpr::Bool(true));
            if atoms.iter().any(|a| *a == SymExpr::Bool(false)) {
                return SatOutcome::Unsat;
            }
        };

        if atoms.is_empty() {
            let model = self.default_model(&fixed, &facts);
            if self.verify(&model) {
                return SatOutcome::Sat(model);
            }
        }
        self.search(&atoms, &fixed, &facts)
    }

    /// Bounded concrete search for a witness of the remaining atoms.
    fn search(&mut self, atoms: &[SymExpr], fixed: &HashMap<u32, Value>, facts: &Facts) -> SatOutcome {
        let candidates: Vec<Vec<Value>> = (0..self.inputs.len())
            .map(|i| self.candidates_for(i as u32, fixed, facts))
            .collect();

        let mut combos: usize = 1;
        for c in &candidates {
            combos = combos.saturating_mul(c.len().max(1));
        }
        let exhaustive = combos <= MAX_COMBOS;

        let mut odometer = vec![0usize; candidates.len()];
        let mut tried = 0;
        loop {
            if tried % 64 == 0 && self.timed_out() {
                return SatOutcome::Unknown("solver timeout".to_string());
            }
            let model: Vec<Value> = odometer
                .iter()
                .zip(&candidates)
                .map(|(&i, c)| c[i])
                .collect();
            let holds = atoms.iter().all(|a| {
                matches!(eval_sym(a, &model), Some(v) if v.truthy())
            });
            if holds && self.verify(&model) {
                return SatOutcome::Sat(model);
            }

            tried += 1;
            if tried >= MAX_COMBOS {
                break;
            }
            // Advance the odometer.
            let mut pos = 0;
            loop {
                if pos == odometer.len() {
                    // Wrapped around: every combination tried.
                    return if exhaustive && all_bool_or_pinned(self.inputs, fixed) {
                        SatOutcome::Unsat
                    } else {
                        SatOutcome::Unknown(
                            "bounded search found no witness".to_string(),
                        )
                    };
                }
                odometer[pos] += 1;
                if odometer[pos] < candidates[pos].len() {
                    break;
                }
                odometer[pos] = 0;
                pos += 1;
            }
        }
        SatOutcome::Unknown("bounded search found no witness".to_string())
    }

    fn candidates_for(&self, index: u32, fixed: &HashMap<u32, Value>, facts: &Facts) -> Vec<Value> {
        if let Some(v) = fixed.get(&index) {
            return vec![*v];
        }
        let sig = &self.inputs[index as usize];
        if sig.sort == Sort::Bool {
            return match facts.bools.get(&index) {
                Some(&b) => vec![Value::Bool(b)],
                None => vec![Value::Bool(false), Value::Bool(true)],
            };
        }
        let interval = facts.interval(index);
        let mut values: Vec<i128> = SEED_VALUES.to_vec();
        for bound in [interval.lo, interval.hi] {
            if let Some(v) = bound {
                values.push(v);
                values.push(v.saturating_add(1));
                values.push(v.saturating_sub(1));
            }
        }
        values.retain(|v| interval.contains(*v));
        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            values.push(interval.lo.or(interval.hi).unwrap_or(0));
        }
        values.into_iter().map(Value::Int).collect()
    }

    fn default_model(&self, fixed: &HashMap<u32, Value>, facts: &Facts) -> Vec<Value> {
        (0..self.inputs.len())
            .map(|i| {
                let index = i as u32;
                if let Some(v) = fixed.get(&index) {
                    return *v;
                }
                match self.inputs[i].sort {
                    Sort::Bool => Value::Bool(facts.bools.get(&index).copied().unwrap_or(false)),
                    _ => {
                        let interval = facts.interval(index);
                        let v = if interval.contains(0) {
                            0
                        } else {
                            interval.lo.or(interval.hi).unwrap_or(0)
                        };
                        Value::Int(v)
                    }
                }
            })
            .collect()
    }

    /// A model counts only if the original formula evaluates to true
    /// under it.
    fn verify(&self, model: &[Value]) -> bool {
        matches!(eval_sym(self.original, model), Some(v) if v.truthy())
    }
}

/// Whether the whole candidate space was enumerable, making a failed
/// exhaustive search a proof of unsatisfiability.
fn all_bool_or_pinned(inputs: &[InputSig], fixed: &HashMap<u32, Value>) -> bool {
    inputs
        .iter()
        .enumerate()
        .all(|(i, sig)| sig.sort == Sort::Bool || fixed.contains_key(&(i as u32)))
}

fn both_bool(a: &SymExpr, b: &SymExpr) -> bool {
    a.sort() == Some(Sort::Bool) && b.sort() == Some(Sort::Bool)
}

fn contains_ite(e: &SymExpr) -> bool {
    replace_first_ite(e).is_some()
}

fn is_atom(e: &SymExpr) -> bool {
    match e {
        SymExpr::And(..) | SymExpr::Or(..) | SymExpr::Ite(..) | SymExpr::Bool(_) => false,
        SymExpr::Not(inner) => matches!(inner.as_ref(), SymExpr::Input { .. }),
        SymExpr::Eq(a, b) | SymExpr::Ne(a, b) => !both_bool(a, b) && !contains_ite(e),
        SymExpr::Lt(..) | SymExpr::Le(..) | SymExpr::Gt(..) | SymExpr::Ge(..) => !contains_ite(e),
        _ => true,
    }
}

fn is_atom_or_opaque(e: &SymExpr) -> bool {
    is_atom(e) || replace_first_ite(e).is_none()
}

/// Replace the first (leftmost, outermost) selection inside `e` with
/// its arms: returns the condition and the two rebuilt expressions.
fn replace_first_ite(e: &SymExpr) -> Option<(SymExpr, SymExpr, SymExpr)> {
    match e {
        SymExpr::Ite(c, t, el) => {
            Some(((**c).clone(), (**t).clone(), (**el).clone()))
        }
        SymExpr::Int(_)
        | SymExpr::Bool(_)
        | SymExpr::NoneVal
        | SymExpr::Input { .. } => None,
        SymExpr::Neg(inner) => replace_first_ite(inner).map(|(c, t, el)| {
            (
                c,
                SymExpr::Neg(Box::new(t)),
                SymExpr::Neg(Box::new(el)),
            )
        }),
        SymExpr::Not(inner) => replace_first_ite(inner).map(|(c, t, el)| {
            (
                c,
                SymExpr::Not(Box::new(t)),
                SymExpr::Not(Box::new(el)),
            )
        }),
        SymExpr::Add(a, b) => lift_binary(a, b, |x, y| SymExpr::Add(x, y)),
        SymExpr::Sub(a, b) => lift_binary(a, b, |x, y| SymExpr::Sub(x, y)),
        SymExpr::Mul(a, b) => lift_binary(a, b, |x, y| SymExpr::Mul(x, y)),
        SymExpr::FloorDiv(a, b) => lift_binary(a, b, |x, y| SymExpr::FloorDiv(x, y)),
        SymExpr::Mod(a, b) => lift_binary(a, b, |x, y| SymExpr::Mod(x, y)),
        SymExpr::Eq(a, b) => lift_binary(a, b, |x, y| SymExpr::Eq(x, y)),
        SymExpr::Ne(a, b) => lift_binary(a, b, |x, y| SymExpr::Ne(x, y)),
        SymExpr::Lt(a, b) => lift_binary(a, b, |x, y| SymExpr::Lt(x, y)),
        SymExpr::Le(a, b) => lift_binary(a, b, |x, y| SymExpr::Le(x, y)),
        SymExpr::Gt(a, b) => lift_binary(a, b, |x, y| SymExpr::Gt(x, y)),
        SymExpr::Ge(a, b) => lift_binary(a, b, |x, y| SymExpr::Ge(x, y)),
        SymExpr::And(a, b) => lift_binary(a, b, |x, y| SymExpr::And(x, y)),
        SymExpr::Or(a, b) => lift_binary(a, b, |x, y| SymExpr::Or(x, y)),
    }
}

fn lift_binary(
    a: &SymExpr,
    b: &SymExpr,
    rebuild: impl Fn(Box<SymExpr>, Box<SymExpr>) -> SymExpr,
) -> Option<(SymExpr, SymExpr, SymExpr)> {
    if let Some((c, t, el)) = replace_first_ite(a) {
        return Some((
            c,
            rebuild(Box::new(t), Box::new(b.clone())),
            rebuild(Box::new(el), Box::new(b.clone())),
        ));
    }
    if let Some((c, t, el)) = replace_first_ite(b) {
        return Some((
            c,
            rebuild(Box::new(a.clone()), Box::new(t)),
            rebuild(Box::new(a.clone()), Box::new(el)),
        ));
    }
    None
}

// ─── Polynomial Normalization ──────────────────────────────────────

/// Multivariate polynomial: sorted monomial (input indices with
/// multiplicity) to coefficient.
type Poly = BTreeMap<Vec<u32>, i128>;

/// Whether both sides normalize to the same polynomial, which proves
/// them equal on every input.
fn poly_equal(a: &SymExpr, b: &SymExpr) -> bool {
    matches!((poly(a), poly(b)), (Some(pa), Some(pb)) if pa == pb)
}

fn poly(e: &SymExpr) -> Option<Poly> {
    match e {
        SymExpr::Int(v) => Some(poly_const(*v)),
        SymExpr::Input { index, sort, .. } => {
            if *sort == Sort::Seq {
                return None;
            }
            let mut p = Poly::new();
            p.insert(vec![*index], 1);
            Some(p)
        }
        SymExpr::Neg(inner) => poly_scale(&poly(inner)?, -1),
        SymExpr::Add(a, b) => poly_add(&poly(a)?, &poly(b)?, 1),
        SymExpr::Sub(a, b) => poly_add(&poly(a)?, &poly(b)?, -1),
        SymExpr::Mul(a, b) => poly_mul(&poly(a)?, &poly(b)?),
        _ => None,
    }
}

fn poly_const(v: i128) -> Poly {
    let mut p = Poly::new();
    if v != 0 {
        p.insert(Vec::new(), v);
    }
    p
}

fn poly_scale(p: &Poly, factor: i128) -> Option<Poly> {
    let mut out = Poly::new();
    for (mono, coeff) in p {
        out.insert(mono.clone(), coeff.checked_mul(factor)?);
    }
    Some(out)
}

fn poly_add(a: &Poly, b: &Poly, sign: i128) -> Option<Poly> {
    let mut out = a.clone();
    for (mono, coeff) in b {
        let entry = out.entry(mono.clone()).or_insert(0);
        *entry = entry.checked_add(coeff.checked_mul(sign)?)?;
        if *entry == 0 {
            out.remove(mono);
        }
    }
    Some(out)
}

fn poly_mul(a: &Poly, b: &Poly) -> Option<Poly> {
    // Degree explosion guard; deeply unrolled products stay modest.
    if a.len().saturating_mul(b.len()) > 4096 {
        return None;
    }
    let mut out = Poly::new();
    for (ma, ca) in a {
        for (mb, cb) in b {
            let mut mono = ma.clone();
            mono.extend(mb.iter().copied());
            mono.sort_unstable();
            let entry = out.entry(mono.clone()).or_insert(0);
            *entry = entry.checked_add(ca.checked_mul(*cb)?)?;
            if *entry == 0 {
                out.remove(&mono);
            }
        }
    }
    Some(out)
}
