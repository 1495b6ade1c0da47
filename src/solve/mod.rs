//! The equivalence oracle.
//!
//! Given two encoded functions over a shared input signature, decide
//! whether they agree everywhere. The verdict is three-valued:
//! equivalence and inequivalence are only ever claimed with proof
//! (an unsatisfiability argument or a confirmed counterexample);
//! everything else is `Unknown` with a reason a user can act on.
//!
//! Two solver backends exist: a builtin decision procedure that
//! handles the guard-and-polynomial fragment bounded execution
//! actually produces, and an external SMT process (`z3` or `cvc5`)
//! spoken to over SMT-LIB 2.

pub(crate) mod bounds;
pub mod eval;
pub mod smt;
pub mod solver;

#[cfg(test)]
mod tests;

use std::fmt;
use std::time::{Duration, Instant};

use crate::ast::Module;
use crate::encode::EncodedFunction;
use crate::infer::Sort;
use crate::sym::SymExpr;

// ─── Values ────────────────────────────────────────────────────────

/// A concrete source-language value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i128),
    Bool(bool),
    None,
}

impl Value {
    /// Numeric reading (`True` is 1). `None` has none.
    pub fn as_int(self) -> Result<i128, eval::EvalError> {
        match self {
            Value::Int(v) => Ok(v),
            Value::Bool(b) => Ok(b as i128),
            Value::None => Err(eval::EvalError::Unsupported),
        }
    }

    pub fn truthy(self) -> bool {
        match self {
            Value::Int(v) => v != 0,
            Value::Bool(b) => b,
            Value::None => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::None => write!(f, "None"),
        }
    }
}

// ─── Verdict ───────────────────────────────────────────────────────

/// A confirmed input on which the two functions disagree.
#[derive(Clone, Debug)]
pub struct Counterexample {
    pub inputs: Vec<(String, Value)>,
    pub output_a: Value,
    pub output_b: Value,
}

impl Counterexample {
    pub fn format(&self, name_a: &str, name_b: &str) -> String {
        let args = self
            .inputs
            .iter()
            .map(|(name, v)| format!("{name} = {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "at {args}: {name_a} returns {}, {name_b} returns {}",
            self.output_a, self.output_b
        )
    }
}

/// The oracle's answer.
#[derive(Clone, Debug)]
pub enum Verdict {
    Equivalent,
    NotEquivalent(Counterexample),
    Unknown(String),
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Equivalent => "EQUIVALENT",
            Verdict::NotEquivalent(_) => "NOT EQUIVALENT",
            Verdict::Unknown(_) => "UNKNOWN",
        }
    }
}

// ─── Backends ──────────────────────────────────────────────────────

/// One input of the shared signature.
#[derive(Clone, Debug)]
pub struct InputSig {
    pub name: String,
    pub sort: Sort,
}

#[derive(Clone, Debug)]
pub enum SatOutcome {
    /// Satisfiable, with a witness assignment indexed like the inputs.
    Sat(Vec<Value>),
    Unsat,
    Unknown(String),
}

pub trait Backend {
    fn name(&self) -> &'static str;
    fn check_sat(&self, formula: &SymExpr, inputs: &[InputSig], deadline: Instant) -> SatOutcome;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Builtin,
    Z3,
    Cvc5,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Builtin => "builtin",
            BackendKind::Z3 => "z3",
            BackendKind::Cvc5 => "cvc5",
        }
    }
}

fn backend_for(kind: BackendKind) -> Box<dyn Backend> {
    match kind {
        BackendKind::Builtin => Box::new(solver::Builtin),
        BackendKind::Z3 => Box::new(smt::SmtSolver::z3()),
        BackendKind::Cvc5 => Box::new(smt::SmtSolver::cvc5()),
    }
}

#[derive(Clone, Debug)]
pub struct SolverConfig {
    pub backend: BackendKind,
    pub timeout: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Builtin,
            timeout: Duration::from_secs(5),
        }
    }
}

// ─── Probe Inputs ──────────────────────────────────────────────────

/// Values tried by differential probing before any solver work, each
/// replicated across all parameters.
const PROBE_VALUES: [i128; 4] = [0, 1, 5, 10];

/// Step budget for one concrete run.
const PROBE_FUEL: u64 = 200_000;

// ─── Oracle ────────────────────────────────────────────────────────

/// Decide bounded equivalence of two encoded functions.
///
/// `Equivalent` requires three facts: the covered domains agree
/// everywhere, the residual (bound-exceeded) domains coincide, and
/// the covered domain is non-empty. `NotEquivalent` requires a
/// counterexample confirmed by running both source functions.
pub fn decide_equivalence(
    a: &EncodedFunction,
    b: &EncodedFunction,
    module_a: &Module,
    module_b: &Module,
    inputs: &[InputSig],
    config: &SolverConfig,
) -> Verdict {
    let deadline = Instant::now() + config.timeout;
    let backend = backend_for(config.backend);

    // Cheap differential probing first: a disagreement on a concrete
    // input settles the question without any solving.
    if let Some(cex) = probe(module_a, module_b, inputs) {
        return Verdict::NotEquivalent(cex);
    }

    // Disequality over the jointly covered domain.
    let differ = outputs_differ(a.body.clone(), b.body.clone());
    let diseq = a.covered.clone().and(b.covered.clone()).and(differ);
    match backend.check_sat(&diseq, inputs, deadline) {
        SatOutcome::Sat(model) => {
            return match confirm_counterexample(module_a, module_b, inputs, &model) {
                Some(cex) => Verdict::NotEquivalent(cex),
                None => Verdict::Unknown(
                    "candidate counterexample could not be confirmed by concrete execution"
                        .to_string(),
                ),
            };
        }
        SatOutcome::Unsat => {}
        SatOutcome::Unknown(reason) => return Verdict::Unknown(reason),
    }

    // The unexplored domains must coincide, or one side has bounded
    // behavior the other side covers.
    if a.unbounded || b.unbounded {
        for (lhs, rhs) in [(a, b), (b, a)] {
            let gap = lhs.residual.clone().and(rhs.residual.clone().negate());
            match backend.check_sat(&gap, inputs, deadline) {
                SatOutcome::Unsat => {}
                SatOutcome::Sat(_) | SatOutcome::Unknown(_) => {
                    return Verdict::Unknown(format!(
                        "behavior beyond the unrolling bound differs (paths of '{}' \
                         left unexplored where '{}' is covered)",
                        lhs.name, rhs.name
                    ));
                }
            }
        }
    }

    // Nothing compared at all is not a proof of anything.
    let joint = a.covered.clone().and(b.covered.clone());
    match backend.check_sat(&joint, inputs, deadline) {
        SatOutcome::Sat(_) => {}
        SatOutcome::Unsat => {
            return Verdict::Unknown(
                "no behavior is covered within the unrolling bound".to_string(),
            )
        }
        SatOutcome::Unknown(reason) => return Verdict::Unknown(reason),
    }

    if a.partial || b.partial {
        return Verdict::Unknown(
            "the path ceiling left a coverage gap; raise the path limit".to_string(),
        );
    }

    Verdict::Equivalent
}

/// Disequality of the two bodies under the numeric reading of
/// booleans. `None` differs from every proper value.
fn outputs_differ(a: SymExpr, b: SymExpr) -> SymExpr {
    SymExpr::Ne(Box::new(a.as_int()), Box::new(b.as_int())).simplify()
}

fn probe(module_a: &Module, module_b: &Module, inputs: &[InputSig]) -> Option<Counterexample> {
    for v in PROBE_VALUES {
        let args: Vec<Value> = inputs.iter().map(|_| Value::Int(v)).collect();
        if let Some(cex) = try_inputs(module_a, module_b, inputs, &args) {
            return Some(cex);
        }
    }
    None
}

/// Run both functions on one input tuple; a disagreement between two
/// successful runs is a genuine counterexample.
fn try_inputs(
    module_a: &Module,
    module_b: &Module,
    inputs: &[InputSig],
    args: &[Value],
) -> Option<Counterexample> {
    let mut fuel_a = PROBE_FUEL;
    let mut fuel_b = PROBE_FUEL;
    let out_a = eval::call_primary(module_a, args, &mut fuel_a).ok()?;
    let out_b = eval::call_primary(module_b, args, &mut fuel_b).ok()?;
    if eval::values_equal(out_a, out_b) {
        return None;
    }
    Some(Counterexample {
        inputs: inputs
            .iter()
            .zip(args)
            .map(|(sig, v)| (sig.name.clone(), *v))
            .collect(),
        output_a: out_a,
        output_b: out_b,
    })
}

/// A solver model is only a candidate until both source functions
/// reproduce the disagreement.
fn confirm_counterexample(
    module_a: &Module,
    module_b: &Module,
    inputs: &[InputSig],
    model: &[Value],
) -> Option<Counterexample> {
    if model.len() != inputs.len() {
        return None;
    }
    try_inputs(module_a, module_b, inputs, model)
}
