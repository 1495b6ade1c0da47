use std::time::{Duration, Instant};

use super::eval::{call_primary, eval_sym, values_equal, EvalError};
use super::solver::Builtin;
use super::*;
use crate::encode::encode;
use crate::infer::{infer_sorts, unify_signatures};
use crate::sym::executor::{execute, ExecConfig};

fn x() -> SymExpr {
    SymExpr::input(0, "x", Sort::Int)
}

fn int_sig(names: &[&str]) -> Vec<InputSig> {
    names
        .iter()
        .map(|name| InputSig {
            name: name.to_string(),
            sort: Sort::Int,
        })
        .collect()
}

fn check(formula: SymExpr, inputs: &[InputSig]) -> SatOutcome {
    Builtin.check_sat(&formula, inputs, Instant::now() + Duration::from_secs(5))
}

// ─── Builtin Backend ───────────────────────────────────────────────

#[test]
fn test_offset_disequality_is_sat_with_verified_model() {
    // x + 1 != x + 2 holds everywhere.
    let formula = SymExpr::Ne(
        Box::new(SymExpr::Add(Box::new(x()), Box::new(SymExpr::Int(1)))),
        Box::new(SymExpr::Add(Box::new(x()), Box::new(SymExpr::Int(2)))),
    );
    match check(formula.clone(), &int_sig(&["x"])) {
        SatOutcome::Sat(model) => {
            assert_eq!(model.len(), 1);
            let v = eval_sym(&formula, &model).unwrap();
            assert!(v.truthy(), "reported model must satisfy the formula");
        }
        other => panic!("expected sat, got {other:?}"),
    }
}

#[test]
fn test_rewritten_arithmetic_disequality_is_unsat() {
    // x + 1 vs x - (-1): identical after normalization.
    let formula = SymExpr::Ne(
        Box::new(SymExpr::Add(Box::new(x()), Box::new(SymExpr::Int(1)))),
        Box::new(SymExpr::Sub(Box::new(x()), Box::new(SymExpr::Int(-1)))),
    );
    assert!(matches!(check(formula, &int_sig(&["x"])), SatOutcome::Unsat));
}

#[test]
fn test_doubling_disequality_is_unsat_by_polynomials() {
    let formula = SymExpr::Ne(
        Box::new(SymExpr::Mul(Box::new(x()), Box::new(SymExpr::Int(2)))),
        Box::new(SymExpr::Add(Box::new(x()), Box::new(x()))),
    );
    assert!(matches!(check(formula, &int_sig(&["x"])), SatOutcome::Unsat));
}

#[test]
fn test_interval_contradiction_is_unsat() {
    let formula = SymExpr::Gt(Box::new(x()), Box::new(SymExpr::Int(5)))
        .and(SymExpr::Lt(Box::new(x()), Box::new(SymExpr::Int(0))));
    assert!(matches!(check(formula, &int_sig(&["x"])), SatOutcome::Unsat));
}

#[test]
fn test_pinned_input_yields_exact_model() {
    let formula = SymExpr::Eq(Box::new(x()), Box::new(SymExpr::Int(3)));
    match check(formula, &int_sig(&["x"])) {
        SatOutcome::Sat(model) => assert_eq!(model, vec![Value::Int(3)]),
        other => panic!("expected sat, got {other:?}"),
    }
}

#[test]
fn test_disjunction_splits_into_cases() {
    let formula = SymExpr::Eq(Box::new(x()), Box::new(SymExpr::Int(2)))
        .or(SymExpr::Eq(Box::new(x()), Box::new(SymExpr::Int(5))));
    match check(formula, &int_sig(&["x"])) {
        SatOutcome::Sat(model) => {
            assert!(model == vec![Value::Int(2)] || model == vec![Value::Int(5)]);
        }
        other => panic!("expected sat, got {other:?}"),
    }
}

#[test]
fn test_boolean_contradiction_is_unsat() {
    let b = SymExpr::input(0, "b", Sort::Bool);
    let formula = SymExpr::And(
        Box::new(b.clone()),
        Box::new(SymExpr::Not(Box::new(b))),
    );
    let inputs = vec![InputSig {
        name: "b".to_string(),
        sort: Sort::Bool,
    }];
    assert!(matches!(check(formula, &inputs), SatOutcome::Unsat));
}

#[test]
fn test_selection_inside_comparison_is_lifted() {
    // (1 if b else 0) > 1 has no model.
    let b = SymExpr::input(0, "b", Sort::Bool);
    let formula = SymExpr::Gt(
        Box::new(SymExpr::Ite(
            Box::new(b),
            Box::new(SymExpr::Int(1)),
            Box::new(SymExpr::Int(0)),
        )),
        Box::new(SymExpr::Int(1)),
    );
    let inputs = vec![InputSig {
        name: "b".to_string(),
        sort: Sort::Bool,
    }];
    assert!(matches!(check(formula, &inputs), SatOutcome::Unsat));
}

#[test]
fn test_no_witness_in_bounded_search_is_unknown() {
    // x * x == 7 has no integer solution; the search cannot prove
    // that, so the answer must stay unknown rather than unsat.
    let formula = SymExpr::Eq(
        Box::new(SymExpr::Mul(Box::new(x()), Box::new(x()))),
        Box::new(SymExpr::Int(7)),
    );
    match check(formula, &int_sig(&["x"])) {
        SatOutcome::Unknown(reason) => assert!(reason.contains("no witness")),
        other => panic!("expected unknown, got {other:?}"),
    }
}

// ─── Concrete Evaluation ───────────────────────────────────────────

fn call(source: &str, args: &[Value]) -> Result<Value, EvalError> {
    let module = crate::parse_source_silent(source, "test.py").unwrap();
    let mut fuel = PROBE_FUEL;
    call_primary(&module, args, &mut fuel)
}

#[test]
fn test_concrete_factorial() {
    let source = "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n";
    assert_eq!(call(source, &[Value::Int(5)]), Ok(Value::Int(120)));
    assert_eq!(call(source, &[Value::Int(0)]), Ok(Value::Int(1)));
}

#[test]
fn test_concrete_short_circuit_returns_operand() {
    let source = "def f(x):\n    return x or 7\n";
    assert_eq!(call(source, &[Value::Int(0)]), Ok(Value::Int(7)));
    assert_eq!(call(source, &[Value::Int(3)]), Ok(Value::Int(3)));
}

#[test]
fn test_concrete_division_by_zero() {
    let source = "def f(x):\n    return 1 // x\n";
    assert_eq!(call(source, &[Value::Int(0)]), Err(EvalError::DivisionByZero));
}

#[test]
fn test_concrete_runaway_loop_exhausts_fuel() {
    let source = "def f(x):\n    while True:\n        x += 1\n    return x\n";
    assert_eq!(call(source, &[Value::Int(0)]), Err(EvalError::FuelExhausted));
}

#[test]
fn test_values_equal_numeric_booleans() {
    assert!(values_equal(Value::Bool(true), Value::Int(1)));
    assert!(values_equal(Value::None, Value::None));
    assert!(!values_equal(Value::None, Value::Int(0)));
}

// ─── Oracle ────────────────────────────────────────────────────────

fn decide(src_a: &str, src_b: &str) -> Verdict {
    decide_at(src_a, src_b, 10)
}

fn decide_at(src_a: &str, src_b: &str, bound: usize) -> Verdict {
    let module_a = crate::parse_source_silent(src_a, "a.py").unwrap();
    let module_b = crate::parse_source_silent(src_b, "b.py").unwrap();
    let sorts_a = infer_sorts(&module_a.primary().node).unwrap();
    let sorts_b = infer_sorts(&module_b.primary().node).unwrap();
    let unified = unify_signatures(&sorts_a, &sorts_b).unwrap();
    let config = ExecConfig {
        unroll_bound: bound,
        max_paths: 4096,
    };
    let exec_a = execute(&module_a, &unified, &config).unwrap();
    let exec_b = execute(&module_b, &unified, &config).unwrap();
    let enc_a = encode(&module_a.primary().node.name.node, &unified, &exec_a);
    let enc_b = encode(&module_b.primary().node.name.node, &unified, &exec_b);
    let inputs: Vec<InputSig> = module_a
        .primary()
        .node
        .params
        .iter()
        .zip(&unified)
        .map(|(p, sort)| InputSig {
            name: p.name.node.clone(),
            sort: *sort,
        })
        .collect();
    decide_equivalence(
        &enc_a,
        &enc_b,
        &module_a,
        &module_b,
        &inputs,
        &SolverConfig::default(),
    )
}

#[test]
fn test_probe_settles_constant_offset() {
    let verdict = decide("def f(x):\n    return x + 1\n", "def g(x):\n    return x + 2\n");
    match verdict {
        Verdict::NotEquivalent(cex) => {
            assert_eq!(cex.inputs.len(), 1);
            assert!(!values_equal(cex.output_a, cex.output_b));
        }
        other => panic!("expected not equivalent, got {other:?}"),
    }
}

#[test]
fn test_rewritten_arithmetic_is_equivalent() {
    let verdict = decide(
        "def f(x):\n    return x + 1\n",
        "def g(y):\n    return y - (-1)\n",
    );
    assert!(matches!(verdict, Verdict::Equivalent));
}

#[test]
fn test_doubling_is_equivalent() {
    let verdict = decide("def f(x):\n    return x + x\n", "def g(y):\n    return y * 2\n");
    assert!(matches!(verdict, Verdict::Equivalent));
}

#[test]
fn test_branch_free_vs_branching_absolute_value() {
    let verdict = decide(
        "def f(x):\n    if x < 0:\n        return -x\n    return x\n",
        "def g(y):\n    if y >= 0:\n        return y\n    return -y\n",
    );
    assert!(matches!(verdict, Verdict::Equivalent));
}

#[test]
fn test_factorial_iterative_vs_recursive() {
    let iterative = "def fact_it(n):\n    r = 1\n    for i in range(1, n + 1):\n        r *= i\n    return r\n";
    let recursive =
        "def fact_rec(n):\n    if n <= 1:\n        return 1\n    return n * fact_rec(n - 1)\n";
    let verdict = decide(iterative, recursive);
    assert!(
        matches!(verdict, Verdict::Equivalent),
        "expected equivalence within the bound, got {verdict:?}"
    );
}

#[test]
fn test_solver_finds_negative_counterexample() {
    // Probing tries non-negative values only; the disagreement at
    // negative inputs must come out of the solver, confirmed by
    // concrete execution.
    let clamp = "def f(n):\n    c = 0\n    while c < n:\n        c += 1\n    return c\n";
    let identity = "def g(n):\n    return n\n";
    match decide(clamp, identity) {
        Verdict::NotEquivalent(cex) => {
            assert_eq!(cex.output_a, Value::Int(0));
            let n = match cex.inputs[0].1 {
                Value::Int(v) => v,
                other => panic!("expected an integer input, got {other:?}"),
            };
            assert!(n < 0);
        }
        other => panic!("expected not equivalent, got {other:?}"),
    }
}

#[test]
fn test_value_returning_or_is_not_equivalent_to_constant() {
    // The product is zero at every probed input, so the masked value
    // only shows through `or` on inputs the solver has to find.
    let masked = "def f(x):\n    return (x * (x - 1) * (x - 5) * (x - 10)) or 1\n";
    let constant = "def g(x):\n    return 1\n";
    match decide(masked, constant) {
        Verdict::NotEquivalent(cex) => {
            assert_eq!(cex.output_b, Value::Int(1));
            assert!(!values_equal(cex.output_a, cex.output_b));
        }
        other => panic!("expected not equivalent, got {other:?}"),
    }
}

#[test]
fn test_deep_unrolling_stays_within_the_split_budget() {
    // At bound 25 the two selection chains yield hundreds of
    // combinations per query; only the mutually consistent ones may
    // cost real solving work.
    let a = "def f(n):\n    c = 0\n    while c < n:\n        c += 1\n    return c\n";
    let b = "def g(m):\n    k = 0\n    while k < m:\n        k += 1\n    return k\n";
    assert!(matches!(decide_at(a, b, 25), Verdict::Equivalent));
}

#[test]
fn test_one_sided_residual_is_unknown() {
    // The loop clamp leaves n >= 11 unexplored; the branching clamp
    // covers everything, so equivalence cannot be claimed.
    let looped = "def f(n):\n    c = 0\n    while c < n:\n        c += 1\n    return c\n";
    let branched = "def g(n):\n    if n < 0:\n        return 0\n    return n\n";
    match decide(looped, branched) {
        Verdict::Unknown(reason) => assert!(reason.contains("unrolling bound")),
        other => panic!("expected unknown, got {other:?}"),
    }
}

#[test]
fn test_raising_the_bound_resolves_unknown() {
    let looped =
        "def f(x):\n    t = 0\n    for i in range(12):\n        t += x\n    return t\n";
    let closed = "def g(x):\n    return x * 12\n";
    assert!(matches!(decide_at(looped, closed, 10), Verdict::Unknown(_)));
    assert!(matches!(decide_at(looped, closed, 15), Verdict::Equivalent));
}

#[test]
fn test_implicit_none_differs_from_zero() {
    let partial = "def f(x):\n    if x > 0:\n        return 1\n";
    let total = "def g(x):\n    if x > 0:\n        return 1\n    return 0\n";
    match decide(partial, total) {
        Verdict::NotEquivalent(cex) => {
            assert_eq!(cex.output_a, Value::None);
            assert_eq!(cex.output_b, Value::Int(0));
        }
        other => panic!("expected not equivalent, got {other:?}"),
    }
}

#[test]
fn test_matching_residuals_stay_equivalent() {
    // Identical loops leave identical residual domains; agreement on
    // the covered domain is then enough.
    let a = "def f(n):\n    c = 0\n    while c < n:\n        c += 1\n    return c\n";
    let b = "def g(m):\n    k = 0\n    while k < m:\n        k += 1\n    return k\n";
    assert!(matches!(decide(a, b), Verdict::Equivalent));
}

#[test]
fn test_counterexample_formatting() {
    let cex = Counterexample {
        inputs: vec![("x".to_string(), Value::Int(0))],
        output_a: Value::Int(1),
        output_b: Value::Int(2),
    };
    assert_eq!(cex.format("f", "g"), "at x = 0: f returns 1, g returns 2");
}
