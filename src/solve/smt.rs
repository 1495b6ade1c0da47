//! External SMT backend.
//!
//! Talks SMT-LIB 2 to a `z3` or `cvc5` subprocess over stdin. Floor
//! division and floor modulo are emitted as helper definitions on top
//! of the Euclidean builtins. Models come back as nullary
//! `define-fun`s and are parsed tolerantly; the oracle re-validates
//! every model by concrete execution anyway.

use std::fmt::Write as _;
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::infer::Sort;
use crate::solve::{Backend, InputSig, SatOutcome, Value};
use crate::sym::SymExpr;

#[derive(Clone, Copy, Debug)]
enum SmtKind {
    Z3,
    Cvc5,
}

pub(crate) struct SmtSolver {
    kind: SmtKind,
}

impl SmtSolver {
    pub(crate) fn z3() -> Self {
        Self { kind: SmtKind::Z3 }
    }

    pub(crate) fn cvc5() -> Self {
        Self { kind: SmtKind::Cvc5 }
    }

    fn binary(&self) -> &'static str {
        match self.kind {
            SmtKind::Z3 => "z3",
            SmtKind::Cvc5 => "cvc5",
        }
    }
}

impl Backend for SmtSolver {
    fn name(&self) -> &'static str {
        self.binary()
    }

    fn check_sat(&self, formula: &SymExpr, inputs: &[InputSig], deadline: Instant) -> SatOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return SatOutcome::Unknown("solver timeout".to_string());
        }
        let timeout_ms = remaining.as_millis().max(1) as u64;

        let script = match emit_script(formula, inputs) {
            Some(s) => s,
            None => {
                return SatOutcome::Unknown(format!(
                    "{} cannot encode this formula (None-valued paths)",
                    self.binary()
                ))
            }
        };

        let mut command = Command::new(self.binary());
        match self.kind {
            SmtKind::Z3 => {
                command.arg("-in").arg(format!("-t:{timeout_ms}"));
            }
            SmtKind::Cvc5 => {
                command
                    .arg("--lang=smt2")
                    .arg(format!("--tlimit={timeout_ms}"))
                    .arg("-");
            }
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return SatOutcome::Unknown(format!(
                    "{} executable not found (install it or use --solver builtin)",
                    self.binary()
                ));
            }
            Err(e) => {
                return SatOutcome::Unknown(format!("failed to start {}: {e}", self.binary()))
            }
        };

        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            if stdin.write_all(script.as_bytes()).is_err() {
                let _ = child.kill();
                return SatOutcome::Unknown(format!("failed to write to {}", self.binary()));
            }
        }

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(e) => {
                return SatOutcome::Unknown(format!("failed to run {}: {e}", self.binary()))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_response(&stdout, &stderr, inputs, self.binary())
    }
}

// ─── Script Emission ───────────────────────────────────────────────

/// Build the SMT-LIB script. `None` when the formula falls outside
/// what integers and booleans can express.
fn emit_script(formula: &SymExpr, inputs: &[InputSig]) -> Option<String> {
    let mut body = String::new();
    to_smt(formula, &mut body)?;

    let mut script = String::new();
    script.push_str("(set-logic ALL)\n");
    script.push_str("(set-option :produce-models true)\n");
    if uses_division(formula) {
        // Floor semantics on top of the Euclidean builtins.
        script.push_str(
            "(define-fun pydiv ((a Int) (b Int)) Int \
             (ite (>= b 0) (div a b) \
             (- 0 (+ (div a (- 0 b)) (ite (= (mod a (- 0 b)) 0) 0 1)))))\n",
        );
        script.push_str("(define-fun pymod ((a Int) (b Int)) Int (- a (* b (pydiv a b))))\n");
    }
    for (i, sig) in inputs.iter().enumerate() {
        let sort = match sig.sort {
            Sort::Bool => "Bool",
            Sort::BitVec(w) => {
                let _ = writeln!(script, "(declare-const v{i} (_ BitVec {w}))");
                continue;
            }
            _ => "Int",
        };
        let _ = writeln!(script, "(declare-const v{i} {sort})");
    }
    let _ = writeln!(script, "(assert {body})");
    script.push_str("(check-sat)\n(get-model)\n");
    Some(script)
}

fn uses_division(e: &SymExpr) -> bool {
    match e {
        SymExpr::FloorDiv(..) | SymExpr::Mod(..) => true,
        SymExpr::Int(_) | SymExpr::Bool(_) | SymExpr::NoneVal | SymExpr::Input { .. } => false,
        SymExpr::Neg(a) | SymExpr::Not(a) => uses_division(a),
        SymExpr::Add(a, b)
        | SymExpr::Sub(a, b)
        | SymExpr::Mul(a, b)
        | SymExpr::Eq(a, b)
        | SymExpr::Ne(a, b)
        | SymExpr::Lt(a, b)
        | SymExpr::Le(a, b)
        | SymExpr::Gt(a, b)
        | SymExpr::Ge(a, b)
        | SymExpr::And(a, b)
        | SymExpr::Or(a, b) => uses_division(a) || uses_division(b),
        SymExpr::Ite(c, t, e) => uses_division(c) || uses_division(t) || uses_division(e),
    }
}

fn to_smt(e: &SymExpr, out: &mut String) -> Option<()> {
    match e {
        SymExpr::Int(v) => {
            if *v < 0 {
                let _ = write!(out, "(- {})", v.unsigned_abs());
            } else {
                let _ = write!(out, "{v}");
            }
        }
        SymExpr::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        // No None sort on the wire; the builtin backend covers
        // None-returning functions.
        SymExpr::NoneVal => return None,
        SymExpr::Input { index, .. } => {
            let _ = write!(out, "v{index}");
        }
        SymExpr::Neg(a) => binary_like(out, "- 0", &[a])?,
        SymExpr::Not(a) => binary_like(out, "not", &[a])?,
        SymExpr::Add(a, b) => binary_like(out, "+", &[a, b])?,
        SymExpr::Sub(a, b) => binary_like(out, "-", &[a, b])?,
        SymExpr::Mul(a, b) => binary_like(out, "*", &[a, b])?,
        SymExpr::FloorDiv(a, b) => binary_like(out, "pydiv", &[a, b])?,
        SymExpr::Mod(a, b) => binary_like(out, "pymod", &[a, b])?,
        SymExpr::Eq(a, b) => binary_like(out, "=", &[a, b])?,
        SymExpr::Ne(a, b) => {
            out.push_str("(not ");
            binary_like(out, "=", &[a, b])?;
            out.push(')');
        }
        SymExpr::Lt(a, b) => binary_like(out, "<", &[a, b])?,
        SymExpr::Le(a, b) => binary_like(out, "<=", &[a, b])?,
        SymExpr::Gt(a, b) => binary_like(out, ">", &[a, b])?,
        SymExpr::Ge(a, b) => binary_like(out, ">=", &[a, b])?,
        SymExpr::And(a, b) => binary_like(out, "and", &[a, b])?,
        SymExpr::Or(a, b) => binary_like(out, "or", &[a, b])?,
        SymExpr::Ite(c, t, e) => binary_like(out, "ite", &[c, t, e])?,
    }
    Some(())
}

fn binary_like(out: &mut String, op: &str, args: &[&SymExpr]) -> Option<()> {
    let _ = write!(out, "({op}");
    for arg in args {
        out.push(' ');
        to_smt(arg, out)?;
    }
    out.push(')');
    Some(())
}

// ─── Response Parsing ──────────────────────────────────────────────

fn parse_response(stdout: &str, stderr: &str, inputs: &[InputSig], binary: &str) -> SatOutcome {
    let verdict = stdout
        .lines()
        .map(str::trim)
        .find(|l| matches!(*l, "sat" | "unsat" | "unknown" | "timeout"));

    match verdict {
        Some("sat") => SatOutcome::Sat(parse_model(stdout, inputs)),
        Some("unsat") => SatOutcome::Unsat,
        Some("timeout") => SatOutcome::Unknown("solver timeout".to_string()),
        Some("unknown") => {
            if stdout.contains("timeout") || stderr.contains("timeout") {
                SatOutcome::Unknown("solver timeout".to_string())
            } else {
                SatOutcome::Unknown(format!("{binary} returned unknown"))
            }
        }
        _ => {
            let detail = if !stderr.trim().is_empty() {
                stderr.trim().lines().next().unwrap_or("").to_string()
            } else {
                "no answer".to_string()
            };
            SatOutcome::Unknown(format!("{binary} produced no verdict ({detail})"))
        }
    }
}

/// Pull values out of `(define-fun vN () Sort value)` entries. Inputs
/// the model omits are irrelevant to the formula; zero stands in.
fn parse_model(stdout: &str, inputs: &[InputSig]) -> Vec<Value> {
    let flat = stdout.split_whitespace().collect::<Vec<_>>().join(" ");
    inputs
        .iter()
        .enumerate()
        .map(|(i, sig)| {
            let default = match sig.sort {
                Sort::Bool => Value::Bool(false),
                _ => Value::Int(0),
            };
            let marker = format!("(define-fun v{i} ");
            let Some(pos) = flat.find(&marker) else {
                return default;
            };
            let rest = &flat[pos + marker.len()..];
            parse_value(rest).unwrap_or(default)
        })
        .collect()
}

/// Parse the value part of `() Sort value)`, including `(- N)`.
fn parse_value(rest: &str) -> Option<Value> {
    let after_sort = rest
        .strip_prefix("() Int ")
        .or_else(|| rest.strip_prefix("() Bool "))?;
    let token: String = after_sort
        .chars()
        .take_while(|c| *c != ')')
        .collect::<String>()
        .trim()
        .to_string();
    match token.as_str() {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }
    if let Some(neg) = token.strip_prefix("(- ") {
        let v: i128 = neg.trim().parse().ok()?;
        return Some(Value::Int(-v));
    }
    token.parse().ok().map(Value::Int)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_inputs(n: usize) -> Vec<InputSig> {
        (0..n)
            .map(|i| InputSig {
                name: format!("x{i}"),
                sort: Sort::Int,
            })
            .collect()
    }

    #[test]
    fn test_emit_simple_formula() {
        let x = SymExpr::input(0, "x", Sort::Int);
        let formula = SymExpr::Gt(Box::new(x), Box::new(SymExpr::Int(5)));
        let script = emit_script(&formula, &int_inputs(1)).unwrap();
        assert!(script.contains("(declare-const v0 Int)"));
        assert!(script.contains("(assert (> v0 5))"));
        assert!(script.contains("(check-sat)"));
        assert!(!script.contains("pydiv"));
    }

    #[test]
    fn test_emit_negative_literal() {
        let x = SymExpr::input(0, "x", Sort::Int);
        let formula = SymExpr::Eq(Box::new(x), Box::new(SymExpr::Int(-7)));
        let script = emit_script(&formula, &int_inputs(1)).unwrap();
        assert!(script.contains("(= v0 (- 7))"));
    }

    #[test]
    fn test_emit_division_helpers() {
        let x = SymExpr::input(0, "x", Sort::Int);
        let formula = SymExpr::Eq(
            Box::new(SymExpr::FloorDiv(Box::new(x), Box::new(SymExpr::Int(2)))),
            Box::new(SymExpr::Int(3)),
        );
        let script = emit_script(&formula, &int_inputs(1)).unwrap();
        assert!(script.contains("define-fun pydiv"));
        assert!(script.contains("(pydiv v0 2)"));
    }

    #[test]
    fn test_none_is_not_encodable() {
        let formula = SymExpr::Eq(
            Box::new(SymExpr::input(0, "x", Sort::Int)),
            Box::new(SymExpr::NoneVal),
        );
        assert!(emit_script(&formula, &int_inputs(1)).is_none());
    }

    #[test]
    fn test_parse_sat_with_model() {
        let stdout = "sat\n(\n  (define-fun v0 () Int 5)\n  (define-fun v1 () Int (- 2))\n)\n";
        match parse_response(stdout, "", &int_inputs(2), "z3") {
            SatOutcome::Sat(model) => {
                assert_eq!(model, vec![Value::Int(5), Value::Int(-2)]);
            }
            other => panic!("expected sat, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unsat() {
        assert!(matches!(
            parse_response("unsat\n", "", &int_inputs(1), "z3"),
            SatOutcome::Unsat
        ));
    }

    #[test]
    fn test_parse_timeout() {
        match parse_response("timeout\n", "", &int_inputs(1), "z3") {
            SatOutcome::Unknown(reason) => assert!(reason.contains("timeout")),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_model_entry_defaults() {
        let stdout = "sat\n( (define-fun v1 () Int 9) )\n";
        match parse_response(stdout, "", &int_inputs(2), "z3") {
            SatOutcome::Sat(model) => {
                assert_eq!(model, vec![Value::Int(0), Value::Int(9)]);
            }
            other => panic!("expected sat, got {other:?}"),
        }
    }
}
