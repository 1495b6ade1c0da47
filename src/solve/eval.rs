//! Concrete evaluation.
//!
//! Two interpreters live here: one over the source tree, used to
//! probe candidate inputs and to confirm counterexamples against the
//! real functions, and one over symbolic expressions, used to verify
//! solver models before trusting them.

use std::collections::HashMap;

use crate::ast::{BinOp, Expr, ForIter, FunctionDef, Literal, Module, Stmt, UnOp};
use crate::solve::Value;
use crate::span::Spanned;
use crate::sym::{div_floor, mod_floor, SymExpr};

/// Why a concrete run produced no value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalError {
    DivisionByZero,
    Overflow,
    /// Step budget exhausted (runaway loop or deep recursion).
    FuelExhausted,
    Unsupported,
    UnboundVar,
    BadCall,
}


fn tick(fuel: &mut u64) -> Result<(), EvalError> {
    match fuel.checked_sub(1) {
        Some(0) | None => Err(EvalError::FuelExhausted),
        Some(f) => {
            *fuel = f;
            Ok(())
        }
    }
}

/// Run the primary function of `module` on concrete arguments.
pub fn call_primary(module: &Module, args: &[Value], fuel: &mut u64) -> Result<Value, EvalError> {
    call_function(module, &module.primary().node, args, fuel)
}

fn call_function(
    module: &Module,
    func: &FunctionDef,
    args: &[Value],
    fuel: &mut u64,
) -> Result<Value, EvalError> {
    if func.params.len() != args.len() {
        return Err(EvalError::BadCall);
    }
    let mut env: HashMap<String, Value> = func
        .params
        .iter()
        .zip(args)
        .map(|(p, v)| (p.name.node.clone(), *v))
        .collect();
    match exec_block(module, &func.body, &mut env, fuel)? {
        Some(v) => Ok(v),
        None => Ok(Value::None),
    }
}

/// `Some(v)` when the block returned, `None` when it fell through.
fn exec_block(
    module: &Module,
    body: &[Spanned<Stmt>],
    env: &mut HashMap<String, Value>,
    fuel: &mut u64,
) -> Result<Option<Value>, EvalError> {
    for stmt in body {
        tick(fuel)?;
        match &stmt.node {
            Stmt::Assign { target, value } => {
                let v = eval_expr(module, value, env, fuel)?;
                env.insert(target.node.clone(), v);
            }
            Stmt::AugAssign { target, op, value } => {
                let current = *env.get(&target.node).ok_or(EvalError::UnboundVar)?;
                let rhs = eval_expr(module, value, env, fuel)?;
                env.insert(target.node.clone(), apply_binop(*op, current, rhs)?);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let c = eval_expr(module, cond, env, fuel)?.truthy();
                let body = if c {
                    Some(then_body)
                } else {
                    else_body.as_ref()
                };
                if let Some(body) = body {
                    if let Some(v) = exec_block(module, body, env, fuel)? {
                        return Ok(Some(v));
                    }
                }
            }
            Stmt::While { cond, body } => loop {
                tick(fuel)?;
                if !eval_expr(module, cond, env, fuel)?.truthy() {
                    break;
                }
                if let Some(v) = exec_block(module, body, env, fuel)? {
                    return Ok(Some(v));
                }
            },
            Stmt::For { var, iter, body } => {
                let (start, end) = match iter {
                    ForIter::Range { start, end } => {
                        let s = match start {
                            Some(e) => eval_expr(module, e, env, fuel)?.as_int()?,
                            None => 0,
                        };
                        (s, eval_expr(module, end, env, fuel)?.as_int()?)
                    }
                    ForIter::Seq(_) => return Err(EvalError::Unsupported),
                };
                let mut i = start;
                while i < end {
                    tick(fuel)?;
                    env.insert(var.node.clone(), Value::Int(i));
                    if let Some(v) = exec_block(module, body, env, fuel)? {
                        return Ok(Some(v));
                    }
                    i = i.checked_add(1).ok_or(EvalError::Overflow)?;
                }
            }
            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => eval_expr(module, e, env, fuel)?,
                    None => Value::None,
                };
                return Ok(Some(v));
            }
            Stmt::Pass => {}
            Stmt::Expr(e) => {
                eval_expr(module, e, env, fuel)?;
            }
        }
    }
    Ok(None)
}

fn eval_expr(
    module: &Module,
    expr: &Spanned<Expr>,
    env: &mut HashMap<String, Value>,
    fuel: &mut u64,
) -> Result<Value, EvalError> {
    match &expr.node {
        Expr::Literal(lit) => Ok(match lit {
            Literal::Integer(v) => Value::Int(*v),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::None => Value::None,
        }),
        Expr::Var(name) => env.get(name).copied().ok_or(EvalError::UnboundVar),
        Expr::UnaryOp { op, operand } => {
            let v = eval_expr(module, operand, env, fuel)?;
            match op {
                UnOp::Neg => Ok(Value::Int(
                    v.as_int()?.checked_neg().ok_or(EvalError::Overflow)?,
                )),
                UnOp::Not => Ok(Value::Bool(!v.truthy())),
            }
        }
        Expr::BinOp { op, lhs, rhs } => {
            // Real short-circuiting, matching the source semantics.
            match op {
                BinOp::And => {
                    let a = eval_expr(module, lhs, env, fuel)?;
                    if !a.truthy() {
                        return Ok(a);
                    }
                    eval_expr(module, rhs, env, fuel)
                }
                BinOp::Or => {
                    let a = eval_expr(module, lhs, env, fuel)?;
                    if a.truthy() {
                        return Ok(a);
                    }
                    eval_expr(module, rhs, env, fuel)
                }
                _ => {
                    let a = eval_expr(module, lhs, env, fuel)?;
                    let b = eval_expr(module, rhs, env, fuel)?;
                    apply_binop(*op, a, b)
                }
            }
        }
        Expr::Call { func, args } => {
            let callee = module
                .functions
                .iter()
                .find(|f| f.node.name.node == func.node)
                .ok_or(EvalError::Unsupported)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(eval_expr(module, arg, env, fuel)?);
            }
            tick(fuel)?;
            call_function(module, &callee.node, &arg_values, fuel)
        }
        Expr::Subscript { .. } => Err(EvalError::Unsupported),
    }
}

fn apply_binop(op: BinOp, a: Value, b: Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => int_op(a, b, i128::checked_add),
        BinOp::Sub => int_op(a, b, i128::checked_sub),
        BinOp::Mul => int_op(a, b, i128::checked_mul),
        BinOp::FloorDiv => {
            let (a, b) = (a.as_int()?, b.as_int()?);
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            div_floor(a, b).map(Value::Int).ok_or(EvalError::Overflow)
        }
        BinOp::Mod => {
            let (a, b) = (a.as_int()?, b.as_int()?);
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            mod_floor(a, b).map(Value::Int).ok_or(EvalError::Overflow)
        }
        BinOp::Eq => Ok(Value::Bool(values_equal(a, b))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(a, b))),
        BinOp::Lt => cmp_op(a, b, |x, y| x < y),
        BinOp::Le => cmp_op(a, b, |x, y| x <= y),
        BinOp::Gt => cmp_op(a, b, |x, y| x > y),
        BinOp::Ge => cmp_op(a, b, |x, y| x >= y),
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled by the caller"),
    }
}

fn int_op(a: Value, b: Value, f: impl Fn(i128, i128) -> Option<i128>) -> Result<Value, EvalError> {
    f(a.as_int()?, b.as_int()?)
        .map(Value::Int)
        .ok_or(EvalError::Overflow)
}

fn cmp_op(a: Value, b: Value, f: impl Fn(i128, i128) -> bool) -> Result<Value, EvalError> {
    Ok(Value::Bool(f(a.as_int()?, b.as_int()?)))
}

/// Numeric equality with booleans, identity for `None`.
pub fn values_equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::None, _) | (_, Value::None) => false,
        _ => a.as_int().ok() == b.as_int().ok(),
    }
}

// ─── Symbolic Expression Evaluation ────────────────────────────────

/// Evaluate a symbolic expression under a concrete input assignment.
/// `None` when the value is undefined (division by zero, overflow).
pub fn eval_sym(expr: &SymExpr, inputs: &[Value]) -> Option<Value> {
    match expr {
        SymExpr::Int(v) => Some(Value::Int(*v)),
        SymExpr::Bool(b) => Some(Value::Bool(*b)),
        SymExpr::NoneVal => Some(Value::None),
        SymExpr::Input { index, .. } => inputs.get(*index as usize).copied(),
        SymExpr::Neg(e) => Some(Value::Int(num(e, inputs)?.checked_neg()?)),
        SymExpr::Not(e) => Some(Value::Bool(!eval_sym(e, inputs)?.truthy())),
        SymExpr::Add(a, b) => Some(Value::Int(num(a, inputs)?.checked_add(num(b, inputs)?)?)),
        SymExpr::Sub(a, b) => Some(Value::Int(num(a, inputs)?.checked_sub(num(b, inputs)?)?)),
        SymExpr::Mul(a, b) => Some(Value::Int(num(a, inputs)?.checked_mul(num(b, inputs)?)?)),
        SymExpr::FloorDiv(a, b) => {
            Some(Value::Int(div_floor(num(a, inputs)?, num(b, inputs)?)?))
        }
        SymExpr::Mod(a, b) => Some(Value::Int(mod_floor(num(a, inputs)?, num(b, inputs)?)?)),
        SymExpr::Eq(a, b) => Some(Value::Bool(values_equal(
            eval_sym(a, inputs)?,
            eval_sym(b, inputs)?,
        ))),
        SymExpr::Ne(a, b) => Some(Value::Bool(!values_equal(
            eval_sym(a, inputs)?,
            eval_sym(b, inputs)?,
        ))),
        SymExpr::Lt(a, b) => Some(Value::Bool(num(a, inputs)? < num(b, inputs)?)),
        SymExpr::Le(a, b) => Some(Value::Bool(num(a, inputs)? <= num(b, inputs)?)),
        SymExpr::Gt(a, b) => Some(Value::Bool(num(a, inputs)? > num(b, inputs)?)),
        SymExpr::Ge(a, b) => Some(Value::Bool(num(a, inputs)? >= num(b, inputs)?)),
        SymExpr::And(a, b) => Some(Value::Bool(
            eval_sym(a, inputs)?.truthy() && eval_sym(b, inputs)?.truthy(),
        )),
        SymExpr::Or(a, b) => Some(Value::Bool(
            eval_sym(a, inputs)?.truthy() || eval_sym(b, inputs)?.truthy(),
        )),
        SymExpr::Ite(c, t, e) => {
            if eval_sym(c, inputs)?.truthy() {
                eval_sym(t, inputs)
            } else {
                eval_sym(e, inputs)
            }
        }
    }
}

fn num(e: &SymExpr, inputs: &[Value]) -> Option<i128> {
    eval_sym(e, inputs)?.as_int().ok()
}
