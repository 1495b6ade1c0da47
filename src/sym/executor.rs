//! Bounded symbolic execution.
//!
//! Every branch forks the current state; loops and calls unroll up to
//! the configured bound, after which the remaining behavior is
//! recorded as a `BoundExceeded` path. Locals are substituted away as
//! execution proceeds, so path conditions and outcomes mention only
//! the function's inputs.

use std::collections::HashMap;
use std::fmt;
use std::mem;

use crate::ast::{BinOp, Expr, ForIter, FunctionDef, Literal, Module, Stmt, UnOp};
use crate::infer::Sort;
use crate::solve::bounds;
use crate::span::{Span, Spanned};
use crate::sym::{ExecResult, Outcome, Path, SymExpr};

// ─── Configuration ─────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ExecConfig {
    /// Maximum loop iterations and call-inlining depth (K).
    pub unroll_bound: usize,
    /// Ceiling on explored paths per function. States pending when
    /// the ceiling is hit are dropped and reported as a coverage gap.
    pub max_paths: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            unroll_bound: 10,
            max_paths: 4096,
        }
    }
}

// ─── Errors ────────────────────────────────────────────────────────

/// A construct the symbolic stage cannot model. Fatal for the run.
#[derive(Clone, Debug)]
pub struct ExecError {
    pub kind: ExecErrorKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ExecErrorKind {
    Unsupported(String),
    UnboundVar(String),
    BadCall(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExecErrorKind::Unsupported(what) => write!(f, "unsupported construct: {what}"),
            ExecErrorKind::UnboundVar(name) => write!(f, "unbound variable '{name}'"),
            ExecErrorKind::BadCall(msg) => write!(f, "{msg}"),
        }
    }
}

impl ExecError {
    fn unsupported(what: &str, span: Span) -> Self {
        Self {
            kind: ExecErrorKind::Unsupported(what.to_string()),
            span,
        }
    }
}

// ─── Entry Point ───────────────────────────────────────────────────

/// Execute the primary function of `module` on symbolic inputs of the
/// given sorts.
pub fn execute(
    module: &Module,
    param_sorts: &[Sort],
    config: &ExecConfig,
) -> Result<ExecResult, ExecError> {
    let func = &module.primary().node;
    let mut ex = Executor {
        module,
        config,
        paths: Vec::new(),
        dropped: Vec::new(),
        truncated: false,
        call_depth: 0,
    };

    let env = func
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let sort = param_sorts.get(i).copied().unwrap_or(Sort::Int);
            (
                p.name.node.clone(),
                SymExpr::input(i as u32, &p.name.node, sort),
            )
        })
        .collect();

    let exits = ex.exec_block(
        &func.body,
        State {
            env,
            cond: SymExpr::Bool(true),
        },
    )?;
    for s in exits {
        ex.paths.push(Path {
            condition: s.cond,
            outcome: Outcome::ImplicitNone,
        });
    }

    Ok(ExecResult {
        paths: ex.paths,
        truncated: ex.truncated,
        dropped: ex.dropped,
    })
}

// ─── State ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct State {
    env: HashMap<String, SymExpr>,
    cond: SymExpr,
}

impl State {
    fn constrain(&self, extra: SymExpr) -> State {
        State {
            env: self.env.clone(),
            cond: self.cond.clone().and(extra),
        }
    }
}

fn feasible(cond: &SymExpr) -> bool {
    !bounds::definitely_unsat(cond)
}

/// Expression evaluation either yields a value or ends the current
/// path at the unrolling bound (the path has already been recorded).
enum Eval {
    Value(SymExpr),
    Bounded,
}

macro_rules! value {
    ($e:expr) => {
        match $e? {
            Eval::Value(v) => v,
            Eval::Bounded => return Ok(Eval::Bounded),
        }
    };
}

// ─── Executor ──────────────────────────────────────────────────────

struct Executor<'a> {
    module: &'a Module,
    config: &'a ExecConfig,
    paths: Vec<Path>,
    dropped: Vec<SymExpr>,
    truncated: bool,
    call_depth: usize,
}

impl<'a> Executor<'a> {
    fn at_capacity(&self) -> bool {
        self.paths.len() >= self.config.max_paths
    }

    fn drop_state(&mut self, cond: SymExpr) {
        self.truncated = true;
        self.dropped.push(cond);
    }

    fn push_bound_exceeded(&mut self, cond: SymExpr) {
        self.paths.push(Path {
            condition: cond,
            outcome: Outcome::BoundExceeded,
        });
    }

    /// Run a block, recording terminal paths as they complete.
    /// Returns the fall-through states.
    fn exec_block(
        &mut self,
        body: &[Spanned<Stmt>],
        state: State,
    ) -> Result<Vec<State>, ExecError> {
        let mut states = vec![state];
        for stmt in body {
            let mut next = Vec::new();
            for s in states {
                next.extend(self.exec_stmt(stmt, s)?);
            }
            states = next;
            if states.is_empty() {
                break;
            }
        }
        Ok(states)
    }

    fn exec_stmt(&mut self, stmt: &Spanned<Stmt>, mut state: State) -> Result<Vec<State>, ExecError> {
        match &stmt.node {
            Stmt::Assign { target, value } => {
                let v = match self.eval_expr(value, &mut state)? {
                    Eval::Value(v) => v,
                    Eval::Bounded => return Ok(vec![]),
                };
                state.env.insert(target.node.clone(), v);
                Ok(vec![state])
            }

            Stmt::AugAssign { target, op, value } => {
                let current = match state.env.get(&target.node) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(ExecError {
                            kind: ExecErrorKind::UnboundVar(target.node.clone()),
                            span: target.span,
                        })
                    }
                };
                let rhs = match self.eval_expr(value, &mut state)? {
                    Eval::Value(v) => v,
                    Eval::Bounded => return Ok(vec![]),
                };
                let v = apply_binop(*op, current, rhs);
                state.env.insert(target.node.clone(), v);
                Ok(vec![state])
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let c = match self.eval_expr(cond, &mut state)? {
                    Eval::Value(v) => v.truthy(),
                    Eval::Bounded => return Ok(vec![]),
                };
                let mut out = Vec::new();

                let then_state = state.constrain(c.clone());
                if feasible(&then_state.cond) {
                    if self.at_capacity() {
                        self.drop_state(then_state.cond);
                    } else {
                        out.extend(self.exec_block(then_body, then_state)?);
                    }
                }

                let else_state = state.constrain(c.negate());
                if feasible(&else_state.cond) {
                    if self.at_capacity() {
                        self.drop_state(else_state.cond);
                    } else {
                        match else_body {
                            Some(body) => out.extend(self.exec_block(body, else_state)?),
                            None => out.push(else_state),
                        }
                    }
                }
                Ok(out)
            }

            Stmt::While { cond, body } => {
                self.unroll_while(cond, body, state, self.config.unroll_bound)
            }

            Stmt::For { var, iter, body } => match iter {
                ForIter::Range { start, end } => {
                    let start_v = match start {
                        Some(e) => match self.eval_expr(e, &mut state)? {
                            Eval::Value(v) => v,
                            Eval::Bounded => return Ok(vec![]),
                        },
                        None => SymExpr::Int(0),
                    };
                    let end_v = match self.eval_expr(end, &mut state)? {
                        Eval::Value(v) => v,
                        Eval::Bounded => return Ok(vec![]),
                    };
                    self.unroll_range(var, &start_v, &end_v, 0, body, state)
                }
                ForIter::Seq(iterable) => Err(ExecError::unsupported(
                    "iteration over a sequence",
                    iterable.span,
                )),
            },

            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => match self.eval_expr(e, &mut state)? {
                        Eval::Value(v) => v,
                        Eval::Bounded => return Ok(vec![]),
                    },
                    None => SymExpr::NoneVal,
                };
                self.paths.push(Path {
                    condition: state.cond,
                    outcome: Outcome::Returned(v),
                });
                Ok(vec![])
            }

            Stmt::Pass => Ok(vec![state]),

            Stmt::Expr(e) => {
                // Pure language: the value is discarded, but the call
                // inside may still hit the bound.
                match self.eval_expr(e, &mut state)? {
                    Eval::Value(_) => Ok(vec![state]),
                    Eval::Bounded => Ok(vec![]),
                }
            }
        }
    }

    fn unroll_while(
        &mut self,
        cond: &Spanned<Expr>,
        body: &[Spanned<Stmt>],
        mut state: State,
        fuel: usize,
    ) -> Result<Vec<State>, ExecError> {
        let c = match self.eval_expr(cond, &mut state)? {
            Eval::Value(v) => v.truthy(),
            Eval::Bounded => return Ok(vec![]),
        };
        let mut out = Vec::new();

        let exit = state.constrain(c.clone().negate());
        if feasible(&exit.cond) {
            out.push(exit);
        }

        let enter = state.constrain(c);
        if feasible(&enter.cond) {
            if fuel == 0 {
                self.push_bound_exceeded(enter.cond);
            } else if self.at_capacity() {
                self.drop_state(enter.cond);
            } else {
                for s in self.exec_block(body, enter)? {
                    out.extend(self.unroll_while(cond, body, s, fuel - 1)?);
                }
            }
        }
        Ok(out)
    }

    fn unroll_range(
        &mut self,
        var: &Spanned<String>,
        start: &SymExpr,
        end: &SymExpr,
        iteration: usize,
        body: &[Spanned<Stmt>],
        state: State,
    ) -> Result<Vec<State>, ExecError> {
        let v = SymExpr::Add(
            Box::new(start.clone()),
            Box::new(SymExpr::Int(iteration as i128)),
        )
        .simplify();
        let c = SymExpr::Lt(Box::new(v.clone()), Box::new(end.clone())).simplify();
        let mut out = Vec::new();

        let exit = state.constrain(c.clone().negate());
        if feasible(&exit.cond) {
            out.push(exit);
        }

        let mut enter = state.constrain(c);
        if feasible(&enter.cond) {
            if iteration == self.config.unroll_bound {
                self.push_bound_exceeded(enter.cond);
            } else if self.at_capacity() {
                self.drop_state(enter.cond);
            } else {
                enter.env.insert(var.node.clone(), v);
                for s in self.exec_block(body, enter)? {
                    out.extend(self.unroll_range(var, start, end, iteration + 1, body, s)?);
                }
            }
        }
        Ok(out)
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn eval_expr(&mut self, expr: &Spanned<Expr>, state: &mut State) -> Result<Eval, ExecError> {
        match &expr.node {
            Expr::Literal(lit) => Ok(Eval::Value(match lit {
                Literal::Integer(v) => SymExpr::Int(*v),
                Literal::Bool(b) => SymExpr::Bool(*b),
                Literal::None => SymExpr::NoneVal,
            })),

            Expr::Var(name) => match state.env.get(name) {
                Some(v) => Ok(Eval::Value(v.clone())),
                None => Err(ExecError {
                    kind: ExecErrorKind::UnboundVar(name.clone()),
                    span: expr.span,
                }),
            },

            Expr::UnaryOp { op, operand } => {
                let v = value!(self.eval_expr(operand, state));
                Ok(Eval::Value(match op {
                    UnOp::Neg => SymExpr::Neg(Box::new(v)).simplify(),
                    UnOp::Not => v.truthy().negate(),
                }))
            }

            Expr::BinOp { op, lhs, rhs } => {
                let a = value!(self.eval_expr(lhs, state));
                // Short-circuit operators still evaluate both sides
                // symbolically; purity makes that sound, and the
                // selection built in apply_binop keeps the
                // operand-returning circuit semantics.
                let b = value!(self.eval_expr(rhs, state));
                Ok(Eval::Value(apply_binop(*op, a, b)))
            }

            Expr::Call { func, args } => {
                if func.node == "len" {
                    return Err(ExecError::unsupported("call to 'len'", expr.span));
                }
                let module: &'a Module = self.module;
                let callee = module
                    .functions
                    .iter()
                    .find(|f| f.node.name.node == func.node);
                let callee: &'a FunctionDef = match callee {
                    Some(f) => &f.node,
                    None => {
                        return Err(ExecError::unsupported(
                            &format!("call to external function '{}'", func.node),
                            expr.span,
                        ))
                    }
                };
                if callee.params.len() != args.len() {
                    return Err(ExecError {
                        kind: ExecErrorKind::BadCall(format!(
                            "call to '{}' with {} arguments (expects {})",
                            func.node,
                            args.len(),
                            callee.params.len()
                        )),
                        span: expr.span,
                    });
                }

                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(value!(self.eval_expr(arg, state)));
                }

                if self.call_depth >= self.config.unroll_bound {
                    self.push_bound_exceeded(state.cond.clone());
                    return Ok(Eval::Bounded);
                }

                let sub = self.exec_call(callee, arg_values)?;
                self.merge_call_paths(sub, state)
            }

            Expr::Subscript { value, .. } => Err(ExecError::unsupported(
                "sequence subscript",
                value.span,
            )),
        }
    }

    /// Inline one call: run the callee with its parameters bound to
    /// the argument expressions, collecting its paths separately.
    fn exec_call(
        &mut self,
        callee: &FunctionDef,
        args: Vec<SymExpr>,
    ) -> Result<ExecResult, ExecError> {
        let saved_paths = mem::take(&mut self.paths);
        let saved_dropped = mem::take(&mut self.dropped);
        self.call_depth += 1;

        let env = callee
            .params
            .iter()
            .zip(args)
            .map(|(p, v)| (p.name.node.clone(), v))
            .collect();
        let result = self.exec_block(
            &callee.body,
            State {
                env,
                cond: SymExpr::Bool(true),
            },
        );
        self.call_depth -= 1;

        let mut paths = mem::replace(&mut self.paths, saved_paths);
        let dropped = mem::replace(&mut self.dropped, saved_dropped);
        let exits = result?;
        for s in exits {
            paths.push(Path {
                condition: s.cond,
                outcome: Outcome::ImplicitNone,
            });
        }
        Ok(ExecResult {
            paths,
            truncated: false,
            dropped,
        })
    }

    /// Fold a callee's paths into a single value for the caller, and
    /// split off the part of the current path where the callee hit
    /// the bound.
    fn merge_call_paths(&mut self, sub: ExecResult, state: &mut State) -> Result<Eval, ExecError> {
        for d in sub.dropped {
            self.truncated = true;
            self.dropped.push(state.cond.clone().and(d));
        }

        let mut covered: Vec<(SymExpr, SymExpr)> = Vec::new();
        let mut residual = SymExpr::Bool(false);
        for p in sub.paths {
            match p.outcome {
                Outcome::Returned(v) => covered.push((p.condition, v)),
                Outcome::ImplicitNone => covered.push((p.condition, SymExpr::NoneVal)),
                Outcome::BoundExceeded => residual = residual.or(p.condition),
            }
        }

        if residual != SymExpr::Bool(false) {
            let bounded = state.cond.clone().and(residual.clone());
            if feasible(&bounded) {
                self.push_bound_exceeded(bounded);
            }
            state.cond = state.cond.clone().and(residual.negate());
            if !feasible(&state.cond) {
                return Ok(Eval::Bounded);
            }
        }

        let Some((_, last)) = covered.last().cloned() else {
            return Ok(Eval::Bounded);
        };
        let mut acc = last;
        for (c, v) in covered[..covered.len() - 1].iter().rev() {
            acc = SymExpr::Ite(Box::new(c.clone()), Box::new(v.clone()), Box::new(acc))
                .simplify();
        }
        Ok(Eval::Value(acc))
    }
}

fn apply_binop(op: BinOp, a: SymExpr, b: SymExpr) -> SymExpr {
    // `and`/`or` yield an operand, not a truth value: `a or b` is `a`
    // whenever `a` is truthy, otherwise `b`.
    match op {
        BinOp::And => {
            let test = a.clone().truthy();
            return SymExpr::Ite(Box::new(test), Box::new(b), Box::new(a)).simplify();
        }
        BinOp::Or => {
            let test = a.clone().truthy();
            return SymExpr::Ite(Box::new(test), Box::new(a), Box::new(b)).simplify();
        }
        _ => {}
    }
    let (a, b) = (Box::new(a), Box::new(b));
    match op {
        BinOp::Add => SymExpr::Add(a, b),
        BinOp::Sub => SymExpr::Sub(a, b),
        BinOp::Mul => SymExpr::Mul(a, b),
        BinOp::FloorDiv => SymExpr::FloorDiv(a, b),
        BinOp::Mod => SymExpr::Mod(a, b),
        BinOp::Eq => SymExpr::Eq(a, b),
        BinOp::Ne => SymExpr::Ne(a, b),
        BinOp::Lt => SymExpr::Lt(a, b),
        BinOp::Le => SymExpr::Le(a, b),
        BinOp::Gt => SymExpr::Gt(a, b),
        BinOp::Ge => SymExpr::Ge(a, b),
        BinOp::And | BinOp::Or => unreachable!(),
    }
    .simplify()
}
