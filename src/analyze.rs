//! Syntactic analysis of parsed functions: content hashing + the
//! structural signals that feed clone classification and reporting.
//!
//! Every function gets two BLAKE3 content hashes over a deterministic
//! serialization of its tree:
//! - the exact hash keeps identifier names, so equal hashes mean the
//!   functions are the same code up to whitespace and comments;
//! - the shape hash replaces names with de Bruijn indices, so equal
//!   hashes mean the functions differ only by consistent renaming.
//!
//! Alongside the hashes, this module extracts the comparison signals
//! shown in the report: per-category operation counts, the ordered
//! control-flow sequence, the input/output pattern, and whether the
//! function iterates or recurses.

use std::collections::HashMap;

use crate::ast::*;
use crate::span::Spanned;

// ─── Serialization Format Tags ─────────────────────────────────────

const TAG_FN_DEF: u8 = 0x01;
const TAG_ASSIGN: u8 = 0x02;
const TAG_AUG_ASSIGN: u8 = 0x03;
const TAG_IF: u8 = 0x04;
const TAG_WHILE: u8 = 0x05;
const TAG_FOR_RANGE: u8 = 0x06;
const TAG_FOR_SEQ: u8 = 0x07;
const TAG_RETURN: u8 = 0x08;
const TAG_PASS: u8 = 0x09;
const TAG_EXPR_STMT: u8 = 0x0A;

const TAG_INT_LIT: u8 = 0x10;
const TAG_BOOL_LIT: u8 = 0x11;
const TAG_NONE_LIT: u8 = 0x12;
const TAG_VAR: u8 = 0x13;
const TAG_NEG: u8 = 0x14;
const TAG_NOT: u8 = 0x15;

const TAG_ADD: u8 = 0x20;
const TAG_SUB: u8 = 0x21;
const TAG_MUL: u8 = 0x22;
const TAG_FLOOR_DIV: u8 = 0x23;
const TAG_MOD: u8 = 0x24;
const TAG_EQ: u8 = 0x25;
const TAG_NE: u8 = 0x26;
const TAG_LT: u8 = 0x27;
const TAG_LE: u8 = 0x28;
const TAG_GT: u8 = 0x29;
const TAG_GE: u8 = 0x2A;
const TAG_AND: u8 = 0x2B;
const TAG_OR: u8 = 0x2C;

const TAG_CALL: u8 = 0x30;
const TAG_SELF_CALL: u8 = 0x31;
const TAG_SUBSCRIPT: u8 = 0x32;

// Version byte for hash stability
const HASH_VERSION: u8 = 1;

// ─── Content Hash ──────────────────────────────────────────────────

/// A 256-bit BLAKE3 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Display as full hex.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Display as short base-32 (8 characters, 40 bits).
    pub fn to_short(&self) -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghjkmnpqrstuvwxyz";
        let val = u64::from_be_bytes([
            0, 0, 0, self.0[0], self.0[1], self.0[2], self.0[3], self.0[4],
        ]);
        let mut result = String::with_capacity(8);
        for i in (0..8).rev() {
            let idx = ((val >> (i * 5)) & 0x1F) as usize;
            result.push(ALPHABET[idx] as char);
        }
        result
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

// ─── Analysis Result ───────────────────────────────────────────────

/// Everything the rest of the pipeline needs to know about one
/// function's syntax.
#[derive(Clone, Debug)]
pub struct FunctionAnalysis {
    /// Hash of the tree with identifier names kept.
    pub exact_hash: ContentHash,
    /// Hash of the tree with names replaced by de Bruijn indices.
    pub shape_hash: ContentHash,
    /// Shallow, name-erased fingerprint of every statement at every
    /// nesting level. Equal multisets mean one body is a pure
    /// reordering of the other.
    pub stmt_fingerprints: Vec<ContentHash>,
    pub logic: LogicSummary,
    pub control_flow: Vec<ControlNode>,
    pub io: IoPattern,
    pub pattern: CompPattern,
}

/// Operation counts by category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogicSummary {
    pub arith_ops: usize,
    pub comparisons: usize,
    pub assignments: usize,
    pub returns: usize,
    pub loops: usize,
    pub conditionals: usize,
    pub calls: usize,
}

impl LogicSummary {
    /// Sum of absolute per-category differences. 0 means the two
    /// functions use the same mix of operations.
    pub fn mismatch(&self, other: &LogicSummary) -> usize {
        self.arith_ops.abs_diff(other.arith_ops)
            + self.comparisons.abs_diff(other.comparisons)
            + self.assignments.abs_diff(other.assignments)
            + self.returns.abs_diff(other.returns)
            + self.loops.abs_diff(other.loops)
            + self.conditionals.abs_diff(other.conditionals)
            + self.calls.abs_diff(other.calls)
    }
}

/// One entry in the ordered control-flow sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlNode {
    If,
    While,
    For,
    Return,
}

impl ControlNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlNode::If => "If",
            ControlNode::While => "While",
            ControlNode::For => "For",
            ControlNode::Return => "Return",
        }
    }
}

/// Parameter names and what the function hands back.
#[derive(Clone, Debug)]
pub struct IoPattern {
    pub inputs: Vec<String>,
    /// Names of returned variables; `<expression>` for computed
    /// returns, `None` for bare returns.
    pub outputs: Vec<String>,
}

impl IoPattern {
    /// Similarity in [0, 1]: the mean of input-name overlap and
    /// output overlap, each measured as |intersection| / max(len).
    pub fn similarity(&self, other: &IoPattern) -> f64 {
        (set_overlap(&self.inputs, &other.inputs) + set_overlap(&self.outputs, &other.outputs))
            / 2.0
    }
}

fn set_overlap(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.iter().filter(|x| b.contains(x)).count();
    shared as f64 / a.len().max(b.len()) as f64
}

/// How the function gets its work done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompPattern {
    pub recursive: bool,
    pub iterative: bool,
}

impl CompPattern {
    pub fn label(&self) -> &'static str {
        if self.recursive {
            "recursion"
        } else if self.iterative {
            "iteration"
        } else {
            "sequential"
        }
    }
}

// ─── Entry Points ──────────────────────────────────────────────────

/// Analyze the primary function of a module. Helper functions defined
/// in the same file contribute their shape hashes to calls, so a
/// change inside a helper changes the caller's shape.
pub fn analyze_primary(module: &Module) -> FunctionAnalysis {
    let shape_hashes = shape_hash_module(module);
    analyze_fn(&module.primary().node, &shape_hashes)
}

/// Shape-hash every function in a module, with helper substitution.
fn shape_hash_module(module: &Module) -> HashMap<String, ContentHash> {
    // First pass without dependency info, second pass with it, the
    // standard fixed-point shortcut for shallow call graphs.
    let mut hashes = HashMap::new();
    for f in &module.functions {
        let h = hash_with(&f.node, NameMode::DeBruijn, &hashes);
        hashes.insert(f.node.name.node.clone(), h);
    }
    let mut stable = HashMap::new();
    for f in &module.functions {
        let h = hash_with(&f.node, NameMode::DeBruijn, &hashes);
        stable.insert(f.node.name.node.clone(), h);
    }
    stable
}

fn analyze_fn(func: &FunctionDef, shape_hashes: &HashMap<String, ContentHash>) -> FunctionAnalysis {
    let exact_hash = hash_with(func, NameMode::Exact, &HashMap::new());
    let shape_hash = hash_with(func, NameMode::DeBruijn, shape_hashes);

    let mut fingerprints = Vec::new();
    collect_fingerprints(&func.body, &mut fingerprints);

    let mut logic = LogicSummary::default();
    let mut control_flow = Vec::new();
    let mut outputs = Vec::new();
    let mut pattern = CompPattern {
        recursive: false,
        iterative: false,
    };
    for stmt in &func.body {
        walk_signals(
            stmt,
            &func.name.node,
            &mut logic,
            &mut control_flow,
            &mut outputs,
            &mut pattern,
        );
    }

    FunctionAnalysis {
        exact_hash,
        shape_hash,
        stmt_fingerprints: fingerprints,
        logic,
        control_flow,
        io: IoPattern {
            inputs: func.params.iter().map(|p| p.name.node.clone()).collect(),
            outputs,
        },
        pattern,
    }
}

fn hash_with(
    func: &FunctionDef,
    mode: NameMode,
    fn_hashes: &HashMap<String, ContentHash>,
) -> ContentHash {
    let mut normalizer = Normalizer::new(mode, func.name.node.clone(), fn_hashes.clone());
    let bytes = normalizer.normalize_fn(func);
    ContentHash(*blake3::hash(&bytes).as_bytes())
}

// ─── Signal Extraction ─────────────────────────────────────────────

fn walk_signals(
    stmt: &Spanned<Stmt>,
    fn_name: &str,
    logic: &mut LogicSummary,
    cf: &mut Vec<ControlNode>,
    outputs: &mut Vec<String>,
    pattern: &mut CompPattern,
) {
    match &stmt.node {
        Stmt::Assign { value, .. } => {
            logic.assignments += 1;
            walk_expr_signals(value, fn_name, logic, pattern);
        }
        Stmt::AugAssign { op, value, .. } => {
            logic.assignments += 1;
            count_op(*op, logic);
            walk_expr_signals(value, fn_name, logic, pattern);
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            logic.conditionals += 1;
            cf.push(ControlNode::If);
            walk_expr_signals(cond, fn_name, logic, pattern);
            for s in then_body {
                walk_signals(s, fn_name, logic, cf, outputs, pattern);
            }
            if let Some(else_body) = else_body {
                for s in else_body {
                    walk_signals(s, fn_name, logic, cf, outputs, pattern);
                }
            }
        }
        Stmt::While { cond, body } => {
            logic.loops += 1;
            pattern.iterative = true;
            cf.push(ControlNode::While);
            walk_expr_signals(cond, fn_name, logic, pattern);
            for s in body {
                walk_signals(s, fn_name, logic, cf, outputs, pattern);
            }
        }
        Stmt::For { iter, body, .. } => {
            logic.loops += 1;
            pattern.iterative = true;
            cf.push(ControlNode::For);
            match iter {
                ForIter::Range { start, end } => {
                    if let Some(start) = start {
                        walk_expr_signals(start, fn_name, logic, pattern);
                    }
                    walk_expr_signals(end, fn_name, logic, pattern);
                }
                ForIter::Seq(e) => walk_expr_signals(e, fn_name, logic, pattern),
            }
            for s in body {
                walk_signals(s, fn_name, logic, cf, outputs, pattern);
            }
        }
        Stmt::Return(value) => {
            logic.returns += 1;
            cf.push(ControlNode::Return);
            match value {
                Some(e) => {
                    walk_expr_signals(e, fn_name, logic, pattern);
                    let label = match &e.node {
                        Expr::Var(name) => name.clone(),
                        _ => "<expression>".to_string(),
                    };
                    if !outputs.contains(&label) {
                        outputs.push(label);
                    }
                }
                None => {
                    if !outputs.contains(&"None".to_string()) {
                        outputs.push("None".to_string());
                    }
                }
            }
        }
        Stmt::Expr(e) => walk_expr_signals(e, fn_name, logic, pattern),
        Stmt::Pass => {}
    }
}

fn walk_expr_signals(
    expr: &Spanned<Expr>,
    fn_name: &str,
    logic: &mut LogicSummary,
    pattern: &mut CompPattern,
) {
    match &expr.node {
        Expr::Literal(_) | Expr::Var(_) => {}
        Expr::UnaryOp { operand, .. } => walk_expr_signals(operand, fn_name, logic, pattern),
        Expr::BinOp { op, lhs, rhs } => {
            count_op(*op, logic);
            walk_expr_signals(lhs, fn_name, logic, pattern);
            walk_expr_signals(rhs, fn_name, logic, pattern);
        }
        Expr::Call { func, args } => {
            logic.calls += 1;
            if func.node == *fn_name {
                pattern.recursive = true;
            }
            for arg in args {
                walk_expr_signals(arg, fn_name, logic, pattern);
            }
        }
        Expr::Subscript { value, index } => {
            walk_expr_signals(value, fn_name, logic, pattern);
            walk_expr_signals(index, fn_name, logic, pattern);
        }
    }
}

fn count_op(op: BinOp, logic: &mut LogicSummary) {
    if op.is_arith() {
        logic.arith_ops += 1;
    } else if op.is_compare() {
        logic.comparisons += 1;
    }
}

// ─── Statement Fingerprints ────────────────────────────────────────

/// Fingerprint every statement at every level. Each fingerprint is
/// shallow: nested bodies are excluded (their statements fingerprint
/// separately), so reordering inside a branch still shows up as a
/// permutation of the same multiset.
fn collect_fingerprints(stmts: &[Spanned<Stmt>], out: &mut Vec<ContentHash>) {
    for stmt in stmts {
        let mut normalizer = Normalizer::new(NameMode::Erased, String::new(), HashMap::new());
        normalizer.buf.push(HASH_VERSION);
        normalizer.serialize_stmt_shallow(&stmt.node);
        out.push(ContentHash(*blake3::hash(&normalizer.buf).as_bytes()));

        match &stmt.node {
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_fingerprints(then_body, out);
                if let Some(else_body) = else_body {
                    collect_fingerprints(else_body, out);
                }
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => {
                collect_fingerprints(body, out);
            }
            _ => {}
        }
    }
}

// ─── Normalizer + Serializer ───────────────────────────────────────

/// How identifiers land in the serialization.
#[derive(Clone, Copy, PartialEq, Eq)]
enum NameMode {
    /// Names kept verbatim.
    Exact,
    /// Names replaced by de Bruijn indices (first binding = 0). The
    /// source language has flat function scope, so bindings never pop.
    DeBruijn,
    /// All names collapse to one placeholder.
    Erased,
}

struct Normalizer {
    buf: Vec<u8>,
    mode: NameMode,
    /// Order of first binding; index into this is the de Bruijn index.
    bindings: Vec<String>,
    /// Name of the function being serialized, for self-call detection.
    fn_name: String,
    /// Shape hashes of sibling functions, substituted into calls.
    fn_hashes: HashMap<String, ContentHash>,
}

impl Normalizer {
    fn new(mode: NameMode, fn_name: String, fn_hashes: HashMap<String, ContentHash>) -> Self {
        Self {
            buf: Vec::new(),
            mode,
            bindings: Vec::new(),
            fn_name,
            fn_hashes,
        }
    }

    fn normalize_fn(&mut self, func: &FunctionDef) -> Vec<u8> {
        self.buf.clear();
        self.bindings.clear();

        self.buf.push(HASH_VERSION);
        self.buf.push(TAG_FN_DEF);

        if self.mode == NameMode::Exact {
            self.write_str(&func.name.node);
        }

        self.write_u16(func.params.len() as u16);
        for param in &func.params {
            self.bind(&param.name.node);
        }

        self.write_u16(func.body.len() as u16);
        for stmt in &func.body {
            self.serialize_stmt(&stmt.node);
        }

        self.buf.clone()
    }

    /// Index of a variable, binding it on first sight. Flat scope:
    /// a name first assigned in a branch stays bound afterwards.
    fn bind(&mut self, name: &str) -> u16 {
        if let Some(idx) = self.bindings.iter().position(|b| b == name) {
            return idx as u16;
        }
        let idx = self.bindings.len() as u16;
        self.bindings.push(name.to_string());
        idx
    }

    fn write_var(&mut self, name: &str) {
        self.buf.push(TAG_VAR);
        match self.mode {
            NameMode::Exact => self.write_str(name),
            NameMode::DeBruijn => {
                let idx = self.bind(name);
                self.write_u16(idx);
            }
            NameMode::Erased => {}
        }
    }

    // ─── Statement Serialization ───────────────────────────────

    fn serialize_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { target, value } => {
                self.buf.push(TAG_ASSIGN);
                self.write_var(&target.node);
                self.serialize_expr(&value.node);
            }
            Stmt::AugAssign { target, op, value } => {
                self.buf.push(TAG_AUG_ASSIGN);
                self.buf.push(op_tag(*op));
                self.write_var(&target.node);
                self.serialize_expr(&value.node);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.buf.push(TAG_IF);
                self.serialize_expr(&cond.node);
                self.serialize_body(then_body);
                match else_body {
                    Some(else_body) => {
                        self.buf.push(1);
                        self.serialize_body(else_body);
                    }
                    None => self.buf.push(0),
                }
            }
            Stmt::While { cond, body } => {
                self.buf.push(TAG_WHILE);
                self.serialize_expr(&cond.node);
                self.serialize_body(body);
            }
            Stmt::For { var, iter, body } => {
                match iter {
                    ForIter::Range { start, end } => {
                        self.buf.push(TAG_FOR_RANGE);
                        self.write_var(&var.node);
                        match start {
                            Some(start) => {
                                self.buf.push(1);
                                self.serialize_expr(&start.node);
                            }
                            None => self.buf.push(0),
                        }
                        self.serialize_expr(&end.node);
                    }
                    ForIter::Seq(e) => {
                        self.buf.push(TAG_FOR_SEQ);
                        self.write_var(&var.node);
                        self.serialize_expr(&e.node);
                    }
                }
                self.serialize_body(body);
            }
            Stmt::Return(value) => {
                self.buf.push(TAG_RETURN);
                match value {
                    Some(v) => {
                        self.buf.push(1);
                        self.serialize_expr(&v.node);
                    }
                    None => self.buf.push(0),
                }
            }
            Stmt::Pass => self.buf.push(TAG_PASS),
            Stmt::Expr(e) => {
                self.buf.push(TAG_EXPR_STMT);
                self.serialize_expr(&e.node);
            }
        }
    }

    /// Like `serialize_stmt` but without nested bodies, for the
    /// reorder-detection fingerprints.
    fn serialize_stmt_shallow(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::If { cond, .. } => {
                self.buf.push(TAG_IF);
                self.serialize_expr(&cond.node);
            }
            Stmt::While { cond, .. } => {
                self.buf.push(TAG_WHILE);
                self.serialize_expr(&cond.node);
            }
            Stmt::For { var, iter, .. } => {
                match iter {
                    ForIter::Range { start, end } => {
                        self.buf.push(TAG_FOR_RANGE);
                        self.write_var(&var.node);
                        if let Some(start) = start {
                            self.buf.push(1);
                            self.serialize_expr(&start.node);
                        } else {
                            self.buf.push(0);
                        }
                        self.serialize_expr(&end.node);
                    }
                    ForIter::Seq(e) => {
                        self.buf.push(TAG_FOR_SEQ);
                        self.write_var(&var.node);
                        self.serialize_expr(&e.node);
                    }
                }
            }
            other => self.serialize_stmt(other),
        }
    }

    fn serialize_body(&mut self, stmts: &[Spanned<Stmt>]) {
        self.write_u16(stmts.len() as u16);
        for stmt in stmts {
            self.serialize_stmt(&stmt.node);
        }
    }

    // ─── Expression Serialization ──────────────────────────────

    fn serialize_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(Literal::Integer(n)) => {
                self.buf.push(TAG_INT_LIT);
                self.write_i128(*n);
            }
            Expr::Literal(Literal::Bool(b)) => {
                self.buf.push(TAG_BOOL_LIT);
                self.buf.push(if *b { 1 } else { 0 });
            }
            Expr::Literal(Literal::None) => {
                self.buf.push(TAG_NONE_LIT);
            }
            Expr::Var(name) => self.write_var(name),
            Expr::UnaryOp { op, operand } => {
                self.buf.push(match op {
                    UnOp::Neg => TAG_NEG,
                    UnOp::Not => TAG_NOT,
                });
                self.serialize_expr(&operand.node);
            }
            Expr::BinOp { op, lhs, rhs } => {
                self.buf.push(op_tag(*op));
                self.serialize_expr(&lhs.node);
                self.serialize_expr(&rhs.node);
            }
            Expr::Call { func, args } => {
                if self.mode != NameMode::Erased && func.node == self.fn_name {
                    self.buf.push(TAG_SELF_CALL);
                } else {
                    self.buf.push(TAG_CALL);
                    match self.mode {
                        NameMode::Exact => self.write_str(&func.node),
                        NameMode::DeBruijn => {
                            // Substitute the callee's shape hash so a
                            // helper change propagates to its callers.
                            match self.fn_hashes.get(&func.node).copied() {
                                Some(hash) => self.buf.extend_from_slice(&hash.0),
                                None => {
                                    self.buf.extend_from_slice(&ContentHash::zero().0);
                                    self.write_str(&func.node);
                                }
                            }
                        }
                        NameMode::Erased => {}
                    }
                }
                self.write_u16(args.len() as u16);
                for arg in args {
                    self.serialize_expr(&arg.node);
                }
            }
            Expr::Subscript { value, index } => {
                self.buf.push(TAG_SUBSCRIPT);
                self.serialize_expr(&value.node);
                self.serialize_expr(&index.node);
            }
        }
    }

    // ─── Serialization Helpers ─────────────────────────────────

    fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i128(&mut self, v: i128) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

fn op_tag(op: BinOp) -> u8 {
    match op {
        BinOp::Add => TAG_ADD,
        BinOp::Sub => TAG_SUB,
        BinOp::Mul => TAG_MUL,
        BinOp::FloorDiv => TAG_FLOOR_DIV,
        BinOp::Mod => TAG_MOD,
        BinOp::Eq => TAG_EQ,
        BinOp::Ne => TAG_NE,
        BinOp::Lt => TAG_LT,
        BinOp::Le => TAG_LE,
        BinOp::Gt => TAG_GT,
        BinOp::Ge => TAG_GE,
        BinOp::And => TAG_AND,
        BinOp::Or => TAG_OR,
    }
}

/// Equal multisets of statement fingerprints: one body permutes the
/// other.
pub fn same_statement_multiset(a: &[ContentHash], b: &[ContentHash]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> FunctionAnalysis {
        let module = crate::parse_source_silent(source, "test.py").unwrap();
        analyze_primary(&module)
    }

    #[test]
    fn test_identical_code_same_hashes() {
        let a = analyze("def f(x):\n    return x + 1\n");
        let b = analyze("def f(x):\n    return x + 1\n");
        assert_eq!(a.exact_hash, b.exact_hash);
        assert_eq!(a.shape_hash, b.shape_hash);
    }

    #[test]
    fn test_whitespace_does_not_affect_hash() {
        let a = analyze("def f(x):\n    return x + 1\n");
        let b = analyze("def f(x):\n    # comment\n    return x   +   1\n");
        assert_eq!(a.exact_hash, b.exact_hash, "layout must not change the exact hash");
    }

    #[test]
    fn test_rename_changes_exact_but_not_shape() {
        let a = analyze("def f(value):\n    total = value + 1\n    return total\n");
        let b = analyze("def f(v):\n    t = v + 1\n    return t\n");
        assert_ne!(a.exact_hash, b.exact_hash);
        assert_eq!(
            a.shape_hash, b.shape_hash,
            "consistent renaming should produce the same shape hash"
        );
    }

    #[test]
    fn test_function_rename_changes_exact_but_not_shape() {
        let a = analyze("def first(x):\n    return x + 1\n");
        let b = analyze("def second(x):\n    return x + 1\n");
        assert_ne!(a.exact_hash, b.exact_hash);
        assert_eq!(a.shape_hash, b.shape_hash);
    }

    #[test]
    fn test_recursive_rename_same_shape() {
        let a = analyze("def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n");
        let b = analyze("def factorial(m):\n    if m <= 1:\n        return 1\n    return m * factorial(m - 1)\n");
        assert_eq!(
            a.shape_hash, b.shape_hash,
            "self-calls must normalize independent of the function name"
        );
    }

    #[test]
    fn test_different_op_different_shape() {
        let a = analyze("def f(x):\n    return x + 1\n");
        let b = analyze("def f(x):\n    return x - 1\n");
        assert_ne!(a.shape_hash, b.shape_hash);
    }

    #[test]
    fn test_inconsistent_rename_different_shape() {
        let a = analyze("def f(x, y):\n    return x - y\n");
        let b = analyze("def f(x, y):\n    return y - x\n");
        assert_ne!(a.shape_hash, b.shape_hash, "swapped uses are not a consistent rename");
    }

    #[test]
    fn test_reorder_same_fingerprint_multiset() {
        let a = analyze("def f(x, y):\n    a = x + 1\n    b = y * 2\n    return a + b\n");
        let b = analyze("def f(x, y):\n    b = y * 2\n    a = x + 1\n    return a + b\n");
        assert_ne!(a.shape_hash, b.shape_hash, "reordering changes the shape");
        assert!(
            same_statement_multiset(&a.stmt_fingerprints, &b.stmt_fingerprints),
            "reordering must preserve the statement multiset"
        );
    }

    #[test]
    fn test_rewrite_breaks_fingerprint_multiset() {
        let a = analyze("def f(x):\n    return x + 1\n");
        let b = analyze("def f(x):\n    return x - (-1)\n");
        assert!(
            !same_statement_multiset(&a.stmt_fingerprints, &b.stmt_fingerprints),
            "rewritten expressions are not a reordering"
        );
    }

    #[test]
    fn test_nested_reorder_same_multiset() {
        let a = analyze(
            "def f(x):\n    if x > 0:\n        a = x + 1\n        b = x * 2\n        return a + b\n    return 0\n",
        );
        let b = analyze(
            "def f(x):\n    if x > 0:\n        b = x * 2\n        a = x + 1\n        return a + b\n    return 0\n",
        );
        assert!(same_statement_multiset(
            &a.stmt_fingerprints,
            &b.stmt_fingerprints
        ));
    }

    #[test]
    fn test_logic_summary_counts() {
        let a = analyze(
            "def f(n):\n    total = 0\n    for i in range(n):\n        total += i\n    return total\n",
        );
        assert_eq!(a.logic.assignments, 2);
        assert_eq!(a.logic.loops, 1);
        assert_eq!(a.logic.returns, 1);
        assert_eq!(a.logic.arith_ops, 1, "only the += adds an arithmetic op");
    }

    #[test]
    fn test_logic_mismatch_score() {
        let a = analyze("def f(x):\n    return x + 1\n");
        let b = analyze("def f(x):\n    y = x + 1\n    return y\n");
        assert_eq!(a.logic.mismatch(&b.logic), 1, "one extra assignment");
    }

    #[test]
    fn test_control_flow_sequence() {
        let a = analyze(
            "def f(n):\n    if n < 0:\n        return 0\n    while n > 0:\n        n -= 1\n    return n\n",
        );
        assert_eq!(
            a.control_flow,
            vec![
                ControlNode::If,
                ControlNode::Return,
                ControlNode::While,
                ControlNode::Return,
            ]
        );
    }

    #[test]
    fn test_io_pattern() {
        let a = analyze("def f(a, b):\n    c = a + b\n    return c\n");
        assert_eq!(a.io.inputs, vec!["a", "b"]);
        assert_eq!(a.io.outputs, vec!["c"]);
    }

    #[test]
    fn test_io_similarity() {
        let a = analyze("def f(a, b):\n    c = a + b\n    return c\n");
        let b = analyze("def f(a, b):\n    c = b + a\n    return c\n");
        assert!((a.io.similarity(&b.io) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pattern_iterative_vs_recursive() {
        let it = analyze("def f(n):\n    r = 1\n    for i in range(1, n + 1):\n        r *= i\n    return r\n");
        let rec = analyze("def f(n):\n    if n <= 1:\n        return 1\n    return n * f(n - 1)\n");
        assert_eq!(it.pattern.label(), "iteration");
        assert_eq!(rec.pattern.label(), "recursion");
    }

    #[test]
    fn test_hash_display() {
        let hash = ContentHash([0xAB; 32]);
        assert_eq!(hash.to_hex().len(), 64);
        assert_eq!(hash.to_short().len(), 8);
    }
}
