use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

/// Everything that went wrong while loading a module. `unsupported`
/// holds recognized-but-unmodeled constructs; when it is non-empty the
/// failure is reported as an unsupported-construct error rather than a
/// plain parse error.
#[derive(Debug)]
pub struct ParseFailure {
    pub diagnostics: Vec<Diagnostic>,
    pub unsupported: Vec<Spanned<String>>,
}

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    unsupported: Vec<Spanned<String>>,
    depth: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            unsupported: Vec::new(),
            depth: 0,
        }
    }

    /// Seed the parser with problems the lexer already found, so one
    /// failure value carries the whole story.
    pub(crate) fn with_lexer_output(
        mut self,
        diagnostics: Vec<Diagnostic>,
        unsupported: Vec<Spanned<String>>,
    ) -> Self {
        self.diagnostics = diagnostics;
        self.unsupported = unsupported;
        self
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "nesting depth exceeded (maximum 256 levels)",
                "flatten deeply nested expressions or blocks",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn parse_module(mut self) -> Result<Module, ParseFailure> {
        let mut functions = Vec::new();

        loop {
            match self.peek() {
                Lexeme::Eof => break,
                Lexeme::Newline => {
                    self.advance();
                }
                Lexeme::Def => {
                    let start = self.current_span();
                    let f = self.parse_def();
                    let span = start.merge(self.prev_span());
                    functions.push(Spanned::new(f, span));
                }
                Lexeme::At => {
                    self.push_unsupported("decorator", self.current_span());
                    self.skip_line();
                }
                Lexeme::Async => {
                    self.push_unsupported("async function", self.current_span());
                    self.skip_line_and_block();
                }
                Lexeme::Class => {
                    self.push_unsupported("class definition", self.current_span());
                    self.skip_line_and_block();
                }
                Lexeme::Import | Lexeme::From => {
                    self.push_unsupported("import statement", self.current_span());
                    self.skip_line();
                }
                Lexeme::Indent => {
                    self.error_at_current("unexpected indentation");
                    self.advance();
                }
                Lexeme::Dedent => {
                    self.advance();
                }
                _ => {
                    self.error_with_help(
                        &format!("expected 'def', found {}", self.peek().description()),
                        "each input file must define the function to compare at top level",
                    );
                    self.skip_line_and_block();
                }
            }
        }

        if functions.is_empty() && self.diagnostics.is_empty() {
            self.diagnostics.push(Diagnostic::error(
                "no function definition found".to_string(),
                self.current_span(),
            ));
        }

        self.validate_calls(&functions);

        if !self.diagnostics.is_empty() {
            return Err(ParseFailure {
                diagnostics: self.diagnostics,
                unsupported: self.unsupported,
            });
        }
        Ok(Module { functions })
    }

    fn parse_def(&mut self) -> FunctionDef {
        self.expect(&Lexeme::Def);
        let name = self.expect_ident();
        self.expect(&Lexeme::LParen);
        let params = self.parse_params();
        self.expect(&Lexeme::RParen);

        // Return annotation: accepted and ignored.
        if self.eat(&Lexeme::Arrow) {
            self.skip_annotation(&[Lexeme::Colon]);
        }
        self.expect(&Lexeme::Colon);

        let body = self.parse_suite();
        FunctionDef { name, params, body }
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            if self.at(&Lexeme::Star) || self.at(&Lexeme::StarStar) {
                self.push_unsupported("starred parameter", self.current_span());
                self.advance();
            }
            let name = self.expect_ident();
            params.push(Param { name });

            // Annotation: accepted and ignored.
            if self.eat(&Lexeme::Colon) {
                self.skip_annotation(&[Lexeme::Comma, Lexeme::RParen, Lexeme::Eq]);
            }
            if self.at(&Lexeme::Eq) {
                self.push_unsupported("default parameter value", self.current_span());
                self.advance();
                self.skip_annotation(&[Lexeme::Comma, Lexeme::RParen]);
            }
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        params
    }

    /// Consume annotation tokens up to (not including) any of `stop`,
    /// respecting nested brackets so `Dict[str, int]` skips whole.
    fn skip_annotation(&mut self, stop: &[Lexeme]) {
        let mut depth = 0usize;
        loop {
            if self.at(&Lexeme::Eof) || self.at(&Lexeme::Newline) {
                return;
            }
            if depth == 0 && stop.iter().any(|s| self.at(s)) {
                return;
            }
            match self.peek() {
                Lexeme::LParen | Lexeme::LBracket => depth += 1,
                Lexeme::RParen | Lexeme::RBracket => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // --- Statements ---

    /// A suite is either an indented block or simple statements on the
    /// header line: `if x: return 1`.
    fn parse_suite(&mut self) -> Vec<Spanned<Stmt>> {
        if !self.enter_nesting() {
            return Vec::new();
        }
        let stmts = if self.eat(&Lexeme::Newline) {
            self.expect(&Lexeme::Indent);
            let mut stmts = Vec::new();
            while !self.at(&Lexeme::Dedent) && !self.at(&Lexeme::Eof) {
                if self.eat(&Lexeme::Newline) {
                    continue;
                }
                stmts.extend(self.parse_statement_line());
            }
            self.expect(&Lexeme::Dedent);
            stmts
        } else {
            self.parse_statement_line()
        };
        self.exit_nesting();
        stmts
    }

    /// One logical line: a compound statement, or `;`-separated simple
    /// statements terminated by a newline.
    fn parse_statement_line(&mut self) -> Vec<Spanned<Stmt>> {
        match self.peek() {
            Lexeme::If => return vec![self.parse_if()],
            Lexeme::While => return vec![self.parse_while()],
            Lexeme::For => return vec![self.parse_for()],
            Lexeme::Def => {
                self.push_unsupported("nested function definition", self.current_span());
                self.skip_line_and_block();
                return Vec::new();
            }
            Lexeme::Try => {
                self.push_unsupported("try/except", self.current_span());
                self.skip_line_and_block();
                // Consume the handler arms so they don't cascade.
                while matches!(
                    self.peek(),
                    Lexeme::Except | Lexeme::Finally | Lexeme::Else
                ) {
                    self.skip_line_and_block();
                }
                return Vec::new();
            }
            Lexeme::Except | Lexeme::Finally => {
                self.error_at_current(&format!(
                    "{} without a matching 'try'",
                    self.peek().description()
                ));
                self.skip_line_and_block();
                return Vec::new();
            }
            Lexeme::With => {
                self.push_unsupported("with statement", self.current_span());
                self.skip_line_and_block();
                return Vec::new();
            }
            Lexeme::Class => {
                self.push_unsupported("class definition", self.current_span());
                self.skip_line_and_block();
                return Vec::new();
            }
            Lexeme::Async => {
                self.push_unsupported("async function", self.current_span());
                self.skip_line_and_block();
                return Vec::new();
            }
            _ => {}
        }

        let mut stmts = vec![self.parse_simple_stmt()];
        while self.eat(&Lexeme::Semicolon) {
            if self.at(&Lexeme::Newline) {
                break;
            }
            stmts.push(self.parse_simple_stmt());
        }
        self.expect(&Lexeme::Newline);
        stmts
    }

    fn parse_if(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.advance(); // if / elif
        let cond = self.parse_expr();
        self.expect(&Lexeme::Colon);
        let then_body = self.parse_suite();

        let else_body = if self.at(&Lexeme::Elif) {
            // elif chains become a nested If, the shape the source
            // language's own tree uses.
            let nested = self.parse_if();
            Some(vec![nested])
        } else if self.eat(&Lexeme::Else) {
            self.expect(&Lexeme::Colon);
            Some(self.parse_suite())
        } else {
            None
        };

        let span = start.merge(self.prev_span());
        Spanned::new(
            Stmt::If {
                cond,
                then_body,
                else_body,
            },
            span,
        )
    }

    fn parse_while(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.expect(&Lexeme::While);
        let cond = self.parse_expr();
        self.expect(&Lexeme::Colon);
        let body = self.parse_suite();
        self.check_loop_else();
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::While { cond, body }, span)
    }

    fn check_loop_else(&mut self) {
        if self.at(&Lexeme::Else) {
            self.push_unsupported("loop else clause", self.current_span());
            self.advance();
            self.expect(&Lexeme::Colon);
            let _ = self.parse_suite();
        }
    }

    fn parse_for(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();
        self.expect(&Lexeme::For);
        let var = self.expect_ident();
        self.expect(&Lexeme::In);

        let iter = if self.at_range_call() {
            self.advance(); // range
            self.expect(&Lexeme::LParen);
            let first = self.parse_expr();
            let iter = if self.eat(&Lexeme::Comma) {
                let end = self.parse_expr();
                if self.eat(&Lexeme::Comma) {
                    self.push_unsupported("range with a step", self.current_span());
                    self.parse_expr();
                }
                ForIter::Range {
                    start: Some(Box::new(first)),
                    end: Box::new(end),
                }
            } else {
                ForIter::Range {
                    start: None,
                    end: Box::new(first),
                }
            };
            self.expect(&Lexeme::RParen);
            iter
        } else {
            ForIter::Seq(Box::new(self.parse_expr()))
        };

        self.expect(&Lexeme::Colon);
        let body = self.parse_suite();
        self.check_loop_else();
        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::For { var, iter, body }, span)
    }

    fn at_range_call(&self) -> bool {
        if let Lexeme::Ident(name) = self.peek() {
            name == "range"
                && self
                    .tokens
                    .get(self.pos + 1)
                    .is_some_and(|t| t.node == Lexeme::LParen)
        } else {
            false
        }
    }

    fn parse_simple_stmt(&mut self) -> Spanned<Stmt> {
        let start = self.current_span();

        match self.peek() {
            Lexeme::Return => {
                self.advance();
                let value = if self.at(&Lexeme::Newline) || self.at(&Lexeme::Semicolon) {
                    None
                } else {
                    let expr = self.parse_expr();
                    if self.at(&Lexeme::Comma) {
                        self.push_unsupported("tuple expression", self.current_span());
                        self.skip_line_tokens();
                    }
                    Some(expr)
                };
                let span = start.merge(self.prev_span());
                return Spanned::new(Stmt::Return(value), span);
            }
            Lexeme::Pass => {
                self.advance();
                return Spanned::new(Stmt::Pass, start);
            }
            Lexeme::Raise => {
                self.push_unsupported("raise statement", start);
                self.skip_line_tokens();
                return Spanned::new(Stmt::Pass, start);
            }
            Lexeme::Global => {
                self.push_unsupported("global statement", start);
                self.skip_line_tokens();
                return Spanned::new(Stmt::Pass, start);
            }
            Lexeme::Nonlocal => {
                self.push_unsupported("nonlocal statement", start);
                self.skip_line_tokens();
                return Spanned::new(Stmt::Pass, start);
            }
            Lexeme::Del => {
                self.push_unsupported("del statement", start);
                self.skip_line_tokens();
                return Spanned::new(Stmt::Pass, start);
            }
            Lexeme::Assert => {
                self.push_unsupported("assert statement", start);
                self.skip_line_tokens();
                return Spanned::new(Stmt::Pass, start);
            }
            Lexeme::Import | Lexeme::From => {
                self.push_unsupported("import statement", start);
                self.skip_line_tokens();
                return Spanned::new(Stmt::Pass, start);
            }
            Lexeme::Yield => {
                self.push_unsupported("yield expression", start);
                self.skip_line_tokens();
                return Spanned::new(Stmt::Pass, start);
            }
            _ => {}
        }

        // Expression statement or assignment.
        let expr = self.parse_expr();

        if let Some(op) = self.at_aug_assign() {
            let target = self.assign_target(expr);
            self.advance();
            let value = self.parse_expr();
            let span = start.merge(self.prev_span());
            return Spanned::new(Stmt::AugAssign { target, op, value }, span);
        }

        if self.at(&Lexeme::Eq) {
            let target = self.assign_target(expr);
            self.advance();
            let value = self.parse_expr();
            if self.at(&Lexeme::Eq) {
                self.push_unsupported("chained assignment", self.current_span());
                self.skip_line_tokens();
            }
            let span = start.merge(self.prev_span());
            return Spanned::new(Stmt::Assign { target, value }, span);
        }

        if self.at(&Lexeme::Comma) {
            self.push_unsupported("multiple assignment targets", self.current_span());
            self.skip_line_tokens();
        }

        let span = start.merge(self.prev_span());
        Spanned::new(Stmt::Expr(expr), span)
    }

    fn at_aug_assign(&self) -> Option<BinOp> {
        match self.peek() {
            Lexeme::PlusEq => Some(BinOp::Add),
            Lexeme::MinusEq => Some(BinOp::Sub),
            Lexeme::StarEq => Some(BinOp::Mul),
            Lexeme::SlashSlashEq => Some(BinOp::FloorDiv),
            Lexeme::PercentEq => Some(BinOp::Mod),
            _ => None,
        }
    }

    /// Reduce an already-parsed expression to an assignment target.
    fn assign_target(&mut self, expr: Spanned<Expr>) -> Spanned<String> {
        match expr.node {
            Expr::Var(name) => Spanned::new(name, expr.span),
            Expr::Subscript { .. } => {
                self.push_unsupported("subscript assignment", expr.span);
                Spanned::new("_error_".to_string(), expr.span)
            }
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    "invalid assignment target".to_string(),
                    expr.span,
                ));
                Spanned::new("_error_".to_string(), expr.span)
            }
        }
    }

    // --- Expressions ---

    fn parse_expr(&mut self) -> Spanned<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Spanned<Expr> {
        if !self.enter_nesting() {
            return Spanned::new(Expr::Literal(Literal::Integer(0)), self.current_span());
        }

        let mut lhs = match self.peek() {
            Lexeme::Not => {
                let start = self.current_span();
                self.advance();
                let operand = self.parse_expr_bp(NOT_RBP);
                let span = start.merge(operand.span);
                Spanned::new(
                    Expr::UnaryOp {
                        op: UnOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                )
            }
            Lexeme::Minus => {
                let start = self.current_span();
                self.advance();
                let operand = self.parse_expr_bp(NEG_RBP);
                let span = start.merge(operand.span);
                Spanned::new(
                    Expr::UnaryOp {
                        op: UnOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                )
            }
            Lexeme::Plus => {
                // Unary plus is the identity.
                self.advance();
                self.parse_expr_bp(NEG_RBP)
            }
            _ => {
                let primary = self.parse_primary();
                self.parse_postfix(primary)
            }
        };

        // Tracks whether the previous operator consumed at this level
        // was a comparison; a second one means a chained comparison.
        let mut prev_compare = false;

        loop {
            if self.at(&Lexeme::StarStar) {
                self.push_unsupported("power operator '**'", self.current_span());
                self.advance();
                let _ = self.parse_expr_bp(NEG_RBP);
                continue;
            }
            if self.at(&Lexeme::Slash) {
                self.push_unsupported("true division '/'", self.current_span());
                self.advance();
                let _ = self.parse_expr_bp(NEG_RBP);
                continue;
            }
            if self.at(&Lexeme::Is) {
                self.push_unsupported("identity comparison 'is'", self.current_span());
                self.advance();
                self.eat(&Lexeme::Not);
                let _ = self.parse_expr_bp(NEG_RBP);
                continue;
            }
            if self.at(&Lexeme::In) {
                self.push_unsupported("membership test 'in'", self.current_span());
                self.advance();
                let _ = self.parse_expr_bp(NEG_RBP);
                continue;
            }

            let op = match self.peek() {
                Lexeme::Or => BinOp::Or,
                Lexeme::And => BinOp::And,
                Lexeme::EqEq => BinOp::Eq,
                Lexeme::BangEq => BinOp::Ne,
                Lexeme::Lt => BinOp::Lt,
                Lexeme::LtEq => BinOp::Le,
                Lexeme::Gt => BinOp::Gt,
                Lexeme::GtEq => BinOp::Ge,
                Lexeme::Plus => BinOp::Add,
                Lexeme::Minus => BinOp::Sub,
                Lexeme::Star => BinOp::Mul,
                Lexeme::SlashSlash => BinOp::FloorDiv,
                Lexeme::Percent => BinOp::Mod,
                _ => break,
            };

            let (l_bp, r_bp) = op_binding_power(op);
            if l_bp < min_bp {
                break;
            }

            // `a < b < c` is a chained comparison with different
            // semantics; reject rather than silently misparse.
            if op.is_compare() {
                if prev_compare {
                    self.push_unsupported("chained comparison", self.current_span());
                }
                prev_compare = true;
            } else {
                prev_compare = false;
            }

            self.advance(); // consume operator
            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::BinOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        self.exit_nesting();
        lhs
    }

    fn parse_primary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();

        match self.peek().clone() {
            Lexeme::Integer(n) => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Integer(n)), start)
            }
            Lexeme::True => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Bool(true)), start)
            }
            Lexeme::False => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Bool(false)), start)
            }
            Lexeme::NoneKw => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::None), start)
            }
            Lexeme::LParen => {
                self.advance();
                let first = self.parse_expr();
                if self.at(&Lexeme::Comma) {
                    self.push_unsupported("tuple expression", self.current_span());
                    while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
                        self.advance();
                    }
                }
                self.expect(&Lexeme::RParen);
                first
            }
            Lexeme::LBracket => {
                self.push_unsupported("list literal", start);
                self.skip_balanced(&Lexeme::LBracket, &Lexeme::RBracket);
                Spanned::new(Expr::Literal(Literal::Integer(0)), start)
            }
            Lexeme::LBrace => {
                self.push_unsupported("dict or set literal", start);
                self.skip_balanced(&Lexeme::LBrace, &Lexeme::RBrace);
                Spanned::new(Expr::Literal(Literal::Integer(0)), start)
            }
            Lexeme::Lambda => {
                self.push_unsupported("lambda expression", start);
                self.advance();
                while !self.at(&Lexeme::Colon) && !self.at(&Lexeme::Newline) && !self.at(&Lexeme::Eof)
                {
                    self.advance();
                }
                if self.eat(&Lexeme::Colon) {
                    let _ = self.parse_expr();
                }
                Spanned::new(Expr::Literal(Literal::Integer(0)), start)
            }
            Lexeme::Ident(name) => {
                self.advance();
                Spanned::new(Expr::Var(name), start)
            }
            _ => {
                self.error_with_help(
                    &format!("expected expression, found {}", self.peek().description()),
                    "expressions include integer literals, names, calls, and operators",
                );
                self.advance();
                Spanned::new(Expr::Literal(Literal::Integer(0)), start)
            }
        }
    }

    /// Postfix operations: calls, subscripts, attribute access.
    fn parse_postfix(&mut self, mut expr: Spanned<Expr>) -> Spanned<Expr> {
        loop {
            if self.at(&Lexeme::LParen) {
                let func = match &expr.node {
                    Expr::Var(name) => Spanned::new(name.clone(), expr.span),
                    _ => {
                        self.diagnostics.push(Diagnostic::error(
                            "only named functions can be called".to_string(),
                            expr.span,
                        ));
                        Spanned::new("_error_".to_string(), expr.span)
                    }
                };
                self.advance();
                let args = self.parse_call_args();
                self.expect(&Lexeme::RParen);
                let span = expr.span.merge(self.prev_span());
                expr = Spanned::new(Expr::Call { func, args }, span);
            } else if self.at(&Lexeme::LBracket) {
                self.advance();
                let index = self.parse_expr();
                if self.at(&Lexeme::Colon) {
                    self.push_unsupported("slice expression", self.current_span());
                    while !self.at(&Lexeme::RBracket) && !self.at(&Lexeme::Eof) {
                        self.advance();
                    }
                }
                self.expect(&Lexeme::RBracket);
                let span = expr.span.merge(self.prev_span());
                expr = Spanned::new(
                    Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else if self.at(&Lexeme::Dot) {
                self.push_unsupported("attribute access", self.current_span());
                self.advance();
                let _ = self.try_ident();
            } else {
                break;
            }
        }
        expr
    }

    fn parse_call_args(&mut self) -> Vec<Spanned<Expr>> {
        let mut args = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            if self.at(&Lexeme::Star) || self.at(&Lexeme::StarStar) {
                self.push_unsupported("starred argument", self.current_span());
                self.advance();
            }
            let arg = self.parse_expr();
            if self.at(&Lexeme::Eq) {
                self.push_unsupported("keyword argument", self.current_span());
                self.advance();
                let _ = self.parse_expr();
            }
            args.push(arg);
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        args
    }

    // --- Call validation ---

    /// Calls may target a function defined in the file (inlined during
    /// execution) or the `len` builtin. Anything else leaves the model.
    fn validate_calls(&mut self, functions: &[Spanned<FunctionDef>]) {
        let defined: Vec<String> = functions.iter().map(|f| f.node.name.node.clone()).collect();
        let mut found: Vec<(String, Span)> = Vec::new();
        for f in functions {
            for stmt in &f.node.body {
                collect_calls_stmt(stmt, &mut found);
            }
        }
        for (name, span) in found {
            if name == "range" {
                self.push_unsupported("range outside a for loop header", span);
            } else if name != "len" && !defined.contains(&name) {
                self.push_unsupported(&format!("external function call '{}'", name), span);
            }
        }
    }

    // --- Recovery helpers ---

    /// Skip to the end of the current logical line, consuming the newline.
    fn skip_line(&mut self) {
        self.skip_line_tokens();
        self.eat(&Lexeme::Newline);
    }

    /// Skip line tokens but leave the newline for the caller.
    fn skip_line_tokens(&mut self) {
        while !self.at(&Lexeme::Newline) && !self.at(&Lexeme::Eof) {
            self.advance();
        }
    }

    /// Skip a statement and, if one follows, its indented block.
    fn skip_line_and_block(&mut self) {
        self.skip_line();
        if self.at(&Lexeme::Indent) {
            let mut depth = 0usize;
            loop {
                match self.peek() {
                    Lexeme::Indent => depth += 1,
                    Lexeme::Dedent => {
                        depth -= 1;
                        if depth == 0 {
                            self.advance();
                            break;
                        }
                    }
                    Lexeme::Eof => break,
                    _ => {}
                }
                self.advance();
            }
        }
    }

    fn skip_balanced(&mut self, open: &Lexeme, close: &Lexeme) {
        let mut depth = 0usize;
        loop {
            if self.at(&Lexeme::Eof) {
                return;
            }
            if self.at(open) {
                depth += 1;
            } else if self.at(close) {
                depth -= 1;
                if depth == 0 {
                    self.advance();
                    return;
                }
            }
            self.advance();
        }
    }

    // --- Utility methods ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            self.current_span()
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().description()
            ));
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    fn try_ident(&mut self) -> Option<Spanned<String>> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Some(Spanned::new(name, span))
        } else {
            None
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }

    fn push_unsupported(&mut self, construct: &str, span: Span) {
        self.diagnostics.push(Diagnostic::error(
            format!("unsupported construct: {}", construct),
            span,
        ));
        self.unsupported
            .push(Spanned::new(construct.to_string(), span));
    }
}

fn collect_calls_stmt(stmt: &Spanned<Stmt>, out: &mut Vec<(String, Span)>) {
    match &stmt.node {
        Stmt::Assign { value, .. } | Stmt::AugAssign { value, .. } => {
            collect_calls_expr(value, out)
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            collect_calls_expr(cond, out);
            for s in then_body {
                collect_calls_stmt(s, out);
            }
            if let Some(else_body) = else_body {
                for s in else_body {
                    collect_calls_stmt(s, out);
                }
            }
        }
        Stmt::While { cond, body } => {
            collect_calls_expr(cond, out);
            for s in body {
                collect_calls_stmt(s, out);
            }
        }
        Stmt::For { iter, body, .. } => {
            match iter {
                ForIter::Range { start, end } => {
                    if let Some(start) = start {
                        collect_calls_expr(start, out);
                    }
                    collect_calls_expr(end, out);
                }
                ForIter::Seq(e) => collect_calls_expr(e, out),
            }
            for s in body {
                collect_calls_stmt(s, out);
            }
        }
        Stmt::Return(Some(e)) | Stmt::Expr(e) => collect_calls_expr(e, out),
        Stmt::Return(None) | Stmt::Pass => {}
    }
}

fn collect_calls_expr(expr: &Spanned<Expr>, out: &mut Vec<(String, Span)>) {
    match &expr.node {
        Expr::Literal(_) | Expr::Var(_) => {}
        Expr::UnaryOp { operand, .. } => collect_calls_expr(operand, out),
        Expr::BinOp { lhs, rhs, .. } => {
            collect_calls_expr(lhs, out);
            collect_calls_expr(rhs, out);
        }
        Expr::Call { func, args } => {
            out.push((func.node.clone(), func.span));
            for arg in args {
                collect_calls_expr(arg, out);
            }
        }
        Expr::Subscript { value, index } => {
            collect_calls_expr(value, out);
            collect_calls_expr(index, out);
        }
    }
}

const NOT_RBP: u8 = 5;
const NEG_RBP: u8 = 13;

/// Returns (left binding power, right binding power) for a binary
/// operator. Higher binding power = higher precedence.
fn op_binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 2),
        BinOp::And => (3, 4),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (7, 8),
        BinOp::Add | BinOp::Sub => (9, 10),
        BinOp::Mul | BinOp::FloorDiv | BinOp::Mod => (11, 12),
    }
}
