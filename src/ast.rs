use crate::span::Spanned;

/// A parsed source file: one or more function definitions.
///
/// A comparison run uses the first definition in each file; the parser
/// accepts trailing helper definitions so real files load unchanged.
#[derive(Clone, Debug)]
pub struct Module {
    pub functions: Vec<Spanned<FunctionDef>>,
}

impl Module {
    /// The function under comparison (the first definition).
    pub fn primary(&self) -> &Spanned<FunctionDef> {
        &self.functions[0]
    }
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub body: Vec<Spanned<Stmt>>,
}

/// A parameter. Annotations are accepted in source but dropped here;
/// sorts come from the inferencer, not from hints.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: Spanned<String>,
}

/// Statements. `elif` chains arrive as nested `If` in the else branch,
/// matching the source language's own tree shape.
#[derive(Clone, Debug)]
pub enum Stmt {
    Assign {
        target: Spanned<String>,
        value: Spanned<Expr>,
    },
    AugAssign {
        target: Spanned<String>,
        op: BinOp,
        value: Spanned<Expr>,
    },
    If {
        cond: Spanned<Expr>,
        then_body: Vec<Spanned<Stmt>>,
        else_body: Option<Vec<Spanned<Stmt>>>,
    },
    While {
        cond: Spanned<Expr>,
        body: Vec<Spanned<Stmt>>,
    },
    For {
        var: Spanned<String>,
        iter: ForIter,
        body: Vec<Spanned<Stmt>>,
    },
    Return(Option<Spanned<Expr>>),
    Pass,
    Expr(Spanned<Expr>),
}

/// The iterable of a `for` loop.
#[derive(Clone, Debug)]
pub enum ForIter {
    /// `range(end)` or `range(start, end)`.
    Range {
        start: Option<Box<Spanned<Expr>>>,
        end: Box<Spanned<Expr>>,
    },
    /// Any other iterable expression. Sorts as a sequence; the
    /// executor rejects it when reached.
    Seq(Box<Spanned<Expr>>),
}

/// Expressions.
#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Literal),
    Var(String),
    UnaryOp {
        op: UnOp,
        operand: Box<Spanned<Expr>>,
    },
    BinOp {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Call {
        func: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    Subscript {
        value: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Integer(i128),
    Bool(bool),
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg, // -
    Not, // not
}

impl UnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "not",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,      // +
    Sub,      // -
    Mul,      // *
    FloorDiv, // //
    Mod,      // %
    Eq,       // ==
    Ne,       // !=
    Lt,       // <
    Le,       // <=
    Gt,       // >
    Ge,       // >=
    And,      // and
    Or,       // or
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    /// Arithmetic operators, the source language's `BinOp` category.
    pub fn is_arith(&self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::FloorDiv | BinOp::Mod
        )
    }

    pub fn is_compare(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}
