//! Syntax tree of the pattern language.

use super::diagnostics::Span;

/// A parsed script: statements in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    /// Top-level statements
    pub statements: Vec<Stmt>,
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Statement kind
    pub kind: StmtKind,
    /// Byte span
    pub span: Span,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `val name = value`
    Val {
        /// Bound name
        name: String,
        /// Span of the name
        name_span: Span,
        /// Initializer
        value: Expr,
    },
    /// Bare expression; the last one is the script's value
    Expr(Expr),
}

/// An expression with its span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Expression kind
    pub kind: ExprKind,
    /// Byte span
    pub span: Span,
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal
    Int(i64),
    /// String literal
    Str(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// Name reference
    Ident(String),
    /// `target.name`
    Member {
        /// Receiver
        target: Box<Expr>,
        /// Member name
        name: String,
    },
    /// `callee(args)`
    Call {
        /// Called expression
        callee: Box<Expr>,
        /// Arguments in source order
        args: Vec<Arg>,
    },
    /// `-operand`
    Neg(Box<Expr>),
    /// `lhs + rhs`
    Add(Box<Expr>, Box<Expr>),
}

/// A call argument, optionally named.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Parameter name for `name = value` arguments
    pub name: Option<String>,
    /// Span of the parameter name
    pub name_span: Option<Span>,
    /// Argument value
    pub value: Expr,
}

impl Expr {
    /// Dotted path for identifier/member chains, e.g. `AccessFlags.PUBLIC`.
    pub fn path(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name.clone()),
            ExprKind::Member { target, name } => target.path().map(|base| format!("{base}.{name}")),
            _ => None,
        }
    }
}
