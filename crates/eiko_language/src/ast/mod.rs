//! Abstract syntax tree for Eiko modules.
//!
//! The tree is fully owned: constructor bodies, property defaults and typedef
//! refinements are re-evaluated long after parsing (every time a resource is
//! instantiated or a value is coerced), so nodes live behind `Box`/`Rc`
//! rather than borrowing from an arena.
//!
//! Type annotations are a separate little tree ([`TypeExpr`]) produced by a
//! dedicated grammar, never by the expression parser — `list[int]` in
//! annotation position can therefore not be confused with an index
//! expression.

mod expr;
mod stmt;

pub use expr::{
    BinaryOp, BoolOp, CallArg, CompareOp, Expr, ExprKind, FStringPart, Literal, UnaryOp,
};
pub use stmt::{
    AssignTarget, ConstructorDecl, Decorator, EnumDecl, Module, Param, PropertyDecl, ResourceDecl,
    Stmt, StmtKind, TypedefDecl,
};

use eiko_base::{Span, Symbol};

/// A parsed type annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// `int`, `str`, `Host`, `Port`, ...
    Name(Symbol),
    /// `list[T]`, `dict[K, V]`, `Optional[T]`, `Union[A, B, ...]`.
    Generic { name: Symbol, args: Vec<TypeExpr> },
    /// `None` in annotation position (inside `Union`/`Optional` spellings).
    None,
}
