//! Statement and declaration nodes.

use eiko_base::{Span, Symbol};

use super::{Expr, TypeExpr};

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Left side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// `name = ...`
    Name(Symbol),
    /// `self.prop = ...` — only legal inside constructor bodies.
    SelfAttr(Symbol),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    /// `target = value`, optionally annotated (`name: type = value`).
    Assign {
        target: AssignTarget,
        target_span: Span,
        annotation: Option<TypeExpr>,
        value: Expr,
    },
    /// Forward declaration: `name: type` with no value. The name may be
    /// assigned exactly once later.
    Declare {
        name: Symbol,
        annotation: TypeExpr,
    },
    If {
        /// `(condition, body)` for the `if` and every `elif`, in order.
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
    For {
        var: Symbol,
        var_span: Span,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `import a.b [as c]`
    Import {
        path: Vec<Symbol>,
        alias: Option<Symbol>,
    },
    /// `from [.]*a.b import x [as y], z`
    FromImport {
        /// Number of leading dots (relative import depth).
        dots: usize,
        path: Vec<Symbol>,
        names: Vec<(Symbol, Option<Symbol>)>,
    },
    Resource(ResourceDecl),
    Typedef(TypedefDecl),
    Enum(EnumDecl),
    /// A lone `...` — does nothing. Also the whole body of an
    /// inherit-unchanged resource.
    Pass,
}

/// A decorator that is not one of the two the evaluator understands;
/// kept for the diagnostic it will produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub name: Symbol,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    pub name: Symbol,
    pub name_span: Span,
    pub parent: Option<(Symbol, Span)>,
    /// From `@index([...])`; literal property paths.
    pub index_keys: Option<Vec<String>>,
    pub properties: Vec<PropertyDecl>,
    pub constructors: Vec<ConstructorDecl>,
    /// Body was a single `...`: inherit the parent schema unchanged.
    pub inherit_only: bool,
    pub extra_decorators: Vec<Decorator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: Symbol,
    pub name_span: Span,
    pub annotation: TypeExpr,
    pub default: Option<Expr>,
    /// Declared with the `promise` marker; filled during deploy.
    pub promise: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Symbol,
    pub annotation: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub span: Span,
}

/// One constructor overload (`def __init__` or `implement <name>`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub name: Symbol,
    /// Parameters after the leading `self`.
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// From `@constraint(<expr>)`.
    pub constraint: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedefDecl {
    pub name: Symbol,
    pub name_span: Span,
    pub base: TypeExpr,
    /// `typedef Name base if <refinement>`; `self` is bound to the
    /// candidate value during coercion.
    pub refinement: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Symbol,
    pub name_span: Span,
    pub members: Vec<(Symbol, Span)>,
    pub span: Span,
}
