//! The Eiko type lattice.
//!
//! Types are values in this compiler (a resource declaration binds its name
//! to a [`Type`]), so the representation is cheap to clone: structural
//! variants own their parts, nominal variants (`Resource`, `Typedef`,
//! `Enum`) hang off `Rc`'d definition records that also remember the module
//! they came from for diagnostics.
//!
//! Subtyping is small and closed:
//!
//! - a typedef is a subtype of its base;
//! - a derived resource is a subtype of every ancestor;
//! - `T` is a subtype of `Optional[T]` and of any union containing it;
//! - lists and dicts are covariant (safe — all values are immutable).
//!
//! Coercion (the value-level companion) lives in the evaluator because
//! typedef refinements must be evaluated; the purely structural questions
//! are answered here.

use std::fmt;
use std::rc::Rc;

use eiko_base::Span;
use eiko_language::ast::Expr;

use crate::resource::ResourceDef;

/// A named refinement of a base type (`typedef Port int if ...`).
#[derive(Debug)]
pub struct TypedefInfo {
    pub name: String,
    /// Module the typedef was declared in, for diagnostics.
    pub module: String,
    pub base: Type,
    /// Predicate over `self`; `None` means the typedef is a bare rename.
    pub refinement: Option<Expr>,
    pub span: Span,
}

/// An enum declaration: a closed set of named members.
#[derive(Debug)]
pub struct EnumInfo {
    pub name: String,
    pub module: String,
    pub members: Vec<String>,
}

impl EnumInfo {
    pub fn member_index(&self, name: &str) -> Option<u32> {
        self.members.iter().position(|m| m == name).map(|i| i as u32)
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    Bool,
    Int,
    Float,
    Str,
    /// A string that is redacted in every user-visible message.
    ProtectedStr,
    Path,
    None,
    List(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Optional(Box<Type>),
    Union(Vec<Type>),
    Resource(Rc<ResourceDef>),
    Typedef(Rc<TypedefInfo>),
    Enum(Rc<EnumInfo>),
    /// The type of a module namespace value.
    Module,
    /// The type of a host plugin function value.
    Plugin,
    /// The type of a type value itself (what `int` evaluates to).
    Meta,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Bool, Type::Bool)
            | (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::Str, Type::Str)
            | (Type::ProtectedStr, Type::ProtectedStr)
            | (Type::Path, Type::Path)
            | (Type::None, Type::None)
            | (Type::Module, Type::Module)
            | (Type::Plugin, Type::Plugin)
            | (Type::Meta, Type::Meta) => true,
            (Type::List(a), Type::List(b)) => a == b,
            (Type::Dict(ak, av), Type::Dict(bk, bv)) => ak == bk && av == bv,
            (Type::Optional(a), Type::Optional(b)) => a == b,
            (Type::Union(a), Type::Union(b)) => {
                a.len() == b.len()
                    && a.iter().all(|t| b.contains(t))
                    && b.iter().all(|t| a.contains(t))
            }
            (Type::Resource(a), Type::Resource(b)) => Rc::ptr_eq(a, b),
            (Type::Typedef(a), Type::Typedef(b)) => Rc::ptr_eq(a, b),
            (Type::Enum(a), Type::Enum(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Str => write!(f, "str"),
            Type::ProtectedStr => write!(f, "ProtectedStr"),
            Type::Path => write!(f, "Path"),
            Type::None => write!(f, "None"),
            Type::List(t) => write!(f, "list[{t}]"),
            Type::Dict(k, v) => write!(f, "dict[{k}, {v}]"),
            Type::Optional(t) => write!(f, "Optional[{t}]"),
            Type::Union(ts) => {
                write!(f, "Union[")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
            Type::Resource(def) => write!(f, "{}", def.name),
            Type::Typedef(td) => write!(f, "{}", td.name),
            Type::Enum(e) => write!(f, "{}", e.name),
            Type::Module => write!(f, "module"),
            Type::Plugin => write!(f, "plugin"),
            Type::Meta => write!(f, "type"),
        }
    }
}

impl Type {
    /// Strips typedef layers down to the underlying structural base.
    pub fn base(&self) -> &Type {
        match self {
            Type::Typedef(td) => td.base.base(),
            other => other,
        }
    }

    /// May values of this type key a dict? (`bool | int | str | enum`,
    /// including typedefs over them.)
    pub fn is_dict_key(&self) -> bool {
        matches!(self.base(), Type::Bool | Type::Int | Type::Str | Type::Enum(_))
    }

    /// May a resource whose first property has this type fall back to that
    /// property as its index?
    pub fn is_indexable(&self) -> bool {
        matches!(self.base(), Type::Str | Type::Int | Type::Path | Type::Enum(_))
    }
}

/// Is `sub` usable wherever `sup` is expected, without any value conversion?
pub fn is_subtype(sub: &Type, sup: &Type) -> bool {
    if sub == sup {
        return true;
    }
    match (sub, sup) {
        // Protected strings read as strings.
        (Type::ProtectedStr, Type::Str) => true,
        (Type::Typedef(td), _) => is_subtype(&td.base, sup),
        (Type::Resource(sub_def), Type::Resource(sup_def)) => {
            let mut cur = Some(sub_def.clone());
            while let Some(def) = cur {
                if Rc::ptr_eq(&def, sup_def) {
                    return true;
                }
                cur = def.parent.clone();
            }
            false
        }
        // A union on the left decomposes first, so e.g.
        // Union[str, None] <= Optional[str] holds member-wise.
        (Type::Union(subs), _) => subs.iter().all(|s| is_subtype(s, sup)),
        (Type::None, Type::Optional(_)) => true,
        (_, Type::Optional(inner)) => is_subtype(sub, inner),
        (_, Type::Union(sups)) => sups.iter().any(|s| is_subtype(sub, s)),
        (Type::List(a), Type::List(b)) => is_subtype(a, b),
        (Type::Dict(ak, av), Type::Dict(bk, bv)) => is_subtype(ak, bk) && is_subtype(av, bv),
        _ => false,
    }
}

/// The least type both `a` and `b` fit into. Unrelated types widen to a
/// union, so unification is total; `Int` and `Float` meet at `Float`.
pub fn unify(a: &Type, b: &Type) -> Type {
    if is_subtype(a, b) {
        return b.clone();
    }
    if is_subtype(b, a) {
        return a.clone();
    }
    match (a, b) {
        (Type::Int, Type::Float) | (Type::Float, Type::Int) => Type::Float,
        (Type::None, other) | (other, Type::None) => Type::Optional(Box::new(other.clone())),
        (Type::Union(xs), Type::Union(ys)) => {
            let mut members = xs.clone();
            for y in ys {
                if !members.contains(y) {
                    members.push(y.clone());
                }
            }
            Type::Union(members)
        }
        (Type::Union(xs), other) | (other, Type::Union(xs)) => {
            let mut members = xs.clone();
            if !members.contains(other) {
                members.push(other.clone());
            }
            Type::Union(members)
        }
        _ => Type::Union(vec![a.clone(), b.clone()]),
    }
}
