//! The evaluator: eager, single-threaded statement and expression
//! interpretation.
//!
//! Compilation *is* evaluation in Eiko. Statements run top to bottom;
//! declarations bind type values, assignments bind ordinary values exactly
//! once, and constructing a resource registers it in the global table as a
//! side effect. There are no suspension points — everything a module needs
//! is computed before the next statement runs, which is what makes the
//! output deterministic.
//!
//! The pieces most worth reading:
//!
//! - [`Compiler::eval_stmt`] / [`Compiler::eval_expr`] — the interpreter
//!   proper, including the single-assignment rule and operator semantics;
//! - [`Compiler::coerce`] — value conversion against the type lattice,
//!   including typedef refinements (evaluated with `self` bound);
//! - [`Compiler::construct_resource`] — overload dispatch
//!   (arity → types → constraints), constructor execution, defaults,
//!   property coercion, index computation, and registration.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use eiko_base::{ErrorKind, IndexError, PluginError, Result, Span, Symbol, TypeError};
use eiko_language::ast::{
    AssignTarget, BinaryOp, BoolOp, CompareOp, Expr, ExprKind, FStringPart, Literal, Module,
    Stmt, StmtKind, TypeExpr, TypeExprKind, UnaryOp,
};
use indexmap::IndexMap;

use crate::compiler::Compiler;
use crate::plugins::{PluginFailure, PluginFunction};
use crate::resource::{
    compute_index, BuilderWriteError, Constructor, CtorParam, IndexComputeError, PropertySchema,
    ResourceBuilder, ResourceDef, ResourceInstance,
};
use crate::scope::{ScopeStack, WriteOutcome};
use crate::types::{is_subtype, EnumInfo, Type, TypedefInfo};
use crate::value::{DictKey, PromiseOwner, Value};

impl Compiler {
    pub(crate) fn eval_module(&mut self, module: &Module, scope: &mut ScopeStack) -> Result<()> {
        for stmt in &module.stmts {
            self.eval_stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn eval_block(&mut self, stmts: &[Stmt], scope: &mut ScopeStack) -> Result<()> {
        for stmt in stmts {
            self.eval_stmt(stmt, scope)?;
        }
        Ok(())
    }

    pub(crate) fn name(&self, sym: Symbol) -> String {
        self.interner.resolve(sym).to_string()
    }

    // ==================================================================
    // Statements
    // ==================================================================

    fn eval_stmt(&mut self, stmt: &Stmt, scope: &mut ScopeStack) -> Result<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, scope)?;
                Ok(())
            }
            StmtKind::Pass => Ok(()),
            StmtKind::Assign { target, target_span, annotation, value } => {
                self.eval_assign(target, *target_span, annotation.as_ref(), value, scope)
            }
            StmtKind::Declare { name, annotation } => {
                let name = self.name(*name);
                let ty = self.resolve_type(annotation, scope)?;
                scope.declare(&name, ty, stmt.span).map_err(|_prev| {
                    self.error_at(ErrorKind::Reassign { name: name.clone() }, stmt.span)
                })
            }
            StmtKind::If { branches, else_body } => {
                for (cond, body) in branches {
                    let value = self.eval_expr(cond, scope)?;
                    let taken = value.as_bool().ok_or_else(|| {
                        self.type_mismatch("bool", &value, cond.span)
                    })?;
                    if taken {
                        return self.eval_block(body, scope);
                    }
                }
                if let Some(body) = else_body {
                    return self.eval_block(body, scope);
                }
                Ok(())
            }
            StmtKind::For { var, var_span, iter, body } => {
                let var = self.name(*var);
                let iterable = self.eval_expr(iter, scope)?;
                let items: Vec<Value> = match &iterable {
                    Value::List(list) => list.borrow().items.clone(),
                    Value::Dict(dict) => {
                        dict.borrow().entries.keys().map(DictKey::to_value).collect()
                    }
                    other => {
                        return Err(self.type_mismatch("a list or dict", other, iter.span));
                    }
                };
                for item in items {
                    scope.push();
                    scope.store_local(&var, item, *var_span);
                    let outcome = self.eval_block(body, scope);
                    scope.pop();
                    outcome?;
                }
                Ok(())
            }
            StmtKind::Import { path, alias } => self.eval_import(path, *alias, stmt.span, scope),
            StmtKind::FromImport { dots, path, names } => {
                self.eval_from_import(*dots, path, names, stmt.span, scope)
            }
            StmtKind::Resource(decl) => self.eval_resource_decl(decl, stmt.span, scope),
            StmtKind::Typedef(decl) => {
                let name = self.name(decl.name);
                let base = self.resolve_type(&decl.base, scope)?;
                let info = Rc::new(TypedefInfo {
                    name: name.clone(),
                    module: self.current_module.clone(),
                    base,
                    refinement: decl.refinement.clone(),
                    span: decl.span,
                });
                self.bind(scope, &name, Value::Type(Type::Typedef(info)), None, decl.name_span)
            }
            StmtKind::Enum(decl) => {
                let name = self.name(decl.name);
                let mut members = Vec::new();
                for (member, span) in &decl.members {
                    let member = self.name(*member);
                    if members.contains(&member) {
                        return Err(self.error_at(
                            ErrorKind::Syntax(format!("duplicate enum member `{member}`")),
                            *span,
                        ));
                    }
                    members.push(member);
                }
                let info = Rc::new(EnumInfo {
                    name: name.clone(),
                    module: self.current_module.clone(),
                    members,
                });
                self.bind(scope, &name, Value::Type(Type::Enum(info)), None, decl.name_span)
            }
        }
    }

    fn eval_assign(
        &mut self,
        target: &AssignTarget,
        target_span: Span,
        annotation: Option<&TypeExpr>,
        value: &Expr,
        scope: &mut ScopeStack,
    ) -> Result<()> {
        let evaluated = self.eval_expr(value, scope)?;
        match target {
            AssignTarget::Name(sym) => {
                let name = self.name(*sym);
                let annotated = annotation
                    .map(|a| self.resolve_type(a, scope))
                    .transpose()?;
                match scope.check_write(&name) {
                    WriteOutcome::AlreadyAssigned(_) => {
                        Err(self.error_at(ErrorKind::Reassign { name }, target_span))
                    }
                    WriteOutcome::Fulfilled(_) if annotated.is_some() => {
                        // `x: int` followed by `x: str = ...` re-declares.
                        Err(self.error_at(ErrorKind::Reassign { name }, target_span))
                    }
                    WriteOutcome::Fulfilled(declared) => {
                        let coerced = match &declared {
                            Some(ty) => self.coerce(evaluated, ty, scope, value.span)?,
                            None => evaluated,
                        };
                        scope.store(&name, coerced, declared, target_span);
                        Ok(())
                    }
                    WriteOutcome::Created => {
                        let coerced = match &annotated {
                            Some(ty) => self.coerce(evaluated, ty, scope, value.span)?,
                            None => evaluated,
                        };
                        scope.store(&name, coerced, annotated, target_span);
                        Ok(())
                    }
                }
            }
            AssignTarget::SelfAttr(sym) => {
                let property = self.name(*sym);
                let Some(Value::Builder(builder)) = scope.get("self").cloned() else {
                    return Err(self.error_at(
                        ErrorKind::Eval(
                            "`self` properties can only be assigned inside a constructor"
                                .to_string(),
                        ),
                        target_span,
                    ));
                };
                let def_name = builder.borrow().def.name.clone();
                let result = builder
                    .borrow_mut()
                    .assign(&property, evaluated, target_span)
                    .map_err(|err| match err {
                        BuilderWriteError::NoSuchProperty => self.error_at(
                            ErrorKind::Constructor(format!(
                                "resource `{def_name}` has no property `{property}`"
                            )),
                            target_span,
                        ),
                        BuilderWriteError::PromiseProperty => self.error_at(
                            ErrorKind::Constructor(format!(
                                "property `{property}` is a promise and is filled during deploy"
                            )),
                            target_span,
                        ),
                        BuilderWriteError::AlreadyAssigned(_) => self.error_at(
                            ErrorKind::Reassign { name: format!("self.{property}") },
                            target_span,
                        ),
                    });
                result
            }
        }
    }

    /// Single-assignment write used by declarations and import bindings.
    /// Rebinding the *same* value (a module imported twice) is a no-op.
    fn bind(
        &self,
        scope: &mut ScopeStack,
        name: &str,
        value: Value,
        declared: Option<Type>,
        span: Span,
    ) -> Result<()> {
        match scope.check_write(name) {
            WriteOutcome::AlreadyAssigned(_) => {
                if scope.get(name).is_some_and(|existing| existing.eq_value(&value)) {
                    Ok(())
                } else {
                    Err(self.error_at(ErrorKind::Reassign { name: name.to_string() }, span))
                }
            }
            WriteOutcome::Fulfilled(declared_ty) => {
                scope.store(name, value, declared_ty, span);
                Ok(())
            }
            WriteOutcome::Created => {
                scope.store(name, value, declared, span);
                Ok(())
            }
        }
    }

    fn eval_import(
        &mut self,
        path: &[Symbol],
        alias: Option<Symbol>,
        span: Span,
        scope: &mut ScopeStack,
    ) -> Result<()> {
        let segments: Vec<String> = path.iter().map(|s| self.name(*s)).collect();
        let envs = self.load_import_chain(&segments, span)?;
        match alias {
            Some(alias) => {
                let alias = self.name(alias);
                let last = envs.last().expect("chain is non-empty").clone();
                self.bind(scope, &alias, Value::Module(last), None, span)
            }
            None => {
                let root = envs.first().expect("chain is non-empty").clone();
                self.bind(scope, &segments[0], Value::Module(root), None, span)
            }
        }
    }

    fn eval_from_import(
        &mut self,
        dots: usize,
        path: &[Symbol],
        names: &[(Symbol, Option<Symbol>)],
        span: Span,
        scope: &mut ScopeStack,
    ) -> Result<()> {
        let segments: Vec<String> = path.iter().map(|s| self.name(*s)).collect();
        let env = if dots > 0 {
            self.load_relative(dots, &segments, span)?
        } else {
            self.load_import_chain(&segments, span)?
                .last()
                .expect("chain is non-empty")
                .clone()
        };
        for (name, alias) in names {
            let name = self.name(*name);
            let value = env.get(&name).ok_or_else(|| {
                self.error_at(
                    ErrorKind::Import(eiko_base::ImportError::NotFound {
                        module: format!("{}.{}", env.name, name),
                    }),
                    span,
                )
            })?;
            let bound_as = alias.map(|a| self.name(a)).unwrap_or(name);
            self.bind(scope, &bound_as, value, None, span)?;
        }
        Ok(())
    }

    // ==================================================================
    // Declarations
    // ==================================================================

    fn eval_resource_decl(
        &mut self,
        decl: &eiko_language::ast::ResourceDecl,
        span: Span,
        scope: &mut ScopeStack,
    ) -> Result<()> {
        let name = self.name(decl.name);
        if let Some(dec) = decl.extra_decorators.first() {
            let dec_name = self.name(dec.name);
            return Err(self.error_at(
                ErrorKind::Name(format!("@{dec_name} (unknown decorator)")),
                dec.span,
            ));
        }

        let parent: Option<Rc<ResourceDef>> = match &decl.parent {
            Some((sym, pspan)) => {
                let pname = self.name(*sym);
                match scope.get(&pname).cloned() {
                    Some(Value::Type(Type::Resource(def))) => Some(def),
                    Some(other) => {
                        return Err(self.type_mismatch("a resource definition", &other, *pspan));
                    }
                    None => {
                        return Err(self.error_at(ErrorKind::Name(pname), *pspan));
                    }
                }
            }
            None => None,
        };
        if decl.inherit_only && parent.is_none() {
            return Err(self.error_at(
                ErrorKind::Syntax("a `...` body requires a parent resource".to_string()),
                span,
            ));
        }

        let mut properties: IndexMap<String, PropertySchema> = parent
            .as_ref()
            .map(|p| p.properties.clone())
            .unwrap_or_default();
        for prop in &decl.properties {
            let pname = self.name(prop.name);
            let ty = self.resolve_type(&prop.annotation, scope)?;
            if let Some(existing) = properties.get(&pname) {
                if !is_subtype(&ty, &existing.ty) {
                    return Err(self.error_at(
                        ErrorKind::Type(TypeError::Mismatch {
                            expected: format!("a subtype of `{}`", existing.ty),
                            found: ty.to_string(),
                        }),
                        prop.annotation.span,
                    ));
                }
            }
            properties.insert(
                pname,
                PropertySchema {
                    ty,
                    default: prop.default.clone(),
                    promise: prop.promise,
                    span: prop.span,
                },
            );
        }

        let mut constructors = Vec::new();
        for ctor in &decl.constructors {
            let mut params = Vec::new();
            for param in &ctor.params {
                let ty = param
                    .annotation
                    .as_ref()
                    .map(|a| self.resolve_type(a, scope))
                    .transpose()?;
                params.push(CtorParam {
                    name: self.name(param.name),
                    ty,
                    default: param.default.clone(),
                    span: param.span,
                });
            }
            constructors.push(Constructor {
                name: self.name(ctor.name),
                params,
                body: Rc::new(ctor.body.clone()),
                constraint: ctor.constraint.clone(),
                span: ctor.span,
            });
        }

        let index_keys = decl
            .index_keys
            .clone()
            .or_else(|| parent.as_ref().and_then(|p| p.index_keys.clone()));

        let def = Rc::new(ResourceDef {
            name: name.clone(),
            module: self.current_module.clone(),
            file: self.current_file,
            span,
            properties,
            constructors,
            parent,
            index_keys,
            has_handler: std::cell::Cell::new(self.plugins.has_handler(&name)),
        });
        self.bind(scope, &name, Value::Type(Type::Resource(def)), None, decl.name_span)
    }

    /// Resolves a parsed type annotation against the scope.
    pub(crate) fn resolve_type(
        &mut self,
        texpr: &TypeExpr,
        scope: &ScopeStack,
    ) -> Result<Type> {
        match &texpr.kind {
            TypeExprKind::None => Ok(Type::None),
            TypeExprKind::Name(sym) => {
                let name = self.name(*sym);
                if let Some(ty) = builtin_type(&name) {
                    return Ok(ty);
                }
                match scope.get(&name) {
                    Some(Value::Type(ty)) => Ok(ty.clone()),
                    Some(other) => {
                        let other = other.clone();
                        Err(self.type_mismatch("a type", &other, texpr.span))
                    }
                    None => Err(self.error_at(ErrorKind::Name(name), texpr.span)),
                }
            }
            TypeExprKind::Generic { name, args } => {
                let name = self.name(*name);
                let mut resolved = Vec::new();
                for arg in args {
                    resolved.push(self.resolve_type(arg, scope)?);
                }
                match (name.as_str(), resolved.len()) {
                    ("list", 1) => Ok(Type::List(Box::new(resolved.remove(0)))),
                    ("dict", 2) => {
                        let value = resolved.remove(1);
                        let key = resolved.remove(0);
                        if !key.is_dict_key() {
                            return Err(self.error_at(
                                ErrorKind::Type(TypeError::Mismatch {
                                    expected: "a dict key type (bool, int, str or enum)"
                                        .to_string(),
                                    found: key.to_string(),
                                }),
                                texpr.span,
                            ));
                        }
                        Ok(Type::Dict(Box::new(key), Box::new(value)))
                    }
                    ("Optional", 1) => Ok(Type::Optional(Box::new(resolved.remove(0)))),
                    ("Union", n) if n >= 1 => {
                        let mut members: Vec<Type> = Vec::new();
                        for ty in resolved {
                            match ty {
                                Type::Union(inner) => {
                                    for t in inner {
                                        if !members.contains(&t) {
                                            members.push(t);
                                        }
                                    }
                                }
                                t => {
                                    if !members.contains(&t) {
                                        members.push(t);
                                    }
                                }
                            }
                        }
                        if members.len() == 1 {
                            Ok(members.remove(0))
                        } else {
                            Ok(Type::Union(members))
                        }
                    }
                    _ => Err(self.error_at(
                        ErrorKind::Syntax(format!(
                            "`{name}` does not take {} type parameter(s)",
                            args.len()
                        )),
                        texpr.span,
                    )),
                }
            }
        }
    }

    // ==================================================================
    // Expressions
    // ==================================================================

    pub(crate) fn eval_expr(&mut self, expr: &Expr, scope: &mut ScopeStack) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Int(v) => Value::Int(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::Str(s) => Value::str(s.as_str()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::None => Value::None,
            }),
            ExprKind::Ident(sym) => {
                let name = self.name(*sym);
                if let Some(value) = scope.get(&name) {
                    return Ok(value.clone());
                }
                if let Some(ty) = builtin_type(&name) {
                    return Ok(Value::Type(ty));
                }
                Err(self.error_at(ErrorKind::Name(name), expr.span))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand, scope)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| {
                            self.error_at(
                                ErrorKind::Eval("integer overflow".to_string()),
                                expr.span,
                            )
                        }),
                    (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, other) => {
                        Err(self.type_mismatch("a number", &other, operand.span))
                    }
                    (UnaryOp::Not, other) => {
                        Err(self.type_mismatch("bool", &other, operand.span))
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.eval_expr(lhs, scope)?;
                let right = self.eval_expr(rhs, scope)?;
                self.eval_binary(*op, left, right, expr.span)
            }
            ExprKind::Compare { op, lhs, rhs } => {
                let left = self.eval_expr(lhs, scope)?;
                let right = self.eval_expr(rhs, scope)?;
                self.eval_compare(*op, left, right, expr.span)
            }
            ExprKind::Bool { op, lhs, rhs } => {
                let left = self.eval_expr(lhs, scope)?;
                let left = left
                    .as_bool()
                    .ok_or_else(|| self.type_mismatch("bool", &left, lhs.span))?;
                // Short-circuit.
                match (op, left) {
                    (BoolOp::And, false) => Ok(Value::Bool(false)),
                    (BoolOp::Or, true) => Ok(Value::Bool(true)),
                    _ => {
                        let right = self.eval_expr(rhs, scope)?;
                        let right = right
                            .as_bool()
                            .ok_or_else(|| self.type_mismatch("bool", &right, rhs.span))?;
                        Ok(Value::Bool(right))
                    }
                }
            }
            ExprKind::Index { base, index } => {
                let container = self.eval_expr(base, scope)?;
                let key = self.eval_expr(index, scope)?;
                self.eval_index(container, key, index.span)
            }
            ExprKind::Attr { base, name, name_span } => {
                let target = self.eval_expr(base, scope)?;
                let name = self.name(*name);
                self.attr_value(target, &name, *name_span)
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.span, scope),
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::Dict(entries) => {
                let mut map = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key_val = self.eval_expr(key_expr, scope)?;
                    let key = DictKey::from_value(&key_val).ok_or_else(|| {
                        self.error_at(
                            ErrorKind::Type(TypeError::Mismatch {
                                expected: "a dict key (bool, int, str or enum member)"
                                    .to_string(),
                                found: key_val.type_of().to_string(),
                            }),
                            key_expr.span,
                        )
                    })?;
                    let value = self.eval_expr(value_expr, scope)?;
                    if map.insert(key, value).is_some() {
                        return Err(self.error_at(
                            ErrorKind::Eval("duplicate dict key".to_string()),
                            key_expr.span,
                        ));
                    }
                }
                Ok(Value::dict(map))
            }
            ExprKind::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FStringPart::Lit(text) => out.push_str(text),
                        FStringPart::Expr(inner) => {
                            let value = self.eval_expr(inner, scope)?;
                            out.push_str(&value.interpolate());
                        }
                    }
                }
                Ok(Value::str(out))
            }
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> Result<Value> {
        use BinaryOp::*;
        let overflow = || self.error_at(ErrorKind::Eval("integer overflow".to_string()), span);
        match (op, &lhs, &rhs) {
            (Add, Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or_else(overflow)
            }
            (Sub, Value::Int(a), Value::Int(b)) => {
                a.checked_sub(*b).map(Value::Int).ok_or_else(overflow)
            }
            (Mul, Value::Int(a), Value::Int(b)) => {
                a.checked_mul(*b).map(Value::Int).ok_or_else(overflow)
            }
            (Div, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(self
                        .error_at(ErrorKind::Eval("division by zero".to_string()), span));
                }
                if a % b == 0 {
                    Ok(Value::Int(a / b))
                } else {
                    // Inexact integer division promotes to float.
                    Ok(Value::Float(*a as f64 / *b as f64))
                }
            }
            (FloorDiv, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(self
                        .error_at(ErrorKind::Eval("division by zero".to_string()), span));
                }
                let q = a / b;
                let adjusted = if a % b != 0 && (*a < 0) != (*b < 0) { q - 1 } else { q };
                Ok(Value::Int(adjusted))
            }
            (Mod, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(self
                        .error_at(ErrorKind::Eval("division by zero".to_string()), span));
                }
                let r = a % b;
                let adjusted = if r != 0 && (r < 0) != (*b < 0) { r + b } else { r };
                Ok(Value::Int(adjusted))
            }
            (Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
            (Add, Value::Str(_) | Value::Protected(_), Value::Str(_) | Value::Protected(_)) => {
                // Concatenation touching a protected string stays protected.
                Ok(Value::Protected(
                    format!("{}{}", lhs.interpolate(), rhs.interpolate()).into(),
                ))
            }
            _ => {
                let (a, b) = match (as_float(&lhs), as_float(&rhs)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(self.error_at(
                            ErrorKind::Type(TypeError::Mismatch {
                                expected: format!(
                                    "operands supporting `{}`",
                                    binary_symbol(op)
                                ),
                                found: format!("{} and {}", lhs.type_of(), rhs.type_of()),
                            }),
                            span,
                        ));
                    }
                };
                match op {
                    Add => Ok(Value::Float(a + b)),
                    Sub => Ok(Value::Float(a - b)),
                    Mul => Ok(Value::Float(a * b)),
                    Div => {
                        if b == 0.0 {
                            Err(self.error_at(
                                ErrorKind::Eval("division by zero".to_string()),
                                span,
                            ))
                        } else {
                            Ok(Value::Float(a / b))
                        }
                    }
                    FloorDiv => {
                        if b == 0.0 {
                            Err(self.error_at(
                                ErrorKind::Eval("division by zero".to_string()),
                                span,
                            ))
                        } else {
                            Ok(Value::Float((a / b).floor()))
                        }
                    }
                    Mod => {
                        if b == 0.0 {
                            Err(self.error_at(
                                ErrorKind::Eval("division by zero".to_string()),
                                span,
                            ))
                        } else {
                            Ok(Value::Float(a.rem_euclid(b)))
                        }
                    }
                }
            }
        }
    }

    fn eval_compare(&self, op: CompareOp, lhs: Value, rhs: Value, span: Span) -> Result<Value> {
        use CompareOp::*;
        match op {
            Eq => Ok(Value::Bool(lhs.eq_value(&rhs))),
            NotEq => Ok(Value::Bool(!lhs.eq_value(&rhs))),
            In => match &rhs {
                Value::List(list) => Ok(Value::Bool(
                    list.borrow().items.iter().any(|item| item.eq_value(&lhs)),
                )),
                Value::Dict(dict) => {
                    let key = DictKey::from_value(&lhs).ok_or_else(|| {
                        self.type_mismatch("a dict key", &lhs, span)
                    })?;
                    Ok(Value::Bool(dict.borrow().entries.contains_key(&key)))
                }
                Value::Str(haystack) => match &lhs {
                    Value::Str(needle) | Value::Protected(needle) => {
                        Ok(Value::Bool(haystack.contains(needle.as_ref())))
                    }
                    other => Err(self.type_mismatch("str", other, span)),
                },
                other => Err(self.type_mismatch("a container", other, span)),
            },
            Lt | LtEq | Gt | GtEq => {
                let ordering = match (&lhs, &rhs) {
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => match (as_float(&lhs), as_float(&rhs)) {
                        (Some(a), Some(b)) => a
                            .partial_cmp(&b)
                            .unwrap_or(std::cmp::Ordering::Equal),
                        _ => {
                            return Err(self.error_at(
                                ErrorKind::Type(TypeError::Mismatch {
                                    expected: "comparable operands".to_string(),
                                    found: format!(
                                        "{} and {}",
                                        lhs.type_of(),
                                        rhs.type_of()
                                    ),
                                }),
                                span,
                            ));
                        }
                    },
                };
                let result = match op {
                    Lt => ordering.is_lt(),
                    LtEq => ordering.is_le(),
                    Gt => ordering.is_gt(),
                    GtEq => ordering.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Value::Bool(result))
            }
        }
    }

    fn eval_index(&self, container: Value, key: Value, key_span: Span) -> Result<Value> {
        match (&container, &key) {
            (Value::List(list), Value::Int(i)) => {
                let list = list.borrow();
                let len = list.items.len() as i64;
                let idx = if *i < 0 { len + i } else { *i };
                if idx < 0 || idx >= len {
                    return Err(self.error_at(
                        ErrorKind::Eval(format!("list index {i} out of range (len {len})")),
                        key_span,
                    ));
                }
                Ok(list.items[idx as usize].clone())
            }
            (Value::Dict(dict), _) => {
                let dict_key = DictKey::from_value(&key).ok_or_else(|| {
                    self.type_mismatch("a dict key", &key, key_span)
                })?;
                dict.borrow().entries.get(&dict_key).cloned().ok_or_else(|| {
                    self.error_at(
                        ErrorKind::Eval(format!("key not found: {}", dict_key.display())),
                        key_span,
                    )
                })
            }
            _ => Err(self.type_mismatch("a list or dict", &container, key_span)),
        }
    }

    /// Attribute lookup on an evaluated value.
    fn attr_value(&mut self, target: Value, name: &str, span: Span) -> Result<Value> {
        match &target {
            Value::Module(env) => env.get(name).ok_or_else(|| {
                self.error_at(ErrorKind::Name(format!("{}.{}", env.name, name)), span)
            }),
            Value::Resource(instance) => {
                instance.properties.get(name).cloned().ok_or_else(|| {
                    self.error_at(
                        ErrorKind::Eval(format!(
                            "resource `{}` has no property `{name}`",
                            instance.def.name
                        )),
                        span,
                    )
                })
            }
            Value::Builder(builder) => {
                let builder = builder.borrow();
                if let Some(value) = builder.get(name) {
                    return Ok(value.clone());
                }
                if builder.def.properties.contains_key(name) {
                    Err(self.error_at(
                        ErrorKind::Eval(format!(
                            "property `{name}` has not been assigned yet"
                        )),
                        span,
                    ))
                } else {
                    Err(self.error_at(
                        ErrorKind::Eval(format!(
                            "resource `{}` has no property `{name}`",
                            builder.def.name
                        )),
                        span,
                    ))
                }
            }
            Value::Type(Type::Enum(info)) => {
                info.member_index(name)
                    .map(|idx| Value::EnumMember(info.clone(), idx))
                    .ok_or_else(|| {
                        self.error_at(
                            ErrorKind::Eval(format!(
                                "enum `{}` has no member `{name}`",
                                info.name
                            )),
                            span,
                        )
                    })
            }
            other => Err(self.error_at(
                ErrorKind::Eval(format!(
                    "value of type `{}` has no attribute `{name}`",
                    other.type_of()
                )),
                span,
            )),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[eiko_language::ast::CallArg],
        span: Span,
        scope: &mut ScopeStack,
    ) -> Result<Value> {
        // `isinstance` is a builtin unless the user shadowed the name.
        if let ExprKind::Ident(sym) = &callee.kind {
            let name = self.name(*sym);
            if name == "isinstance" && scope.get(&name).is_none() {
                return self.eval_isinstance(args, scope, span);
            }
        }

        // Resolve the callee; `.append` on a list is the one method call.
        let callee_value = match &callee.kind {
            ExprKind::Attr { base, name, name_span } => {
                let base_value = self.eval_expr(base, scope)?;
                let attr = self.name(*name);
                if attr == "append" {
                    if let Value::List(list) = &base_value {
                        return self.eval_append(list, args, span, scope);
                    }
                }
                self.attr_value(base_value, &attr, *name_span)?
            }
            _ => self.eval_expr(callee, scope)?,
        };

        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            let name = arg.name.map(|s| self.name(s));
            let value = self.eval_expr(&arg.value, scope)?;
            evaluated.push((name, value, arg.span));
        }

        match callee_value {
            Value::Plugin(function) => self.call_plugin(&function, evaluated, span, scope),
            Value::Type(Type::Resource(def)) => {
                self.construct_resource(def, evaluated, scope, span)
            }
            Value::Type(ty @ Type::Typedef(_)) => {
                let [(None, value, arg_span)] = &evaluated[..] else {
                    return Err(self.error_at(
                        ErrorKind::Type(TypeError::Mismatch {
                            expected: "one positional argument".to_string(),
                            found: format!("{} argument(s)", evaluated.len()),
                        }),
                        span,
                    ));
                };
                self.coerce(value.clone(), &ty, scope, *arg_span)
            }
            other => Err(self.type_mismatch("a callable", &other, span)),
        }
    }

    fn eval_append(
        &mut self,
        list: &Rc<RefCell<crate::value::ListValue>>,
        args: &[eiko_language::ast::CallArg],
        span: Span,
        scope: &mut ScopeStack,
    ) -> Result<Value> {
        let [arg] = args else {
            return Err(self.error_at(
                ErrorKind::Type(TypeError::Mismatch {
                    expected: "one argument to append".to_string(),
                    found: format!("{}", args.len()),
                }),
                span,
            ));
        };
        if arg.name.is_some() {
            return Err(self.error_at(
                ErrorKind::Syntax("append takes no keyword arguments".to_string()),
                arg.span,
            ));
        }
        let value = self.eval_expr(&arg.value, scope)?;
        let mut list = list.borrow_mut();
        if list.frozen {
            return Err(self.error_at(
                ErrorKind::Eval(
                    "cannot append: the list belongs to a constructed resource".to_string(),
                ),
                span,
            ));
        }
        list.items.push(value);
        Ok(Value::None)
    }

    fn eval_isinstance(
        &mut self,
        args: &[eiko_language::ast::CallArg],
        scope: &mut ScopeStack,
        span: Span,
    ) -> Result<Value> {
        let [value_arg, type_arg] = args else {
            return Err(self.error_at(
                ErrorKind::Type(TypeError::Mismatch {
                    expected: "isinstance(value, type)".to_string(),
                    found: format!("{} argument(s)", args.len()),
                }),
                span,
            ));
        };
        if value_arg.name.is_some() || type_arg.name.is_some() {
            return Err(self.error_at(
                ErrorKind::Syntax("isinstance takes positional arguments".to_string()),
                span,
            ));
        }
        let value = self.eval_expr(&value_arg.value, scope)?;
        let ty_value = self.eval_expr(&type_arg.value, scope)?;
        let Value::Type(target) = ty_value else {
            return Err(self.type_mismatch("a type", &ty_value, type_arg.span));
        };
        let result = self.isinstance_check(&value, &target, scope)?;
        Ok(Value::Bool(result))
    }

    /// `isinstance` semantics: structural subtyping, with typedefs counting
    /// as their base *and* requiring the refinement to hold.
    fn isinstance_check(
        &mut self,
        value: &Value,
        target: &Type,
        scope: &mut ScopeStack,
    ) -> Result<bool> {
        match target {
            Type::Typedef(td) => {
                let base = td.base.clone();
                Ok(self.isinstance_check(value, &base, scope)?
                    && self.refinement_holds(td, value, scope)?)
            }
            Type::Optional(inner) => {
                Ok(matches!(value, Value::None) || self.isinstance_check(value, inner, scope)?)
            }
            Type::Union(members) => {
                for member in members {
                    if self.isinstance_check(value, member, scope)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(is_subtype(&value.type_of(), target)),
        }
    }

    fn call_plugin(
        &mut self,
        function: &Rc<PluginFunction>,
        args: Vec<(Option<String>, Value, Span)>,
        span: Span,
        scope: &mut ScopeStack,
    ) -> Result<Value> {
        if args.iter().any(|(name, ..)| name.is_some()) {
            return Err(self.error_at(
                ErrorKind::Syntax(format!(
                    "plugin `{}` takes positional arguments",
                    function.name
                )),
                span,
            ));
        }
        if args.len() != function.params.len() {
            return Err(self.error_at(
                ErrorKind::Type(TypeError::Mismatch {
                    expected: format!(
                        "{} argument(s) to `{}`",
                        function.params.len(),
                        function.name
                    ),
                    found: format!("{}", args.len()),
                }),
                span,
            ));
        }
        let mut coerced = Vec::with_capacity(args.len());
        for ((_, value, arg_span), target) in args.into_iter().zip(&function.params) {
            coerced.push(self.coerce(value, target, scope, arg_span)?);
        }
        tracing::debug!(plugin = %function.name, "calling plugin");
        let result = (function.func)(&coerced).map_err(|failure| {
            let kind = match failure {
                PluginFailure::User(message) => {
                    ErrorKind::Plugin(PluginError::User { message })
                }
                PluginFailure::Internal { message, trace } => {
                    ErrorKind::Plugin(PluginError::Internal { message, trace })
                }
            };
            self.error_at(kind, span)
        })?;
        if !is_subtype(&result.type_of(), &function.returns) {
            return Err(self.error_at(
                ErrorKind::Plugin(PluginError::Internal {
                    message: format!(
                        "plugin `{}` declared `{}` but returned `{}`",
                        function.name,
                        function.returns,
                        result.type_of()
                    ),
                    trace: None,
                }),
                span,
            ));
        }
        Ok(result)
    }

    // ==================================================================
    // Coercion
    // ==================================================================

    /// Converts `value` to `target`, per the coercion rules: numeric
    /// widening, base-to-typedef via the refinement, element-wise container
    /// rebuilds, promise pass-through on declared-type compatibility.
    pub(crate) fn coerce(
        &mut self,
        value: Value,
        target: &Type,
        scope: &mut ScopeStack,
        span: Span,
    ) -> Result<Value> {
        if matches!(value, Value::Builder(_)) {
            return Err(self.error_at(
                ErrorKind::Constructor(
                    "`self` cannot be used as a value during construction".to_string(),
                ),
                span,
            ));
        }
        match target {
            Type::Typedef(td) => {
                let base = self.coerce(value, &td.base, scope, span)?;
                if let Value::Promise(promise) = &base {
                    // An unresolved promise cannot be refined; accept it only
                    // when its declared type already names this typedef.
                    return if promise.ty == *target {
                        Ok(base)
                    } else {
                        Err(self.not_coercible(&promise.ty.to_string(), target, span))
                    };
                }
                if self.refinement_holds(td, &base, scope)? {
                    Ok(base)
                } else {
                    Err(self.error_at(
                        ErrorKind::Refinement {
                            typedef: td.name.clone(),
                            value: base.display(),
                        },
                        span,
                    ))
                }
            }
            Type::Optional(inner) => {
                if matches!(value, Value::None) {
                    Ok(Value::None)
                } else {
                    self.coerce(value, inner, scope, span)
                }
            }
            Type::Union(members) => {
                if is_subtype(&value.type_of(), target) {
                    return Ok(value);
                }
                for member in members {
                    if let Ok(coerced) = self.coerce(value.clone(), member, scope, span) {
                        return Ok(coerced);
                    }
                }
                Err(self.not_coercible(&value.type_of().to_string(), target, span))
            }
            _ => {
                if let Value::Promise(promise) = &value {
                    return if is_subtype(&promise.ty, target) {
                        Ok(value)
                    } else {
                        Err(self.not_coercible(&promise.ty.to_string(), target, span))
                    };
                }
                let value_ty = value.type_of();
                if is_subtype(&value_ty, target) {
                    return Ok(value);
                }
                match (value, target) {
                    (Value::Int(i), Type::Float) => Ok(Value::Float(i as f64)),
                    (Value::Str(s), Type::ProtectedStr) => Ok(Value::Protected(s)),
                    (Value::Str(s), Type::Path) => {
                        Ok(Value::Path(Rc::new(PathBuf::from(s.as_ref()))))
                    }
                    (Value::List(list), Type::List(elem)) => {
                        let items = list.borrow().items.clone();
                        let mut coerced = Vec::with_capacity(items.len());
                        for item in items {
                            coerced.push(self.coerce(item, elem, scope, span)?);
                        }
                        // Element coercion builds a new container.
                        Ok(Value::list(coerced))
                    }
                    (Value::Dict(dict), Type::Dict(key_ty, value_ty)) => {
                        let entries = dict.borrow().entries.clone();
                        let mut coerced = IndexMap::new();
                        for (key, value) in entries {
                            if !is_subtype(&key.type_hint(), key_ty) {
                                return Err(self.not_coercible(
                                    &key.type_hint().to_string(),
                                    key_ty,
                                    span,
                                ));
                            }
                            coerced.insert(key, self.coerce(value, value_ty, scope, span)?);
                        }
                        Ok(Value::dict(coerced))
                    }
                    (other, _) => {
                        Err(self.not_coercible(&other.type_of().to_string(), target, span))
                    }
                }
            }
        }
    }

    /// Evaluates a typedef's refinement with `self` bound to the candidate.
    fn refinement_holds(
        &mut self,
        td: &TypedefInfo,
        value: &Value,
        scope: &mut ScopeStack,
    ) -> Result<bool> {
        let Some(refinement) = td.refinement.clone() else {
            return Ok(true);
        };
        scope.push();
        scope.store_local("self", value.clone(), td.span);
        let outcome = self.eval_expr(&refinement, scope);
        scope.pop();
        let result = outcome?;
        result.as_bool().ok_or_else(|| {
            self.error_at(
                ErrorKind::Type(TypeError::Mismatch {
                    expected: format!("bool from `{}` refinement", td.name),
                    found: result.type_of().to_string(),
                }),
                td.span,
            )
        })
    }

    // ==================================================================
    // Resource construction
    // ==================================================================

    pub(crate) fn construct_resource(
        &mut self,
        def: Rc<ResourceDef>,
        args: Vec<(Option<String>, Value, Span)>,
        scope: &mut ScopeStack,
        span: Span,
    ) -> Result<Value> {
        let builder = if def.constructors.is_empty() {
            self.construct_default(&def, args)?
        } else {
            self.construct_dispatched(&def, args, scope, span)?
        };
        self.close_construction(builder, scope, span)
    }

    /// No declared constructors: arguments map onto the non-promise
    /// properties in declaration order.
    fn construct_default(
        &mut self,
        def: &Rc<ResourceDef>,
        args: Vec<(Option<String>, Value, Span)>,
    ) -> Result<ResourceBuilder> {
        let prop_names: Vec<String> = def
            .properties
            .iter()
            .filter(|(_, schema)| !schema.promise)
            .map(|(name, _)| name.clone())
            .collect();
        let mut builder = ResourceBuilder::new(def.clone());
        let mut positional = 0usize;
        for (name, value, arg_span) in args {
            let property = match name {
                Some(name) => {
                    if !prop_names.contains(&name) {
                        return Err(self.error_at(
                            ErrorKind::Constructor(format!(
                                "resource `{}` has no property `{name}`",
                                def.name
                            )),
                            arg_span,
                        ));
                    }
                    name
                }
                None => {
                    let property = prop_names.get(positional).cloned().ok_or_else(|| {
                        self.error_at(
                            ErrorKind::Constructor(format!(
                                "too many arguments for `{}` ({} properties)",
                                def.name,
                                prop_names.len()
                            )),
                            arg_span,
                        )
                    })?;
                    positional += 1;
                    property
                }
            };
            builder.assign(&property, value, arg_span).map_err(|_| {
                self.error_at(
                    ErrorKind::Constructor(format!("property `{property}` given twice")),
                    arg_span,
                )
            })?;
        }
        Ok(builder)
    }

    /// Declared overloads: filter by arity and names, then by parameter
    /// types, then settle ties with `@constraint`.
    fn construct_dispatched(
        &mut self,
        def: &Rc<ResourceDef>,
        args: Vec<(Option<String>, Value, Span)>,
        scope: &mut ScopeStack,
        span: Span,
    ) -> Result<ResourceBuilder> {
        type Bound = IndexMap<String, (Value, Span)>;

        let bind_args = |ctor: &Constructor| -> Option<Bound> {
            let mut bound: Bound = IndexMap::new();
            let mut positional = 0usize;
            for (name, value, arg_span) in &args {
                match name {
                    Some(name) => {
                        ctor.params.iter().find(|p| &p.name == name)?;
                        if bound.contains_key(name) {
                            return None;
                        }
                        bound.insert(name.clone(), (value.clone(), *arg_span));
                    }
                    None => {
                        let param = ctor.params.get(positional)?;
                        positional += 1;
                        bound.insert(param.name.clone(), (value.clone(), *arg_span));
                    }
                }
            }
            for param in &ctor.params {
                if !bound.contains_key(&param.name) && param.default.is_none() {
                    return None;
                }
            }
            Some(bound)
        };

        // Arity / name filter, then type compatibility (probe coercions).
        let mut candidates: Vec<(Constructor, Bound)> = Vec::new();
        for ctor in &def.constructors {
            let Some(bound) = bind_args(ctor) else { continue };
            let types_match = ctor.params.iter().all(|param| {
                let Some(ty) = &param.ty else { return true };
                let Some((value, arg_span)) = bound.get(&param.name) else { return true };
                self.coerce(value.clone(), ty, scope, *arg_span).is_ok()
            });
            if types_match {
                candidates.push((ctor.clone(), bound));
            }
        }

        let (ctor, bound) = match candidates.len() {
            0 => {
                return Err(self.error_at(
                    ErrorKind::Constructor(format!(
                        "no constructor of `{}` matches the given arguments",
                        def.name
                    )),
                    span,
                ));
            }
            1 => candidates.remove(0),
            _ => {
                if candidates.iter().any(|(c, _)| c.constraint.is_none()) {
                    return Err(self.error_at(
                        ErrorKind::Type(TypeError::Ambiguous {
                            callee: def.name.clone(),
                            detail: "multiple constructors match; add @constraint to \
                                     disambiguate"
                                .to_string(),
                        }),
                        span,
                    ));
                }
                let mut satisfied = Vec::new();
                for candidate in candidates {
                    let constraint = candidate.0.constraint.clone().expect("checked above");
                    scope.push();
                    for (name, (value, arg_span)) in &candidate.1 {
                        scope.store_local(name, value.clone(), *arg_span);
                    }
                    let outcome = self.eval_expr(&constraint, scope);
                    scope.pop();
                    let value = outcome?;
                    let holds = value
                        .as_bool()
                        .ok_or_else(|| self.type_mismatch("bool", &value, span))?;
                    if holds {
                        satisfied.push(candidate);
                    }
                }
                if satisfied.len() != 1 {
                    return Err(self.error_at(
                        ErrorKind::Type(TypeError::Ambiguous {
                            callee: def.name.clone(),
                            detail: format!(
                                "{} constraint(s) hold for this call; exactly one must",
                                satisfied.len()
                            ),
                        }),
                        span,
                    ));
                }
                satisfied.remove(0)
            }
        };

        // Execute the winning constructor body with `self` and the bound
        // parameters in a fresh frame.
        let builder = Rc::new(RefCell::new(ResourceBuilder::new(def.clone())));
        scope.push();
        scope.store_local("self", Value::Builder(builder.clone()), span);
        let outcome = self.run_constructor(&ctor, &bound, scope);
        scope.pop();
        outcome?;

        let builder = Rc::try_unwrap(builder).map_err(|_| {
            self.error_at(
                ErrorKind::Constructor("`self` cannot escape its constructor".to_string()),
                span,
            )
        })?;
        Ok(builder.into_inner())
    }

    fn run_constructor(
        &mut self,
        ctor: &Constructor,
        bound: &IndexMap<String, (Value, Span)>,
        scope: &mut ScopeStack,
    ) -> Result<()> {
        for param in &ctor.params {
            let value = match bound.get(&param.name) {
                Some((value, arg_span)) => match &param.ty {
                    Some(ty) => self.coerce(value.clone(), ty, scope, *arg_span)?,
                    None => value.clone(),
                },
                None => {
                    let default = param.default.clone().expect("dispatch checked defaults");
                    let value = self.eval_expr(&default, scope)?;
                    match &param.ty {
                        Some(ty) => self.coerce(value, ty, scope, param.span)?,
                        None => value,
                    }
                }
            };
            scope.store_local(&param.name, value, param.span);
        }
        self.eval_block(&ctor.body, scope)
    }

    /// Validates assignments, fills defaults, coerces properties, computes
    /// the index, links promise owners, freezes, and registers.
    fn close_construction(
        &mut self,
        builder: ResourceBuilder,
        scope: &mut ScopeStack,
        span: Span,
    ) -> Result<Value> {
        let def = builder.def.clone();
        let missing = builder.missing_properties();
        if !missing.is_empty() {
            return Err(self.error_at(
                ErrorKind::Constructor(format!(
                    "constructor for `{}` did not assign: {}",
                    def.name,
                    missing.join(", ")
                )),
                span,
            ));
        }

        let mut values = builder.values;
        for (name, schema) in &def.properties {
            if schema.promise || values.contains_key(name) {
                continue;
            }
            let default = schema
                .default
                .clone()
                .expect("missing_properties covers undefaulted properties");
            scope.push();
            let outcome = self.eval_expr(&default, scope);
            scope.pop();
            values.insert(name.clone(), outcome?);
        }

        let mut properties = IndexMap::new();
        for (name, schema) in &def.properties {
            let raw = values
                .shift_remove(name)
                .expect("every property is assigned, defaulted or a promise");
            let value = if schema.promise {
                raw
            } else {
                self.coerce(raw, &schema.ty, scope, span)?
            };
            properties.insert(name.clone(), value);
        }

        let index = compute_index(&def, &properties).map_err(|err| match err {
            IndexComputeError::Unindexable => self.error_at(
                ErrorKind::Index(IndexError::Unindexable { def: def.name.clone() }),
                span,
            ),
            IndexComputeError::BadPath { path, reason } => self.error_at(
                ErrorKind::Constructor(format!("@index path `{path}`: {reason}")),
                span,
            ),
        })?;

        let instance = Rc::new(ResourceInstance {
            def: def.clone(),
            properties,
            index: index.clone(),
            linked: RefCell::new(None),
        });

        for (name, value) in &instance.properties {
            let schema = def.properties.get(name).expect("schema and instance align");
            if schema.promise {
                if let Value::Promise(promise) = value {
                    *promise.owner.borrow_mut() = Some(PromiseOwner {
                        def_name: def.name.clone(),
                        index: index.clone(),
                    });
                }
            }
        }

        for value in instance.properties.values() {
            value.freeze();
        }

        if !self.resources.register(instance.clone()) {
            return Err(self.error_at(
                ErrorKind::Index(IndexError::Duplicate { def: def.name.clone(), index }),
                span,
            ));
        }
        tracing::debug!(index = %instance.index, "registered resource");
        Ok(Value::Resource(instance))
    }

    // ==================================================================
    // Diagnostics helpers
    // ==================================================================

    fn type_mismatch(&self, expected: &str, found: &Value, span: Span) -> eiko_base::EikoError {
        self.error_at(
            ErrorKind::Type(TypeError::Mismatch {
                expected: expected.to_string(),
                found: found.type_of().to_string(),
            }),
            span,
        )
    }

    fn not_coercible(&self, from: &str, to: &Type, span: Span) -> eiko_base::EikoError {
        self.error_at(
            ErrorKind::Type(TypeError::NotCoercible {
                from: from.to_string(),
                to: to.to_string(),
            }),
            span,
        )
    }
}

fn builtin_type(name: &str) -> Option<Type> {
    Some(match name {
        "bool" => Type::Bool,
        "int" => Type::Int,
        "float" => Type::Float,
        "str" => Type::Str,
        "Path" => Type::Path,
        "ProtectedStr" => Type::ProtectedStr,
        _ => return None,
    })
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
    }
}
