//! Statement and declaration parsing.

use super::{ExprParsing, ParseResult, Parser, TypeParsing};
use crate::ast::{
    AssignTarget, ConstructorDecl, Decorator, EnumDecl, ExprKind, Literal, Param,
    PropertyDecl, ResourceDecl, Stmt, StmtKind, TypedefDecl,
};
use crate::token::{Keyword, TokenKind};

pub(crate) trait StmtParsing {
    fn parse_top_stmt(&mut self) -> ParseResult<Stmt>;
    fn parse_block_stmt(&mut self) -> ParseResult<Stmt>;
    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>>;
    fn parse_simple_stmt(&mut self) -> ParseResult<Stmt>;
    fn parse_if(&mut self) -> ParseResult<Stmt>;
    fn parse_for(&mut self) -> ParseResult<Stmt>;
    fn parse_import(&mut self) -> ParseResult<Stmt>;
    fn parse_from_import(&mut self) -> ParseResult<Stmt>;
    fn parse_typedef(&mut self) -> ParseResult<Stmt>;
    fn parse_enum(&mut self) -> ParseResult<Stmt>;
    fn parse_decorators(&mut self) -> ParseResult<Vec<Decorator>>;
    fn parse_resource(&mut self, decorators: Vec<Decorator>) -> ParseResult<Stmt>;
    fn parse_constructor(&mut self, decorators: Vec<Decorator>, extra: &mut Vec<Decorator>)
        -> ParseResult<ConstructorDecl>;
    fn parse_params(&mut self) -> ParseResult<Vec<Param>>;
}

impl StmtParsing for Parser<'_> {
    fn parse_top_stmt(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind() {
            TokenKind::At => {
                let decorators = self.parse_decorators()?;
                if self.at_keyword(Keyword::Resource) {
                    self.parse_resource(decorators)
                } else {
                    Err(self.unexpected("a resource declaration after decorators"))
                }
            }
            TokenKind::Keyword(Keyword::Resource) => self.parse_resource(Vec::new()),
            TokenKind::Keyword(Keyword::Import) => self.parse_import(),
            TokenKind::Keyword(Keyword::From) => self.parse_from_import(),
            TokenKind::Keyword(Keyword::Typedef) => self.parse_typedef(),
            TokenKind::Keyword(Keyword::Enum) => self.parse_enum(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            _ => self.parse_simple_stmt(),
        }
    }

    /// Statements allowed inside `if`/`for`/constructor bodies. Declarations
    /// live at module scope only.
    fn parse_block_stmt(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind() {
            TokenKind::Keyword(
                kw @ (Keyword::Resource | Keyword::Typedef | Keyword::Enum | Keyword::Import
                | Keyword::From),
            ) => {
                let kw = *kw;
                Err(self.syntax_error(
                    format!("`{}` is only allowed at module scope", kw.as_str()),
                    self.peek().span,
                ))
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Ellipsis => {
                let span = self.advance().span;
                self.expect_newline()?;
                Ok(Stmt::new(StmtKind::Pass, span))
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// `: NEWLINE INDENT stmt+ DEDENT` with per-statement recovery.
    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::Colon)?;
        self.expect_newline()?;
        self.expect(&TokenKind::Indent)?;
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::Dedent) || self.at_eof() {
                break;
            }
            match self.parse_block_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.recover();
                }
            }
        }
        Ok(stmts)
    }

    fn parse_simple_stmt(&mut self) -> ParseResult<Stmt> {
        let expr = self.parse_expr()?;
        let start = expr.span;

        if self.at(&TokenKind::Colon) {
            let ExprKind::Ident(name) = expr.kind else {
                return Err(self.syntax_error("only a name can be annotated", expr.span));
            };
            self.advance();
            let annotation = self.parse_type_expr()?;
            if self.eat(&TokenKind::Assign) {
                let value = self.parse_expr()?;
                let span = start.to(value.span);
                self.expect_newline()?;
                return Ok(Stmt::new(
                    StmtKind::Assign {
                        target: AssignTarget::Name(name),
                        target_span: start,
                        annotation: Some(annotation),
                        value,
                    },
                    span,
                ));
            }
            let span = start.to(annotation.span);
            self.expect_newline()?;
            return Ok(Stmt::new(StmtKind::Declare { name, annotation }, span));
        }

        if self.eat(&TokenKind::Assign) {
            let target = match &expr.kind {
                ExprKind::Ident(sym) if *sym != self.self_sym => AssignTarget::Name(*sym),
                ExprKind::Attr { base, name, .. }
                    if matches!(base.kind, ExprKind::Ident(b) if b == self.self_sym) =>
                {
                    AssignTarget::SelfAttr(*name)
                }
                _ => {
                    return Err(self.syntax_error("invalid assignment target", expr.span));
                }
            };
            let value = self.parse_expr()?;
            let span = start.to(value.span);
            self.expect_newline()?;
            return Ok(Stmt::new(
                StmtKind::Assign { target, target_span: start, annotation: None, value },
                span,
            ));
        }

        self.expect_newline()?;
        Ok(Stmt::new(StmtKind::Expr(expr), start))
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.expect_keyword(Keyword::If)?;
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        branches.push((cond, body));
        let mut end = start;

        while self.at_keyword(Keyword::Elif) {
            end = self.advance().span;
            let cond = self.parse_expr()?;
            let body = self.parse_block()?;
            branches.push((cond, body));
        }

        let else_body = if self.at_keyword(Keyword::Else) {
            end = self.advance().span;
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Stmt::new(StmtKind::If { branches, else_body }, start.to(end)))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.expect_keyword(Keyword::For)?;
        let (var, var_span) = self.expect_ident()?;
        self.expect_keyword(Keyword::In)?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        let end = body.last().map(|s| s.span).unwrap_or(iter.span);
        Ok(Stmt::new(StmtKind::For { var, var_span, iter, body }, start.to(end)))
    }

    fn parse_import(&mut self) -> ParseResult<Stmt> {
        let start = self.expect_keyword(Keyword::Import)?;
        let mut path = Vec::new();
        let (first, mut end) = self.expect_ident()?;
        path.push(first);
        while self.eat(&TokenKind::Dot) {
            let (part, span) = self.expect_ident()?;
            path.push(part);
            end = span;
        }
        let alias = if self.eat_keyword(Keyword::As) {
            let (name, span) = self.expect_ident()?;
            end = span;
            Some(name)
        } else {
            None
        };
        self.expect_newline()?;
        Ok(Stmt::new(StmtKind::Import { path, alias }, start.to(end)))
    }

    fn parse_from_import(&mut self) -> ParseResult<Stmt> {
        let start = self.expect_keyword(Keyword::From)?;
        let mut dots = 0usize;
        loop {
            if self.eat(&TokenKind::Dot) {
                dots += 1;
            } else if self.eat(&TokenKind::Ellipsis) {
                dots += 3;
            } else {
                break;
            }
        }
        let mut path = Vec::new();
        while matches!(self.peek_kind(), TokenKind::Ident(_)) {
            let (part, _) = self.expect_ident()?;
            path.push(part);
            if !self.eat(&TokenKind::Dot) {
                break;
            }
        }
        if dots == 0 && path.is_empty() {
            return Err(self.unexpected("a module path"));
        }
        self.expect_keyword(Keyword::Import)?;
        let mut names = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            let alias = if self.eat_keyword(Keyword::As) {
                Some(self.expect_ident()?.0)
            } else {
                None
            };
            names.push((name, alias));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.peek().span;
        self.expect_newline()?;
        Ok(Stmt::new(StmtKind::FromImport { dots, path, names }, start.to(end)))
    }

    fn parse_typedef(&mut self) -> ParseResult<Stmt> {
        let start = self.expect_keyword(Keyword::Typedef)?;
        let (name, name_span) = self.expect_ident()?;
        let base = self.parse_type_expr()?;
        let refinement = if self.eat_keyword(Keyword::If) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = refinement.as_ref().map(|e| e.span).unwrap_or(base.span);
        self.expect_newline()?;
        Ok(Stmt::new(
            StmtKind::Typedef(TypedefDecl { name, name_span, base, refinement, span: start.to(end) }),
            start.to(end),
        ))
    }

    fn parse_enum(&mut self) -> ParseResult<Stmt> {
        let start = self.expect_keyword(Keyword::Enum)?;
        let (name, name_span) = self.expect_ident()?;
        self.expect(&TokenKind::Colon)?;
        self.expect_newline()?;
        self.expect(&TokenKind::Indent)?;
        let mut members = Vec::new();
        let mut end = name_span;
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::Dedent) || self.at_eof() {
                break;
            }
            let (member, span) = self.expect_ident()?;
            members.push((member, span));
            end = span;
            self.expect_newline()?;
        }
        if members.is_empty() {
            return Err(self.syntax_error("enum must declare at least one member", start.to(end)));
        }
        Ok(Stmt::new(
            StmtKind::Enum(EnumDecl { name, name_span, members, span: start.to(end) }),
            start.to(end),
        ))
    }

    /// One or more `@name` / `@name(args)` lines.
    fn parse_decorators(&mut self) -> ParseResult<Vec<Decorator>> {
        let mut decorators = Vec::new();
        while self.at(&TokenKind::At) {
            let start = self.advance().span;
            let (name, mut end) = self.expect_ident()?;
            let mut args = Vec::new();
            if self.eat(&TokenKind::LParen) {
                while !self.at(&TokenKind::RParen) {
                    args.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                end = self.expect(&TokenKind::RParen)?;
            }
            self.expect_newline()?;
            self.skip_newlines();
            decorators.push(Decorator { name, args, span: start.to(end) });
        }
        Ok(decorators)
    }

    fn parse_resource(&mut self, decorators: Vec<Decorator>) -> ParseResult<Stmt> {
        let start = self.expect_keyword(Keyword::Resource)?;
        let (name, name_span) = self.expect_ident()?;
        let parent = if self.eat(&TokenKind::LParen) {
            let (parent, parent_span) = self.expect_ident()?;
            self.expect(&TokenKind::RParen)?;
            Some((parent, parent_span))
        } else {
            None
        };

        let mut index_keys = None;
        let mut extra_decorators = Vec::new();
        for dec in decorators {
            if self.interner.resolve(dec.name) == "index" {
                index_keys = Some(extract_index_keys(self, &dec)?);
            } else {
                extra_decorators.push(dec);
            }
        }

        self.expect(&TokenKind::Colon)?;
        self.expect_newline()?;
        self.expect(&TokenKind::Indent)?;

        let mut properties = Vec::new();
        let mut constructors = Vec::new();
        let mut inherit_only = false;
        let mut end = name_span;

        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::Dedent) || self.at_eof() {
                break;
            }
            match self.peek_kind() {
                TokenKind::Ellipsis => {
                    end = self.advance().span;
                    self.expect_newline()?;
                    if !properties.is_empty() {
                        return Err(self.syntax_error(
                            "`...` cannot be combined with property declarations",
                            end,
                        ));
                    }
                    inherit_only = true;
                }
                TokenKind::At => {
                    let decs = self.parse_decorators()?;
                    if !self.at_keyword(Keyword::Def) && !self.at_keyword(Keyword::Implement) {
                        return Err(self.unexpected("a constructor after decorators"));
                    }
                    let ctor = self.parse_constructor(decs, &mut extra_decorators)?;
                    end = ctor.span;
                    constructors.push(ctor);
                }
                TokenKind::Keyword(Keyword::Def) | TokenKind::Keyword(Keyword::Implement) => {
                    let ctor = self.parse_constructor(Vec::new(), &mut extra_decorators)?;
                    end = ctor.span;
                    constructors.push(ctor);
                }
                TokenKind::Keyword(Keyword::Promise) => {
                    self.advance();
                    let prop = parse_property(self, true)?;
                    end = prop.span;
                    if inherit_only {
                        return Err(self.syntax_error(
                            "`...` cannot be combined with property declarations",
                            prop.span,
                        ));
                    }
                    properties.push(prop);
                }
                TokenKind::Ident(_) => {
                    let prop = parse_property(self, false)?;
                    end = prop.span;
                    if inherit_only {
                        return Err(self.syntax_error(
                            "`...` cannot be combined with property declarations",
                            prop.span,
                        ));
                    }
                    properties.push(prop);
                }
                _ => {
                    return Err(self.unexpected(
                        "a property, constructor, or `...` in resource body",
                    ));
                }
            }
        }

        let span = start.to(end);
        Ok(Stmt::new(
            StmtKind::Resource(ResourceDecl {
                name,
                name_span,
                parent,
                index_keys,
                properties,
                constructors,
                inherit_only,
                extra_decorators,
                span,
            }),
            span,
        ))
    }

    /// `def __init__(self, …):` or `implement <name>(self, …):` plus body.
    fn parse_constructor(
        &mut self,
        decorators: Vec<Decorator>,
        extra: &mut Vec<Decorator>,
    ) -> ParseResult<ConstructorDecl> {
        let start = self.advance().span; // `def` or `implement`
        let (name, _) = self.expect_ident()?;

        let mut constraint = None;
        for dec in decorators {
            if self.interner.resolve(dec.name) == "constraint" {
                if dec.args.len() != 1 {
                    return Err(self.syntax_error(
                        "@constraint expects exactly one expression",
                        dec.span,
                    ));
                }
                constraint = Some(dec.args.into_iter().next().unwrap());
            } else {
                extra.push(dec);
            }
        }

        self.expect(&TokenKind::LParen)?;
        self.expect_keyword(Keyword::SelfKw)?;
        let params = if self.eat(&TokenKind::Comma) {
            self.parse_params()?
        } else {
            Vec::new()
        };
        let end = self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;

        Ok(ConstructorDecl { name, params, body, constraint, span: start.to(end) })
    }

    /// Parameters after `self`: `name [: type] [= default]`, trailing comma
    /// permitted.
    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let (name, name_span) = self.expect_ident()?;
            let annotation = if self.eat(&TokenKind::Colon) {
                Some(self.parse_type_expr()?)
            } else {
                None
            };
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let span = name_span;
            params.push(Param { name, annotation, default, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }
}

/// `name: type [= default]` within a resource body.
fn parse_property(parser: &mut Parser<'_>, promise: bool) -> ParseResult<PropertyDecl> {
    let (name, name_span) = parser.expect_ident()?;
    parser.expect(&TokenKind::Colon)?;
    let annotation = parser.parse_type_expr()?;
    let default = if parser.eat(&TokenKind::Assign) {
        Some(parser.parse_expr()?)
    } else {
        None
    };
    if promise && default.is_some() {
        return Err(parser.syntax_error(
            "a promise property cannot have a default value",
            name_span,
        ));
    }
    let end = default.as_ref().map(|e| e.span).unwrap_or(annotation.span);
    parser.expect_newline()?;
    Ok(PropertyDecl {
        name,
        name_span,
        annotation,
        default,
        promise,
        span: name_span.to(end),
    })
}

/// Pulls the literal string list out of `@index(["a", "b.c"])`.
fn extract_index_keys(parser: &Parser<'_>, dec: &Decorator) -> ParseResult<Vec<String>> {
    let bad = |span| {
        parser.syntax_error("@index expects a list of property-path strings", span)
    };
    let [arg] = dec.args.as_slice() else {
        return Err(bad(dec.span));
    };
    let ExprKind::List(items) = &arg.kind else {
        return Err(bad(arg.span));
    };
    let mut keys = Vec::new();
    for item in items {
        let ExprKind::Literal(Literal::Str(s)) = &item.kind else {
            return Err(bad(item.span));
        };
        keys.push(s.clone());
    }
    if keys.is_empty() {
        return Err(bad(arg.span));
    }
    Ok(keys)
}

