//! The type-expression mini-grammar.
//!
//! Annotations and typedef bases are parsed here, never by the expression
//! parser. The grammar is tiny on purpose:
//!
//! ```text
//! type   := "None"
//!         | NAME
//!         | NAME "[" type ("," type)* [","] "]"
//! ```
//!
//! Which generic names are meaningful (`list`, `dict`, `Optional`, `Union`)
//! is decided by the evaluator when the annotation is resolved against the
//! scope; the parser only records the shape.

use super::{ParseResult, Parser};
use crate::ast::{TypeExpr, TypeExprKind};
use crate::token::{Keyword, TokenKind};

pub(crate) trait TypeParsing {
    fn parse_type_expr(&mut self) -> ParseResult<TypeExpr>;
}

impl TypeParsing for Parser<'_> {
    fn parse_type_expr(&mut self) -> ParseResult<TypeExpr> {
        if self.at_keyword(Keyword::NoneKw) {
            let span = self.advance().span;
            return Ok(TypeExpr { kind: TypeExprKind::None, span });
        }

        let (name, name_span) = match self.peek_kind() {
            TokenKind::Ident(sym) => {
                let sym = *sym;
                (sym, self.advance().span)
            }
            _ => return Err(self.unexpected("a type name")),
        };

        if !self.at(&TokenKind::LBracket) {
            return Ok(TypeExpr { kind: TypeExprKind::Name(name), span: name_span });
        }

        self.advance();
        let mut args = Vec::new();
        while !self.at(&TokenKind::RBracket) {
            args.push(self.parse_type_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RBracket)?;
        if args.is_empty() {
            return Err(self.syntax_error("type parameter list cannot be empty", name_span.to(end)));
        }
        Ok(TypeExpr {
            kind: TypeExprKind::Generic { name, args },
            span: name_span.to(end),
        })
    }
}
