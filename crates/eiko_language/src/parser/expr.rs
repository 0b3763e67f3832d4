//! Expression parsing with precedence climbing.
//!
//! Binding strength, loosest first: `or` < `and` < `not` < comparisons
//! (`== != < <= > >= in`) < `+ -` < `* / // %` < unary minus < postfix
//! (call, index, attribute).

use eiko_base::Span;

use super::{ParseResult, Parser};
use crate::ast::{
    BinaryOp, BoolOp, CallArg, CompareOp, Expr, ExprKind, FStringPart, Literal, UnaryOp,
};
use crate::token::{Keyword, TokenKind};

pub(crate) trait ExprParsing {
    fn parse_expr(&mut self) -> ParseResult<Expr>;
    fn parse_or(&mut self) -> ParseResult<Expr>;
    fn parse_and(&mut self) -> ParseResult<Expr>;
    fn parse_not(&mut self) -> ParseResult<Expr>;
    fn parse_comparison(&mut self) -> ParseResult<Expr>;
    fn parse_additive(&mut self) -> ParseResult<Expr>;
    fn parse_term(&mut self) -> ParseResult<Expr>;
    fn parse_unary(&mut self) -> ParseResult<Expr>;
    fn parse_postfix(&mut self) -> ParseResult<Expr>;
    fn parse_primary(&mut self) -> ParseResult<Expr>;
    fn parse_call_args(&mut self) -> ParseResult<Vec<CallArg>>;
    fn parse_fstring(&mut self, start: Span) -> ParseResult<Expr>;
}

impl ExprParsing for Parser<'_> {
    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let rhs = self.parse_and()?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Bool { op: BoolOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let rhs = self.parse_not()?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Bool { op: BoolOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.at_keyword(Keyword::Not) {
            let start = self.advance().span;
            let operand = self.parse_not()?;
            let span = start.to(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => CompareOp::Eq,
                TokenKind::NotEq => CompareOp::NotEq,
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::LtEq => CompareOp::LtEq,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::GtEq => CompareOp::GtEq,
                TokenKind::Keyword(Keyword::In) => CompareOp::In,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Compare { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.at(&TokenKind::Minus) {
            let start = self.advance().span;
            let operand = self.parse_unary()?;
            let span = start.to(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary { op: UnaryOp::Neg, operand: Box::new(operand) },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    let end = self.expect(&TokenKind::RParen)?;
                    let span = expr.span.to(end);
                    expr = Expr::new(ExprKind::Call { callee: Box::new(expr), args }, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let end = self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.to(end);
                    expr = Expr::new(
                        ExprKind::Index { base: Box::new(expr), index: Box::new(index) },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_span) = self.expect_ident()?;
                    let span = expr.span.to(name_span);
                    expr = Expr::new(
                        ExprKind::Attr { base: Box::new(expr), name, name_span },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Int(v)), tok.span))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Float(v)), tok.span))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Str(s)), tok.span))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Bool(true)), tok.span))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Bool(false)), tok.span))
            }
            TokenKind::Keyword(Keyword::NoneKw) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::None), tok.span))
            }
            TokenKind::Keyword(Keyword::SelfKw) => {
                self.advance();
                Ok(Expr::new(ExprKind::Ident(self.self_sym), tok.span))
            }
            TokenKind::Ident(sym) => {
                self.advance();
                Ok(Expr::new(ExprKind::Ident(sym), tok.span))
            }
            TokenKind::FStringStart => {
                self.advance();
                self.parse_fstring(tok.span)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.at(&TokenKind::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(&TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::List(items), tok.span.to(end)))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.at(&TokenKind::RBrace) {
                    let key = self.parse_expr()?;
                    self.expect(&TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(&TokenKind::RBrace)?;
                Ok(Expr::new(ExprKind::Dict(entries), tok.span.to(end)))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Call arguments: positional first, then keyword (`name=value`).
    /// Trailing commas are fine.
    fn parse_call_args(&mut self) -> ParseResult<Vec<CallArg>> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        while !self.at(&TokenKind::RParen) {
            let start = self.peek().span;
            let name = match (self.peek_kind(), self.peek2_kind()) {
                (TokenKind::Ident(sym), TokenKind::Assign) => {
                    let sym = *sym;
                    self.advance();
                    self.advance();
                    Some(sym)
                }
                _ => None,
            };
            if name.is_some() {
                seen_keyword = true;
            } else if seen_keyword {
                return Err(self.syntax_error(
                    "positional argument follows keyword argument",
                    start,
                ));
            }
            let value = self.parse_expr()?;
            let span = start.to(value.span);
            args.push(CallArg { name, value, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// Assembles the parts of an f-string whose `FStringStart` has been
    /// consumed.
    fn parse_fstring(&mut self, start: Span) -> ParseResult<Expr> {
        let mut parts = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::FStringLit(_) => {
                    let TokenKind::FStringLit(text) = self.advance().kind else { unreachable!() };
                    parts.push(FStringPart::Lit(text));
                }
                TokenKind::FStringExprStart => {
                    self.advance();
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::FStringExprEnd)?;
                    parts.push(FStringPart::Expr(expr));
                }
                TokenKind::FStringEnd => {
                    let end = self.advance().span;
                    return Ok(Expr::new(ExprKind::FString(parts), start.to(end)));
                }
                _ => return Err(self.unexpected("f-string content")),
            }
        }
    }
}
