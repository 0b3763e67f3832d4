//! Recursive-descent parser for Eiko.
//!
//! The parser walks the token stream produced by [`crate::lexer::Lexer`] and
//! builds a [`Module`]. Expressions use Pratt-style precedence climbing
//! ([`expr`]); statements and declarations live in [`stmt`]; type
//! annotations go through their own grammar in [`types`] so a `list[int]`
//! annotation is never parsed as an index expression.
//!
//! # Error recovery
//!
//! A syntax error abandons only the statement it occurred in: the parser
//! records the diagnostic, skips ahead to the next statement boundary (a
//! newline at the current nesting depth, or the dedent that closes the
//! enclosing block), and keeps going. [`Parser::parse_module`] therefore
//! returns both the partial module and every error found.

mod expr;
mod stmt;
mod types;

pub(crate) use expr::ExprParsing;
pub(crate) use stmt::StmtParsing;
pub(crate) use types::TypeParsing;

use eiko_base::{EikoError, ErrorKind, FileId, Interner, Span, Symbol};

use crate::ast::Module;
use crate::token::{Keyword, Token, TokenKind};

pub(crate) type ParseResult<T> = Result<T, EikoError>;

pub struct Parser<'int> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) file: FileId,
    pub(crate) interner: &'int mut Interner,
    pub(crate) errors: Vec<EikoError>,
    /// Interned `self`, used when lowering the `self` keyword to an
    /// identifier expression.
    pub(crate) self_sym: Symbol,
}

impl<'int> Parser<'int> {
    pub fn new(tokens: Vec<Token>, file: FileId, interner: &'int mut Interner) -> Self {
        let self_sym = interner.intern("self");
        Self {
            tokens,
            pos: 0,
            file,
            interner,
            errors: Vec::new(),
            self_sym,
        }
    }

    /// Parses a whole module, collecting diagnostics instead of stopping at
    /// the first bad statement.
    pub fn parse_module(mut self) -> (Module, Vec<EikoError>) {
        let mut stmts = Vec::new();
        loop {
            // Stray dedents can be left behind by recovery inside a block;
            // at module scope they carry no structure.
            while self.eat(&TokenKind::Newline) || self.eat(&TokenKind::Dedent) {}
            if self.at_eof() {
                break;
            }
            match self.parse_top_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.recover();
                }
            }
        }
        (Module { stmts }, self.errors)
    }

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn peek2_kind(&self) -> &TokenKind {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    /// Consumes the token if it matches exactly.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Span> {
        if self.at(kind) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    pub(crate) fn expect_keyword(&mut self, kw: Keyword) -> ParseResult<Span> {
        if self.at_keyword(kw) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(kw.as_str()))
        }
    }

    pub(crate) fn expect_ident(&mut self) -> ParseResult<(Symbol, Span)> {
        match self.peek_kind() {
            TokenKind::Ident(sym) => {
                let sym = *sym;
                Ok((sym, self.advance().span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    pub(crate) fn expect_newline(&mut self) -> ParseResult<()> {
        if self.eat(&TokenKind::Newline) || self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected("newline"))
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    pub(crate) fn unexpected(&self, expected: &str) -> EikoError {
        let tok = self.peek();
        self.syntax_error(
            format!("expected {expected}, found {}", tok.kind.describe()),
            tok.span,
        )
    }

    pub(crate) fn syntax_error(&self, message: impl Into<String>, span: Span) -> EikoError {
        EikoError::new(ErrorKind::Syntax(message.into()), span).in_file(self.file)
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Skips forward to the next statement boundary: a newline at the depth
    /// where the error occurred, or the dedent that closes the enclosing
    /// block (left unconsumed so the block loop sees it).
    pub(crate) fn recover(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Dedent => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}
