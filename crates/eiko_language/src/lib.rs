//! # eiko-language
//!
//! The syntactic front half of the Eikobot compiler: tokens, the
//! indentation-sensitive lexer, the AST, and the recursive-descent parser.
//!
//! ```
//! use eiko_base::{Interner, SourceMap};
//! use eiko_language::parse_source;
//! use std::path::PathBuf;
//!
//! let mut sources = SourceMap::new();
//! let text = "port = 8080\n";
//! let file = sources.add(PathBuf::from("main.eiko"), text.to_string());
//! let mut interner = Interner::new();
//!
//! let (module, errors) = parse_source(text, file, &mut interner);
//! assert!(errors.is_empty());
//! assert_eq!(module.stmts.len(), 1);
//! ```
//!
//! Semantics (types, evaluation, resources) live in `eiko-compile`; nothing
//! in this crate touches the filesystem.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

use eiko_base::{EikoError, FileId, Interner};

pub use ast::Module;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Keyword, Token, TokenKind};

/// Lexes and parses one source file. Lex errors end the parse (there is no
/// token stream to recover on); parse errors are collected per statement.
pub fn parse_source(
    source: &str,
    file: FileId,
    interner: &mut Interner,
) -> (Module, Vec<EikoError>) {
    match Lexer::new(source, file, interner).tokenize() {
        Ok(tokens) => Parser::new(tokens, file, interner).parse_module(),
        Err(err) => (Module::default(), vec![err]),
    }
}
