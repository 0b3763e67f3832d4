//! Indentation-sensitive lexer for Eiko source.
//!
//! The lexer works line by line. At the start of every logical line it
//! measures the indentation prefix against a stack of column widths and emits
//! [`TokenKind::Indent`] / [`TokenKind::Dedent`] tokens; the rest of the line
//! is scanned character by character into value tokens. Structural tokens are
//! suppressed while any bracket is open, so call arguments and collection
//! literals can spread over multiple lines (with a trailing comma before the
//! closing bracket if the author likes).
//!
//! Blank lines and comment-only lines never touch the indent stack. A file
//! that ends without a trailing newline — even in the middle of a comment —
//! still closes every open block.
//!
//! Two hard rules come straight from the language definition:
//!
//! - mixing tabs and spaces inside one indentation prefix is a lex error;
//! - a dedent must land exactly on an enclosing indentation level.
//!
//! String literals accept `'` and `"` delimiters, an `r` prefix (escapes kept
//! verbatim) and an `f` prefix. F-strings are split in the token stream:
//! `f"a {b} c"` becomes `FStringStart, FStringLit("a "), FStringExprStart,
//! Ident(b), FStringExprEnd, FStringLit(" c"), FStringEnd`.

use eiko_base::{EikoError, ErrorKind, FileId, Interner, Result, Span};

use crate::token::{Keyword, Token, TokenKind};

pub struct Lexer<'src, 'int> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    /// Exclusive scan limit; temporarily narrowed while lexing an f-string
    /// expression fragment.
    limit: usize,
    file: FileId,
    interner: &'int mut Interner,
    tokens: Vec<Token>,
    indent_stack: Vec<usize>,
    bracket_depth: usize,
}

enum LineStart {
    Content,
    Eof,
}

impl<'src, 'int> Lexer<'src, 'int> {
    pub fn new(source: &'src str, file: FileId, interner: &'int mut Interner) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            limit: source.len(),
            file,
            interner,
            tokens: Vec::new(),
            indent_stack: vec![0],
            bracket_depth: 0,
        }
    }

    /// Runs the lexer to completion, returning the token stream ending in
    /// [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        loop {
            match self.begin_line()? {
                LineStart::Eof => break,
                LineStart::Content => {}
            }
            self.scan_content()?;
            if self.pos >= self.limit {
                break;
            }
        }

        // Close the final logical line and every open block.
        if !matches!(self.tokens.last().map(|t| &t.kind), None | Some(TokenKind::Newline)) {
            self.push(TokenKind::Newline, Span::point(self.limit));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, Span::point(self.limit));
        }
        self.push(TokenKind::Eof, Span::point(self.limit));
        Ok(self.tokens)
    }

    fn err(&self, message: impl Into<String>, span: Span) -> EikoError {
        EikoError::new(ErrorKind::Lex(message.into()), span).in_file(self.file)
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token::new(kind, span));
    }

    /// Handles indentation at the start of a logical line: skips blank and
    /// comment-only lines, then emits Indent/Dedent against the stack.
    fn begin_line(&mut self) -> Result<LineStart> {
        loop {
            if self.pos >= self.limit {
                return Ok(LineStart::Eof);
            }
            let line_start = self.pos;
            let (width, content_start) = self.measure_indent(line_start)?;

            match self.bytes.get(content_start) {
                None => {
                    self.pos = self.limit;
                    return Ok(LineStart::Eof);
                }
                Some(b'\n') => {
                    self.pos = content_start + 1;
                    continue;
                }
                Some(b'\r') => {
                    self.pos = (content_start + 2).min(self.limit);
                    continue;
                }
                Some(b'#') => {
                    self.pos = content_start;
                    self.skip_comment();
                    if self.pos < self.limit {
                        self.pos += 1; // the newline
                    }
                    continue;
                }
                Some(_) => {
                    self.pos = content_start;
                    self.apply_indent(width, Span::new(line_start, content_start))?;
                    return Ok(LineStart::Content);
                }
            }
        }
    }

    /// Counts the indentation prefix. Tabs and spaces may not be mixed
    /// within one prefix.
    fn measure_indent(&self, line_start: usize) -> Result<(usize, usize)> {
        let mut pos = line_start;
        let mut saw_space = false;
        let mut saw_tab = false;
        let mut width = 0;
        while pos < self.limit {
            match self.bytes[pos] {
                b' ' => {
                    saw_space = true;
                    width += 1;
                    pos += 1;
                }
                b'\t' => {
                    saw_tab = true;
                    width += 1;
                    pos += 1;
                }
                _ => break,
            }
        }
        if saw_space && saw_tab {
            return Err(self.err(
                "inconsistent use of tabs and spaces in indentation",
                Span::new(line_start, pos),
            ));
        }
        Ok((width, pos))
    }

    fn apply_indent(&mut self, width: usize, span: Span) -> Result<()> {
        let current = *self.indent_stack.last().unwrap();
        if width > current {
            self.indent_stack.push(width);
            self.push(TokenKind::Indent, span);
            return Ok(());
        }
        while width < *self.indent_stack.last().unwrap() {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, span);
        }
        if width != *self.indent_stack.last().unwrap() {
            return Err(self.err(
                "unindent does not match any outer indentation level",
                span,
            ));
        }
        Ok(())
    }

    /// Scans value tokens until the logical line ends (a newline outside any
    /// bracket) or the input runs out.
    fn scan_content(&mut self) -> Result<()> {
        while self.pos < self.limit {
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    if self.bracket_depth == 0 {
                        let span = Span::new(self.pos, self.pos + 1);
                        self.push(TokenKind::Newline, span);
                        self.pos += 1;
                        return Ok(());
                    }
                    self.pos += 1;
                }
                b'#' => self.skip_comment(),
                _ => self.scan_token()?,
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while self.pos < self.limit && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn scan_token(&mut self) -> Result<()> {
        let start = self.pos;
        let c = self.bytes[start];

        if c == b'_' || c.is_ascii_alphabetic() {
            return self.scan_word(start);
        }
        if c.is_ascii_digit() {
            return self.scan_number(start);
        }
        if c == b'"' || c == b'\'' {
            let value = self.scan_string_body(start, c, false)?;
            let span = Span::new(start, self.pos);
            self.push(TokenKind::Str(value), span);
            return Ok(());
        }

        self.pos += 1;
        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => {
                if self.peek() == Some(b'/') {
                    self.pos += 1;
                    TokenKind::SlashSlash
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => TokenKind::Percent,
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::NotEq
                } else {
                    return Err(self.err("unexpected character `!`", Span::new(start, start + 1)));
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            b'(' => {
                self.bracket_depth += 1;
                TokenKind::LParen
            }
            b')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RParen
            }
            b'[' => {
                self.bracket_depth += 1;
                TokenKind::LBracket
            }
            b']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RBracket
            }
            b'{' => {
                self.bracket_depth += 1;
                TokenKind::LBrace
            }
            b'}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RBrace
            }
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'@' => TokenKind::At,
            b'.' => {
                if self.peek() == Some(b'.') {
                    if self.bytes.get(self.pos + 1) == Some(&b'.') {
                        self.pos += 2;
                        TokenKind::Ellipsis
                    } else {
                        return Err(self.err("unexpected `..`", Span::new(start, start + 2)));
                    }
                } else {
                    TokenKind::Dot
                }
            }
            other => {
                let ch = self.source[start..].chars().next().unwrap_or(other as char);
                // Re-sync pos to a char boundary for multi-byte input.
                self.pos = start + ch.len_utf8();
                return Err(self.err(
                    format!("unexpected character `{ch}`"),
                    Span::new(start, self.pos),
                ));
            }
        };
        self.push(kind, Span::new(start, self.pos));
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        if self.pos < self.limit {
            Some(self.bytes[self.pos])
        } else {
            None
        }
    }

    /// Identifiers, keywords, and the `r`/`f` string prefixes.
    fn scan_word(&mut self, start: usize) -> Result<()> {
        let mut end = start;
        while end < self.limit
            && (self.bytes[end] == b'_' || self.bytes[end].is_ascii_alphanumeric())
        {
            end += 1;
        }
        let word = &self.source[start..end];

        // A one-letter prefix directly followed by a quote is a string.
        if (word == "r" || word == "f") && matches!(self.bytes.get(end), Some(b'"') | Some(b'\'')) {
            let delim = self.bytes[end];
            self.pos = end;
            if word == "r" {
                let value = self.scan_string_body(self.pos, delim, true)?;
                let span = Span::new(start, self.pos);
                self.push(TokenKind::Str(value), span);
            } else {
                self.scan_fstring(start, delim)?;
            }
            return Ok(());
        }

        self.pos = end;
        let span = Span::new(start, end);
        match Keyword::from_str(word) {
            Some(kw) => self.push(TokenKind::Keyword(kw), span),
            None => {
                let sym = self.interner.intern(word);
                self.push(TokenKind::Ident(sym), span);
            }
        }
        Ok(())
    }

    fn scan_number(&mut self, start: usize) -> Result<()> {
        let mut end = start;
        while end < self.limit && self.bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut is_float = false;
        if end < self.limit
            && self.bytes[end] == b'.'
            && self.bytes.get(end + 1).is_some_and(|b| b.is_ascii_digit())
        {
            is_float = true;
            end += 1;
            while end < self.limit && self.bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
        self.pos = end;
        let span = Span::new(start, end);
        let text = &self.source[start..end];
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.err(format!("invalid float literal `{text}`"), span))?;
            self.push(TokenKind::Float(value), span);
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.err(format!("integer literal out of range `{text}`"), span))?;
            self.push(TokenKind::Int(value), span);
        }
        Ok(())
    }

    /// Consumes a plain or raw string starting at the opening quote;
    /// `self.pos` ends past the closing quote. Strings are single-line.
    fn scan_string_body(&mut self, open: usize, delim: u8, raw: bool) -> Result<String> {
        debug_assert!(matches!(self.bytes[self.pos], b'"' | b'\''));
        self.pos += 1;
        let mut value = String::new();
        while self.pos < self.limit {
            let b = self.bytes[self.pos];
            if b == delim {
                self.pos += 1;
                return Ok(value);
            }
            if b == b'\n' {
                break;
            }
            if b == b'\\' && !raw {
                self.pos += 1;
                let Some(&esc) = self.bytes.get(self.pos) else { break };
                match esc {
                    b'n' => value.push('\n'),
                    b't' => value.push('\t'),
                    b'r' => value.push('\r'),
                    b'0' => value.push('\0'),
                    b'\\' => value.push('\\'),
                    b'\'' => value.push('\''),
                    b'"' => value.push('"'),
                    other => {
                        // Unknown escapes pass through verbatim.
                        value.push('\\');
                        value.push(other as char);
                    }
                };
                self.pos += 1;
                continue;
            }
            let ch = self.source[self.pos..].chars().next().unwrap();
            value.push(ch);
            self.pos += ch.len_utf8();
        }
        Err(self.err("unterminated string literal", Span::new(open, self.pos)))
    }

    /// Lexes `f"..."`, splitting literal pieces from `{...}` expressions.
    fn scan_fstring(&mut self, start: usize, delim: u8) -> Result<()> {
        self.push(TokenKind::FStringStart, Span::new(start, self.pos + 1));
        self.pos += 1; // opening quote
        let mut lit = String::new();
        let mut lit_start = self.pos;

        loop {
            let Some(&b) = self.bytes.get(self.pos).filter(|_| self.pos < self.limit) else {
                return Err(self.err("unterminated f-string literal", Span::new(start, self.pos)));
            };
            if b == delim {
                if !lit.is_empty() {
                    self.push(TokenKind::FStringLit(std::mem::take(&mut lit)), Span::new(lit_start, self.pos));
                }
                self.push(TokenKind::FStringEnd, Span::new(self.pos, self.pos + 1));
                self.pos += 1;
                return Ok(());
            }
            if b == b'\n' {
                return Err(self.err("unterminated f-string literal", Span::new(start, self.pos)));
            }
            if b == b'{' {
                if self.bytes.get(self.pos + 1) == Some(&b'{') {
                    lit.push('{');
                    self.pos += 2;
                    continue;
                }
                if !lit.is_empty() {
                    self.push(TokenKind::FStringLit(std::mem::take(&mut lit)), Span::new(lit_start, self.pos));
                }
                self.scan_fstring_expr(delim)?;
                lit_start = self.pos;
                continue;
            }
            if b == b'}' {
                if self.bytes.get(self.pos + 1) == Some(&b'}') {
                    lit.push('}');
                    self.pos += 2;
                    continue;
                }
                return Err(self.err(
                    "single `}` in f-string; use `}}` for a literal brace",
                    Span::new(self.pos, self.pos + 1),
                ));
            }
            if b == b'\\' {
                self.pos += 1;
                let Some(&esc) = self.bytes.get(self.pos) else {
                    return Err(self.err("unterminated f-string literal", Span::new(start, self.pos)));
                };
                match esc {
                    b'n' => lit.push('\n'),
                    b't' => lit.push('\t'),
                    b'r' => lit.push('\r'),
                    b'\\' => lit.push('\\'),
                    b'\'' => lit.push('\''),
                    b'"' => lit.push('"'),
                    other => {
                        lit.push('\\');
                        lit.push(other as char);
                    }
                };
                self.pos += 1;
                continue;
            }
            let ch = self.source[self.pos..].chars().next().unwrap();
            lit.push(ch);
            self.pos += ch.len_utf8();
        }
    }

    /// Lexes one `{expr}` inside an f-string by narrowing the scan limit to
    /// the matching close brace and running the ordinary token scanner.
    fn scan_fstring_expr(&mut self, delim: u8) -> Result<()> {
        let open = self.pos;
        self.push(TokenKind::FStringExprStart, Span::new(open, open + 1));
        self.pos += 1;

        let close = self.find_expr_close(open, delim)?;
        if self.source[self.pos..close].trim().is_empty() {
            return Err(self.err("empty expression in f-string", Span::new(open, close + 1)));
        }

        let saved_limit = self.limit;
        self.limit = close;
        while self.pos < self.limit {
            match self.bytes[self.pos] {
                b' ' | b'\t' => self.pos += 1,
                _ => self.scan_token()?,
            }
        }
        self.limit = saved_limit;

        self.push(TokenKind::FStringExprEnd, Span::new(close, close + 1));
        self.pos = close + 1;
        Ok(())
    }

    /// Finds the `}` matching the brace at `open`, skipping nested brackets
    /// and string literals.
    fn find_expr_close(&self, open: usize, delim: u8) -> Result<usize> {
        let mut depth = 0usize;
        let mut pos = open + 1;
        while pos < self.limit {
            match self.bytes[pos] {
                b'}' if depth == 0 => return Ok(pos),
                b'{' | b'(' | b'[' => depth += 1,
                b'}' | b')' | b']' => depth = depth.saturating_sub(1),
                q @ (b'"' | b'\'') if q != delim => {
                    pos += 1;
                    while pos < self.limit && self.bytes[pos] != q && self.bytes[pos] != b'\n' {
                        pos += 1;
                    }
                }
                b'\n' => break,
                _ => {}
            }
            pos += 1;
        }
        Err(self.err(
            "missing `}` in f-string expression",
            Span::new(open, pos.min(self.limit)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eiko_base::SourceMap;
    use std::path::PathBuf;

    fn lex(source: &str) -> Result<Vec<TokenKind>> {
        let mut sources = SourceMap::new();
        let file = sources.add(PathBuf::from("test.eiko"), source.to_string());
        let mut interner = Interner::new();
        Lexer::new(source, file, &mut interner)
            .tokenize()
            .map(|tokens| tokens.into_iter().map(|t| t.kind).collect())
    }

    fn lex_ok(source: &str) -> Vec<TokenKind> {
        lex(source).expect("lexing should succeed")
    }

    #[test]
    fn assignment_line() {
        let kinds = lex_ok("a = 1\n");
        assert!(matches!(kinds[0], TokenKind::Ident(_)));
        assert_eq!(kinds[1], TokenKind::Assign);
        assert_eq!(kinds[2], TokenKind::Int(1));
        assert_eq!(kinds[3], TokenKind::Newline);
        assert_eq!(kinds[4], TokenKind::Eof);
    }

    #[test]
    fn indent_and_dedent_are_emitted() {
        let kinds = lex_ok("resource S:\n    port: int\n");
        assert!(kinds.contains(&TokenKind::Indent));
        assert!(kinds.contains(&TokenKind::Dedent));
    }

    #[test]
    fn blank_and_comment_lines_do_not_dedent() {
        let kinds = lex_ok("resource S:\n    a: int\n\n    # note\n    b: int\n");
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 1);
    }

    #[test]
    fn mixed_tabs_and_spaces_is_an_error() {
        let err = lex("resource S:\n \ta: int\n").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Lex(_)));
        assert!(err.to_string().contains("tabs and spaces"));
    }

    #[test]
    fn bad_dedent_is_an_error() {
        let err = lex("resource S:\n        a: int\n    b: int\n").unwrap_err();
        assert!(err.to_string().contains("unindent"));
    }

    #[test]
    fn newlines_inside_brackets_are_suppressed() {
        let kinds = lex_ok("x = [\n    1,\n    2,\n]\n");
        let newlines = kinds.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!kinds.contains(&TokenKind::Indent));
    }

    #[test]
    fn final_comment_without_newline_closes_cleanly() {
        let kinds = lex_ok("a = 1\n# trailing comment");
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
        assert_eq!(kinds[kinds.len() - 2], TokenKind::Newline);
    }

    #[test]
    fn final_line_without_newline_closes_blocks() {
        let kinds = lex_ok("resource S:\n    a: int");
        assert!(kinds.contains(&TokenKind::Dedent));
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn string_escapes_are_cooked() {
        let kinds = lex_ok("s = \"a\\nb\"\n");
        assert!(kinds.contains(&TokenKind::Str("a\nb".into())));
    }

    #[test]
    fn raw_strings_keep_escapes() {
        let kinds = lex_ok("s = r\"a\\nb\"\n");
        assert!(kinds.contains(&TokenKind::Str("a\\nb".into())));
    }

    #[test]
    fn single_quoted_strings_work() {
        let kinds = lex_ok("s = 'hi'\n");
        assert!(kinds.contains(&TokenKind::Str("hi".into())));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(lex("s = \"oops\n").is_err());
    }

    #[test]
    fn fstring_splits_literals_and_expressions() {
        let kinds = lex_ok("s = f\"a {b} c\"\n");
        let expected = [
            TokenKind::FStringStart,
            TokenKind::FStringLit("a ".into()),
            TokenKind::FStringExprStart,
        ];
        let start = kinds.iter().position(|k| *k == TokenKind::FStringStart).unwrap();
        assert_eq!(&kinds[start..start + 3], &expected);
        assert!(kinds.contains(&TokenKind::FStringExprEnd));
        assert!(kinds.contains(&TokenKind::FStringLit(" c".into())));
        assert!(kinds.contains(&TokenKind::FStringEnd));
    }

    #[test]
    fn fstring_brace_escapes() {
        let kinds = lex_ok("s = f\"{{x}}\"\n");
        assert!(kinds.contains(&TokenKind::FStringLit("{x}".into())));
    }

    #[test]
    fn fstring_nested_call_expression() {
        let kinds = lex_ok("s = f\"v={get(1, 2)}\"\n");
        assert!(kinds.contains(&TokenKind::FStringExprStart));
        assert!(kinds.contains(&TokenKind::Comma));
    }

    #[test]
    fn floats_and_ints() {
        let kinds = lex_ok("a = 1.5\nb = 42\n");
        assert!(kinds.contains(&TokenKind::Float(1.5)));
        assert!(kinds.contains(&TokenKind::Int(42)));
    }

    #[test]
    fn floor_div_and_comparisons() {
        let kinds = lex_ok("x = a // b <= c != d\n");
        assert!(kinds.contains(&TokenKind::SlashSlash));
        assert!(kinds.contains(&TokenKind::LtEq));
        assert!(kinds.contains(&TokenKind::NotEq));
    }

    #[test]
    fn ellipsis_token() {
        let kinds = lex_ok("resource B(A):\n    ...\n");
        assert!(kinds.contains(&TokenKind::Ellipsis));
    }

    #[test]
    fn keywords_are_not_identifiers() {
        let kinds = lex_ok("if promise in for\n");
        assert_eq!(
            kinds[..4],
            [
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::Promise),
                TokenKind::Keyword(Keyword::In),
                TokenKind::Keyword(Keyword::For),
            ]
        );
    }

    #[test]
    fn decorator_tokens() {
        let kinds = lex_ok("@index([\"name\"])\nresource S:\n    name: str\n");
        assert_eq!(kinds[0], TokenKind::At);
    }
}
