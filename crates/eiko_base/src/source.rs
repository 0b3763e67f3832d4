//! Source file registry.
//!
//! Every file that takes part in a compilation is registered here exactly
//! once, keyed by canonical path. Tokens and errors carry a [`FileId`] plus a
//! byte [`Span`]; the registry turns those back into file names, line/column
//! pairs, and the text of the offending line for diagnostics.

use std::path::{Path, PathBuf};

use crate::span::Span;

/// Dense handle to a registered source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One registered file: its path, contents, and a line-start index built on
/// registration so offset → line/column lookup is a binary search.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    fn new(path: PathBuf, text: String) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { path, text, line_starts }
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    /// The text of the 1-based line, without its newline.
    pub fn line_text(&self, line: usize) -> &str {
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .map(|&e| e.saturating_sub(1))
            .unwrap_or(self.text.len());
        &self.text[start..end.max(start)]
    }
}

/// Registry of all source files in a compilation.
///
/// Files are registered once per canonical path; re-registering the same
/// path returns the original [`FileId`], which is what makes the module
/// cache's "load once" guarantee observable in diagnostics.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file, reusing the id of an already-registered path.
    pub fn add(&mut self, path: PathBuf, text: String) -> FileId {
        if let Some(existing) = self.lookup(&path) {
            return existing;
        }
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile::new(path, text));
        id
    }

    /// Finds the id for an exact path, if registered.
    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.files
            .iter()
            .position(|f| f.path == path)
            .map(|i| FileId(i as u32))
    }

    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    /// Renders `file:line:col` for an error location.
    pub fn describe(&self, id: FileId, span: Span) -> String {
        let file = self.get(id);
        let (line, col) = file.line_col(span.start);
        format!("{}:{}:{}", file.path.display(), line, col)
    }
}
