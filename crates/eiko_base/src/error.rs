//! The compiler's error taxonomy.
//!
//! Every failure anywhere in the pipeline is an [`EikoError`]: an
//! [`ErrorKind`] plus the [`Span`] of the source that caused it and, once
//! known, the [`FileId`] it lives in. The first frame always points at the
//! user's source; host-side plugin traces are attached separately and only
//! rendered on request.
//!
//! Errors render in two shapes: `Display` gives the one-line form, and
//! [`EikoError::render`] adds the gutter/caret context block when a source
//! registry is at hand:
//!
//! ```text
//! error: value has already been assigned: `a`
//!   --> main.eiko:2:1
//!    2 | a = 2
//!      | ^
//! ```

use std::fmt;

use crate::source::{FileId, SourceMap};
use crate::span::Span;

/// Import failures (§ module resolver).
#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    /// No file or package matched the import path.
    NotFound { module: String },
    /// The module is currently being loaded further up the stack.
    Cyclic { module: String },
    /// `eiko.toml` requires a newer engine than this binary.
    VersionMismatch { required: String, actual: String },
}

/// Static type failures.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    Mismatch { expected: String, found: String },
    NotCoercible { from: String, to: String },
    /// Overload dispatch kept more than one candidate (or none of the
    /// surviving constraints settled it).
    Ambiguous { callee: String, detail: String },
}

/// Resource index failures.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexError {
    Duplicate { def: String, index: String },
    /// No `@index` decorator and the first property is not an indexable type.
    Unindexable { def: String },
}

/// Plugin bridge failures.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginError {
    /// Raised deliberately by the plugin; the message is user-facing.
    User { message: String },
    /// The plugin itself misbehaved. The host trace is shown only when
    /// stack traces are enabled on the CLI.
    Internal { message: String, trace: Option<String> },
}

/// Deploy-time failures.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployError {
    HandlerFailed { task: String, detail: String },
    /// The owning task reached a terminal state without writing the slot.
    PromiseUnresolved { resource: String, property: String },
    Timeout { task: String },
    Cancelled,
}

/// Every way a compilation or deployment can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    Lex(String),
    Syntax(String),
    Import(ImportError),
    Name(String),
    /// Runtime failure during eager evaluation: arithmetic, container
    /// access, frozen-container writes.
    Eval(String),
    Type(TypeError),
    /// Second write to an already-assigned binding.
    Reassign { name: String },
    Constructor(String),
    Index(IndexError),
    /// A typedef refinement rejected the value.
    Refinement { typedef: String, value: String },
    Plugin(PluginError),
    /// The exporter found a cycle among resources.
    ExportCycle { path: String },
    Deploy(DeployError),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lex(msg) => write!(f, "{msg}"),
            ErrorKind::Syntax(msg) => write!(f, "{msg}"),
            ErrorKind::Import(ImportError::NotFound { module }) => {
                write!(f, "module not found: `{module}`")
            }
            ErrorKind::Import(ImportError::Cyclic { module }) => {
                write!(f, "cyclic import of `{module}`")
            }
            ErrorKind::Import(ImportError::VersionMismatch { required, actual }) => {
                write!(f, "project requires eikobot {required}, this is {actual}")
            }
            ErrorKind::Name(name) => write!(f, "name `{name}` is not defined"),
            ErrorKind::Eval(msg) => write!(f, "{msg}"),
            ErrorKind::Type(TypeError::Mismatch { expected, found }) => {
                write!(f, "expected `{expected}`, found `{found}`")
            }
            ErrorKind::Type(TypeError::NotCoercible { from, to }) => {
                write!(f, "`{from}` cannot be coerced to `{to}`")
            }
            ErrorKind::Type(TypeError::Ambiguous { callee, detail }) => {
                write!(f, "ambiguous call to `{callee}`: {detail}")
            }
            ErrorKind::Reassign { name } => {
                write!(f, "value has already been assigned: `{name}`")
            }
            ErrorKind::Constructor(msg) => write!(f, "{msg}"),
            ErrorKind::Index(IndexError::Duplicate { def, index }) => {
                write!(f, "duplicate resource `{def}` with index \"{index}\"")
            }
            ErrorKind::Index(IndexError::Unindexable { def }) => {
                write!(
                    f,
                    "resource `{def}` has no usable index: add @index or make the first property a str, int, Path or enum"
                )
            }
            ErrorKind::Refinement { typedef, value } => {
                write!(f, "value {value} does not satisfy typedef `{typedef}`")
            }
            ErrorKind::Plugin(PluginError::User { message }) => write!(f, "{message}"),
            ErrorKind::Plugin(PluginError::Internal { message, .. }) => {
                write!(f, "plugin raised an internal error: {message}")
            }
            ErrorKind::ExportCycle { path } => {
                write!(f, "dependency cycle between resources: {path}")
            }
            ErrorKind::Deploy(DeployError::HandlerFailed { task, detail }) => {
                write!(f, "handler for `{task}` failed: {detail}")
            }
            ErrorKind::Deploy(DeployError::PromiseUnresolved { resource, property }) => {
                write!(f, "promise `{resource}.{property}` was never resolved")
            }
            ErrorKind::Deploy(DeployError::Timeout { task }) => {
                write!(f, "handler for `{task}` timed out")
            }
            ErrorKind::Deploy(DeployError::Cancelled) => write!(f, "deploy was cancelled"),
        }
    }
}

/// An error annotated with where in the user's source it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct EikoError {
    pub kind: ErrorKind,
    pub span: Span,
    pub file: Option<FileId>,
}

impl EikoError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        Self { kind, span, file: None }
    }

    pub fn in_file(mut self, file: FileId) -> Self {
        self.file = Some(file);
        self
    }

    /// Fills in the file id if the error does not have one yet. Errors keep
    /// the file of the frame closest to the user's source.
    pub fn or_file(mut self, file: FileId) -> Self {
        if self.file.is_none() {
            self.file = Some(file);
        }
        self
    }

    /// Full diagnostic block with the offending line and a caret underline.
    pub fn render(&self, sources: &SourceMap) -> String {
        let mut out = format!("error: {}", self.kind);
        let Some(file_id) = self.file else {
            return out;
        };
        let file = sources.get(file_id);
        let (line, col) = file.line_col(self.span.start.min(file.text.len()));
        let line_text = file.line_text(line);
        let width = self.span.len().max(1).min(line_text.len().saturating_sub(col - 1).max(1));
        out.push_str(&format!(
            "\n  --> {}:{}:{}\n{:4} | {}\n     | {}{}",
            file.path.display(),
            line,
            col,
            line,
            line_text,
            " ".repeat(col - 1),
            "^".repeat(width),
        ));
        if let ErrorKind::Plugin(PluginError::Internal { trace: Some(trace), .. }) = &self.kind {
            out.push_str("\n     = host trace:\n");
            for tl in trace.lines() {
                out.push_str(&format!("       {tl}\n"));
            }
        }
        out
    }
}

impl fmt::Display for EikoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.kind, self.span.start, self.span.end)
    }
}

impl std::error::Error for EikoError {}

/// Alias used across the compiler crates.
pub type Result<T> = std::result::Result<T, EikoError>;
