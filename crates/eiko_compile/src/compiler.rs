//! The compilation pipeline.
//!
//! ```text
//! .eiko source
//!       │
//!       ▼
//! ┌───────────────────┐
//! │  Lexer / Parser   │  eiko-language
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │  Import resolver  │  canonical-path cache, packages
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │  Evaluator        │  eager, single pass → resource table
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │  Exporter         │  task DAG
//! └───────────────────┘
//! ```
//!
//! [`Compiler`] owns everything that outlives one module: the source
//! registry, the interner, the module cache, the resource table, and the
//! host's plugin registry. Compilation is synchronous and deterministic;
//! the first evaluation error aborts (parse errors are collected per
//! statement first).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use eiko_base::{EikoError, ErrorKind, FileId, Interner, SourceMap, Span};

use crate::export::{export_graph, TaskGraph};
use crate::module::{ModuleEnv, ModuleState};
use crate::plugins::PluginRegistry;
use crate::resource::ResourceTable;

/// Knobs the CLI wires through.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Show host stack traces for internal plugin errors.
    pub plugin_stacktrace: bool,
    /// Package roots installed by the package manager, searched after the
    /// entry file's directory.
    pub package_roots: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct Compiler {
    pub sources: SourceMap,
    pub interner: Interner,
    pub plugins: PluginRegistry,
    pub options: CompileOptions,
    pub resources: ResourceTable,
    /// Accumulated diagnostics (parse errors from all modules).
    pub(crate) errors: Vec<EikoError>,
    pub(crate) modules: HashMap<PathBuf, ModuleState>,
    pub(crate) search_paths: Vec<PathBuf>,
    pub(crate) current_file: FileId,
    pub(crate) current_module: String,
    pub(crate) current_dir: PathBuf,
}

/// Result of a successful compilation: the entry module's environment plus
/// the lowered task graph.
#[derive(Debug)]
pub struct CompileOutput {
    pub entry: Rc<ModuleEnv>,
    pub graph: TaskGraph,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        let mut sources = SourceMap::new();
        // Reserve file id 0 for spans with no real file.
        let current_file = sources.add(PathBuf::from("<builtin>"), String::new());
        Self {
            sources,
            interner: Interner::new(),
            plugins: PluginRegistry::new(),
            options,
            resources: ResourceTable::new(),
            errors: Vec::new(),
            modules: HashMap::new(),
            search_paths: Vec::new(),
            current_file,
            current_module: String::new(),
            current_dir: PathBuf::from("."),
        }
    }

    /// Moves a pre-filled plugin registry in (host extensions register
    /// before compilation starts).
    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    /// Compiles the entry file and everything it imports, then lowers the
    /// resource table into the task graph. All collected diagnostics are
    /// returned on failure.
    pub fn compile_file(&mut self, entry: &Path) -> std::result::Result<CompileOutput, Vec<EikoError>> {
        let entry_dir = entry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.search_paths = std::iter::once(entry_dir)
            .chain(self.options.package_roots.iter().cloned())
            .collect();

        let result = self.load_module_file(entry, "__main__", Span::default());
        match result {
            Ok(env) => {
                if !self.errors.is_empty() {
                    return Err(std::mem::take(&mut self.errors));
                }
                tracing::info!(resources = self.resources.len(), "compilation finished");
                match export_graph(&self.resources) {
                    Ok(graph) => Ok(CompileOutput { entry: env, graph }),
                    Err(err) => Err(vec![err]),
                }
            }
            Err(err) => {
                let mut errors = std::mem::take(&mut self.errors);
                if !errors.iter().any(|e| *e == err) {
                    errors.push(err);
                }
                Err(errors)
            }
        }
    }

    pub(crate) fn error_at(&self, kind: ErrorKind, span: Span) -> EikoError {
        EikoError::new(kind, span).in_file(self.current_file)
    }

    /// Renders one diagnostic, honouring the plugin-stacktrace switch.
    pub fn render_error(&self, err: &EikoError) -> String {
        use eiko_base::PluginError;
        let mut err = err.clone();
        if !self.options.plugin_stacktrace {
            if let ErrorKind::Plugin(PluginError::Internal { trace, .. }) = &mut err.kind {
                *trace = None;
            }
        }
        err.render(&self.sources)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

/// One-call convenience used by tests and simple embedders.
pub fn compile_file(path: &Path) -> std::result::Result<(Compiler, CompileOutput), Vec<EikoError>> {
    let mut compiler = Compiler::new(CompileOptions::default());
    let output = compiler.compile_file(path)?;
    Ok((compiler, output))
}

/// Compiles source text as if it were the entry file, without touching the
/// filesystem. Imports resolve against `dir`.
pub fn compile_source(
    source: &str,
    dir: &Path,
) -> std::result::Result<(Compiler, CompileOutput), Vec<EikoError>> {
    compile_source_with(source, dir, PluginRegistry::new())
}

/// [`compile_source`] with a host plugin registry.
pub fn compile_source_with(
    source: &str,
    dir: &Path,
    plugins: PluginRegistry,
) -> std::result::Result<(Compiler, CompileOutput), Vec<EikoError>> {
    use crate::scope::ScopeStack;
    use eiko_language::parse_source;

    let mut compiler = Compiler::new(CompileOptions::default()).with_plugins(plugins);
    compiler.search_paths = vec![dir.to_path_buf()];
    compiler.current_dir = dir.to_path_buf();

    let file = compiler
        .sources
        .add(dir.join("__main__.eiko"), source.to_string());
    compiler.current_file = file;
    compiler.current_module = "__main__".to_string();

    let (module, mut parse_errors) = parse_source(source, file, &mut compiler.interner);
    if !parse_errors.is_empty() {
        compiler.errors.append(&mut parse_errors);
        return Err(std::mem::take(&mut compiler.errors));
    }

    let mut scope = ScopeStack::new();
    compiler.inject_plugins("__main__", &mut scope);
    if let Err(err) = compiler.eval_module(&module, &mut scope) {
        let mut errors = std::mem::take(&mut compiler.errors);
        errors.push(err.or_file(file));
        return Err(errors);
    }

    let env = Rc::new(crate::module::env_from_scope("__main__", file, dir, scope));
    match export_graph(&compiler.resources) {
        Ok(graph) => Ok((compiler, CompileOutput { entry: env, graph })),
        Err(err) => Err(vec![err]),
    }
}
