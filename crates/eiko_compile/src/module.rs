//! Module environments and the import resolver.
//!
//! Every file takes part in a compilation at most once. The resolver keeps a
//! map from canonical path to module state — `Loading` while the module's
//! statements are being evaluated, `Loaded` afterwards — so a re-import
//! reuses the environment and an import that finds `Loading` is, by
//! construction, a cycle.
//!
//! Lookup order for an absolute import `a.b`: the entry file's directory
//! first, then every installed package root handed to the compiler. A
//! directory is a package iff it contains `__init__.eiko`; walking into a
//! package evaluates its `__init__.eiko` and binds each child module into
//! the package's environment, so `import a.b` makes both `a` and `a.b`
//! addressable. Relative imports (`from .sub import x`) climb one directory
//! per leading dot from the importing module's own directory and never
//! consult the search path.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use eiko_base::{ErrorKind, FileId, ImportError, Result, Span};
use eiko_language::parse_source;
use indexmap::IndexMap;

use crate::compiler::Compiler;
use crate::scope::ScopeStack;
use crate::value::Value;

/// The environment a loaded module exports: its top-level assigned
/// bindings, plus submodules bound in by the resolver.
#[derive(Debug)]
pub struct ModuleEnv {
    /// Dotted module path (`"__main__"` for the entry file).
    pub name: String,
    pub file: FileId,
    /// Directory the module lives in; base for its relative imports.
    pub dir: PathBuf,
    bindings: RefCell<IndexMap<String, Value>>,
}

impl ModuleEnv {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Binds a submodule (or late value) into the environment; keeps an
    /// existing binding of the same name.
    pub fn insert_if_absent(&self, name: &str, value: Value) {
        let mut bindings = self.bindings.borrow_mut();
        if !bindings.contains_key(name) {
            bindings.insert(name.to_string(), value);
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }
}

#[derive(Debug)]
pub enum ModuleState {
    Loading,
    Loaded(Rc<ModuleEnv>),
}

/// Builds an environment from a finished module scope. Used by the
/// in-memory compile entry; file-backed loads go through
/// [`Compiler::load_module_file`].
pub(crate) fn env_from_scope(
    name: &str,
    file: FileId,
    dir: &Path,
    scope: ScopeStack,
) -> ModuleEnv {
    ModuleEnv {
        name: name.to_string(),
        file,
        dir: dir.to_path_buf(),
        bindings: RefCell::new(scope.into_module_bindings()),
    }
}

impl Compiler {
    /// Loads and evaluates the module at `path` (or returns the cached
    /// environment). `dotted` is the module's import name for diagnostics
    /// and plugin lookup.
    pub(crate) fn load_module_file(
        &mut self,
        path: &Path,
        dotted: &str,
        span: Span,
    ) -> Result<Rc<ModuleEnv>> {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        match self.modules.get(&canonical) {
            Some(ModuleState::Loaded(env)) => return Ok(env.clone()),
            Some(ModuleState::Loading) => {
                return Err(self.error_at(
                    ErrorKind::Import(ImportError::Cyclic { module: dotted.to_string() }),
                    span,
                ));
            }
            None => {}
        }

        let text = std::fs::read_to_string(&canonical).map_err(|_| {
            self.error_at(
                ErrorKind::Import(ImportError::NotFound { module: dotted.to_string() }),
                span,
            )
        })?;
        tracing::debug!(module = dotted, path = %canonical.display(), "loading module");

        self.modules.insert(canonical.clone(), ModuleState::Loading);
        let file = self.sources.add(canonical.clone(), text.clone());
        let (module, mut parse_errors) = parse_source(&text, file, &mut self.interner);
        if !parse_errors.is_empty() {
            let first = parse_errors[0].clone();
            self.errors.append(&mut parse_errors);
            self.modules.remove(&canonical);
            return Err(first);
        }

        let dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let saved_file = std::mem::replace(&mut self.current_file, file);
        let saved_module = std::mem::replace(&mut self.current_module, dotted.to_string());
        let saved_dir = std::mem::replace(&mut self.current_dir, dir.clone());

        let mut scope = ScopeStack::new();
        self.inject_plugins(dotted, &mut scope);
        let outcome = self.eval_module(&module, &mut scope);

        self.current_file = saved_file;
        self.current_module = saved_module;
        self.current_dir = saved_dir;

        if let Err(err) = outcome {
            self.modules.remove(&canonical);
            return Err(err.or_file(file));
        }

        let env = Rc::new(ModuleEnv {
            name: dotted.to_string(),
            file,
            dir,
            bindings: RefCell::new(scope.into_module_bindings()),
        });
        self.modules.insert(canonical, ModuleState::Loaded(env.clone()));
        Ok(env)
    }

    /// Resolves an absolute import path against the search roots, loading
    /// every package along the way. Returns the chain of environments, one
    /// per segment.
    pub(crate) fn load_import_chain(
        &mut self,
        segments: &[String],
        span: Span,
    ) -> Result<Vec<Rc<ModuleEnv>>> {
        let roots = self.search_paths.clone();
        'roots: for root in &roots {
            let mut dir = root.clone();
            let mut envs: Vec<Rc<ModuleEnv>> = Vec::new();
            let mut dotted = String::new();
            for (i, segment) in segments.iter().enumerate() {
                if !dotted.is_empty() {
                    dotted.push('.');
                }
                dotted.push_str(segment);
                let last = i + 1 == segments.len();
                let package_init = dir.join(segment).join("__init__.eiko");
                let module_file = dir.join(format!("{segment}.eiko"));

                let env = if package_init.is_file() {
                    dir = dir.join(segment);
                    self.load_module_file(&package_init, &dotted, span)?
                } else if last && module_file.is_file() {
                    self.load_module_file(&module_file, &dotted, span)?
                } else {
                    continue 'roots;
                };

                if let Some(parent) = envs.last() {
                    parent.insert_if_absent(segment, Value::Module(env.clone()));
                }
                envs.push(env);
            }
            return Ok(envs);
        }
        Err(self.error_at(
            ErrorKind::Import(ImportError::NotFound { module: segments.join(".") }),
            span,
        ))
    }

    /// Resolves a relative import (`dots` leading dots) from the current
    /// module's directory.
    pub(crate) fn load_relative(
        &mut self,
        dots: usize,
        segments: &[String],
        span: Span,
    ) -> Result<Rc<ModuleEnv>> {
        let mut dir = self.current_dir.clone();
        for _ in 1..dots {
            dir = dir
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    self.error_at(
                        ErrorKind::Import(ImportError::NotFound {
                            module: format!("{}{}", ".".repeat(dots), segments.join(".")),
                        }),
                        span,
                    )
                })?;
        }

        if segments.is_empty() {
            // `from . import x` — the package itself.
            let init = dir.join("__init__.eiko");
            return self.load_module_file(&init, &relative_name(dots, segments), span);
        }

        let mut env = None;
        let mut dotted = String::new();
        for (i, segment) in segments.iter().enumerate() {
            if !dotted.is_empty() {
                dotted.push('.');
            }
            dotted.push_str(segment);
            let last = i + 1 == segments.len();
            let package_init = dir.join(segment).join("__init__.eiko");
            let module_file = dir.join(format!("{segment}.eiko"));
            if package_init.is_file() {
                dir = dir.join(segment);
                env = Some(self.load_module_file(&package_init, &dotted, span)?);
            } else if last && module_file.is_file() {
                env = Some(self.load_module_file(&module_file, &dotted, span)?);
            } else {
                return Err(self.error_at(
                    ErrorKind::Import(ImportError::NotFound {
                        module: relative_name(dots, segments),
                    }),
                    span,
                ));
            }
        }
        Ok(env.expect("non-empty segment list yields an environment"))
    }

    /// Seeds a fresh module scope with the plugins registered for its path.
    pub(crate) fn inject_plugins(&mut self, module: &str, scope: &mut ScopeStack) {
        let functions: Vec<_> = self.plugins.functions_for(module).to_vec();
        for function in functions {
            let name = function.name.clone();
            scope.store_local(&name, Value::Plugin(function), Span::default());
        }
    }
}

fn relative_name(dots: usize, segments: &[String]) -> String {
    format!("{}{}", ".".repeat(dots), segments.join("."))
}
