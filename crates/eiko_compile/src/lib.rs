//! # eiko-compile
//!
//! The semantic half of the Eikobot compiler: types, values, the module
//! resolver, the eager evaluator, the resource model, the plugin bridge,
//! and the exporter that lowers the evaluated object graph into a task DAG.
//!
//! ## Modules
//!
//! - [`compiler`]: pipeline entry points and shared state ([`Compiler`])
//! - [`types`]: the type lattice, subtyping, unification
//! - [`value`]: runtime values, structural equality, freezing
//! - [`scope`]: lexical frames and the single-assignment rule
//! - [`module`]: import resolution and the module cache
//! - [`eval`]: statement/expression interpretation, coercion, construction
//! - [`resource`]: resource schemas, builders, index computation, the table
//! - [`plugins`]: host function registry and linked models
//! - [`export`]: resource graph → task DAG
//!
//! ## Quick start
//!
//! ```
//! use eiko_compile::compile_source;
//! use std::path::Path;
//!
//! let source = "\
//! resource Host:
//!     name: str
//!
//! h = Host(\"web-1\")
//! ";
//! let (compiler, output) = compile_source(source, Path::new(".")).unwrap();
//! assert_eq!(output.graph.task_count(), 1);
//! assert!(compiler.resources.get("Host-web-1").is_some());
//! ```

pub mod compiler;
pub mod eval;
pub mod export;
pub mod module;
pub mod plugins;
pub mod resource;
pub mod scope;
pub mod types;
pub mod value;

pub use compiler::{compile_file, compile_source, compile_source_with, CompileOptions, CompileOutput, Compiler};
pub use export::{export_graph, TaskGraph, TaskNode};
pub use module::ModuleEnv;
pub use plugins::{linked_model, EikoModel, PluginFailure, PluginFunction, PluginRegistry};
pub use resource::{ResourceDef, ResourceInstance, ResourceTable};
pub use types::{is_subtype, unify, EnumInfo, Type, TypedefInfo};
pub use value::{DictKey, PromiseOwner, PromiseRef, Value};
