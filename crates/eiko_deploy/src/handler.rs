//! Handler traits and the per-task context.
//!
//! Handlers are the host-side counterpart of a resource definition,
//! registered by definition name ahead of the deploy (the same two-phase
//! name linkage the plugin bridge uses at compile time). Two shapes exist:
//!
//! - [`Handler`] — one `execute` step; success is signalled by setting
//!   [`HandlerCtx::deployed`] and not [`HandlerCtx::failed`];
//! - [`CrudHandler`] — `create`/`read`/`update`/`delete`, with optional
//!   `pre`/`post` hooks around the CRUD step and a `cleanup` that runs once
//!   after the whole deploy settles.
//!
//! All methods are async and may hold non-`Send` state: the deployer runs
//! them on a single-threaded cooperative scheduler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use async_trait::async_trait;
use eiko_compile::{is_subtype, ResourceInstance, Value};

use crate::promise::{PromiseStore, SealReason};

/// A single-step handler.
#[async_trait(?Send)]
pub trait Handler {
    async fn execute(&self, ctx: &mut HandlerCtx);
}

/// A full CRUD handler.
#[async_trait(?Send)]
pub trait CrudHandler {
    /// Observe the real world: set [`HandlerCtx::deployed`] if the backing
    /// object exists, and record differences in [`HandlerCtx::changes`].
    async fn read(&self, ctx: &mut HandlerCtx);

    async fn create(&self, ctx: &mut HandlerCtx);

    /// Apply [`HandlerCtx::changes`]; only called when `read` found some.
    async fn update(&self, ctx: &mut HandlerCtx);

    async fn delete(&self, _ctx: &mut HandlerCtx) {}

    /// Runs before the CRUD step.
    async fn pre(&self, _ctx: &mut HandlerCtx) {}

    /// Runs after the CRUD step.
    async fn post(&self, _ctx: &mut HandlerCtx) {}

    /// Runs exactly once after every task reached a terminal state.
    /// Failures here are logged, never propagated.
    async fn cleanup(&self, _ctx: &mut HandlerCtx) {}
}

/// A registered handler of either shape.
#[derive(Clone)]
pub enum RegisteredHandler {
    Exec(Rc<dyn Handler>),
    Crud(Rc<dyn CrudHandler>),
}

/// Deploy-side registry: resource definition name → handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, RegisteredHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource_name: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers
            .insert(resource_name.into(), RegisteredHandler::Exec(Rc::new(handler)));
    }

    pub fn register_crud(
        &mut self,
        resource_name: impl Into<String>,
        handler: impl CrudHandler + 'static,
    ) {
        self.handlers
            .insert(resource_name.into(), RegisteredHandler::Crud(Rc::new(handler)));
    }

    /// Looks up the handler for a resource, walking up the inheritance
    /// chain so a derived definition reuses its parent's handler unless it
    /// registered its own.
    pub fn lookup(&self, resource: &ResourceInstance) -> Option<RegisteredHandler> {
        let mut def = Some(resource.def.clone());
        while let Some(current) = def {
            if let Some(handler) = self.handlers.get(&current.name) {
                return Some(handler.clone());
            }
            def = current.parent.clone();
        }
        None
    }

    /// The definition names with a registered handler; used to pre-fill the
    /// compile-side registry so linkage flags agree.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// Everything a handler may touch while its task runs.
pub struct HandlerCtx {
    pub resource: Rc<ResourceInstance>,
    pub task_id: String,
    /// Set by `read` when the backing object exists.
    pub deployed: bool,
    /// Set by any step to mark the task failed.
    pub failed: bool,
    /// Differences found by `read`, consumed by `update`. In a dry run
    /// these are reported instead of applied.
    pub changes: HashMap<String, Value>,
    logs: Vec<String>,
    workspace: PathBuf,
    scratch: Option<PathBuf>,
    promises: Rc<PromiseStore>,
}

impl HandlerCtx {
    pub(crate) fn new(
        resource: Rc<ResourceInstance>,
        workspace: PathBuf,
        promises: Rc<PromiseStore>,
    ) -> Self {
        let task_id = resource.index.clone();
        Self {
            resource,
            task_id,
            deployed: false,
            failed: false,
            changes: HashMap::new(),
            logs: Vec::new(),
            workspace,
            scratch: None,
            promises,
        }
    }

    /// Marks the task failed with a message.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(task = %self.task_id, "{message}");
        self.logs.push(format!("error: {message}"));
        self.failed = true;
    }

    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(task = %self.task_id, "{message}");
        self.logs.push(message);
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// The per-task scratch directory, created on first use. Unique per
    /// resource index, stable across runs.
    pub fn scratch_dir(&mut self) -> std::io::Result<&Path> {
        if self.scratch.is_none() {
            let safe: String = self
                .task_id
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
                .collect();
            let dir = self.workspace.join(safe);
            std::fs::create_dir_all(&dir)?;
            self.scratch = Some(dir);
        }
        Ok(self.scratch.as_deref().expect("just created"))
    }

    /// Reads a property of the bound resource, suspending on promises
    /// until the owning task resolves them.
    pub async fn property(&self, name: &str) -> Result<Value, PropertyError> {
        let value = self
            .resource
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| PropertyError::NoSuchProperty(name.to_string()))?;
        match value {
            Value::Promise(promise) => {
                let owner = promise
                    .owner
                    .borrow()
                    .clone()
                    .ok_or_else(|| PropertyError::Unresolved {
                        resource: self.task_id.clone(),
                        property: promise.property.clone(),
                    })?;
                let slot = self.promises.slot(&owner.index, &promise.property);
                slot.wait().await.map_err(|reason| match reason {
                    SealReason::Cancelled => PropertyError::Cancelled,
                    SealReason::Unresolved => PropertyError::Unresolved {
                        resource: owner.index.clone(),
                        property: promise.property.clone(),
                    },
                })
            }
            other => Ok(other),
        }
    }

    /// Resolves one of this resource's own promise properties. Exactly one
    /// resolution per slot; the declared type is enforced.
    pub fn resolve_promise(&mut self, property: &str, value: Value) -> Result<(), String> {
        let schema = self
            .resource
            .def
            .properties
            .get(property)
            .ok_or_else(|| format!("no property `{property}`"))?;
        if !schema.promise {
            return Err(format!("property `{property}` is not a promise"));
        }
        // Typedefs cannot be re-refined here (the refinement is a compile
        // construct); the structural base is what a handler can satisfy.
        if !is_subtype(&value.type_of(), schema.ty.base()) {
            return Err(format!(
                "promise `{property}` expects `{}`, got `{}`",
                schema.ty,
                value.type_of()
            ));
        }
        self.promises
            .slot(&self.task_id, property)
            .resolve(value)
            .map_err(|_| format!("promise `{property}` was already resolved"))
    }
}

/// Errors surfaced by [`HandlerCtx::property`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    NoSuchProperty(String),
    Unresolved { resource: String, property: String },
    Cancelled,
}

impl std::fmt::Display for PropertyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyError::NoSuchProperty(name) => write!(f, "no property `{name}`"),
            PropertyError::Unresolved { resource, property } => {
                write!(f, "promise `{resource}.{property}` was never resolved")
            }
            PropertyError::Cancelled => write!(f, "deploy was cancelled"),
        }
    }
}
