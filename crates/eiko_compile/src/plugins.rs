//! The plugin bridge: host functions callable from Eiko source.
//!
//! The embedding host registers three kinds of extension, all keyed by
//! plain name strings (a two-phase registry — nothing in the evaluator ever
//! holds a host object directly until link time):
//!
//! - **plugins** — typed functions attached to a module path. When the
//!   resolver loads that module, its plugins are injected into the module
//!   environment as callable values. Arguments are marshalled with the
//!   normal coercion rules before the host function runs.
//! - **handlers** — deploy-time CRUD objects living in `eiko-deploy`. The
//!   compile side only records *which resource definition names* have a
//!   handler, and links that flag onto the definitions when a module
//!   closes.
//! - **models** — host types that convert from a resource instance. The
//!   conversion result is cached on the instance, so passing the same
//!   resource twice yields the same host object.
//!
//! A plugin that fails deliberately raises [`PluginFailure::User`], which
//! renders like any other compile diagnostic. Anything else is
//! [`PluginFailure::Internal`]; its host trace is kept aside and only shown
//! when the CLI asks for plugin stack traces.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::resource::ResourceInstance;
use crate::types::Type;
use crate::value::Value;

/// Error raised inside a plugin body.
#[derive(Debug, Clone)]
pub enum PluginFailure {
    /// Deliberate, user-facing failure (the host's `PluginException`).
    User(String),
    /// The plugin itself broke; `trace` carries the host-side backtrace.
    Internal { message: String, trace: Option<String> },
}

impl PluginFailure {
    /// Convenience for deliberate failures.
    pub fn user(message: impl Into<String>) -> Self {
        PluginFailure::User(message.into())
    }
}

pub type PluginResult = Result<Value, PluginFailure>;

/// A host function callable from Eiko source.
pub struct PluginFunction {
    pub name: String,
    /// Module path the function is registered under (empty for the entry
    /// module / builtins).
    pub module: String,
    /// Declared parameter types; call arguments are coerced to these.
    pub params: Vec<Type>,
    /// Declared return type; the bridge checks the host kept its word.
    pub returns: Type,
    pub func: Box<dyn Fn(&[Value]) -> PluginResult>,
}

impl fmt::Debug for PluginFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFunction")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

/// Registry the host fills before compilation starts.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    functions: HashMap<String, Vec<Rc<PluginFunction>>>,
    handler_names: HashSet<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin under a module path (`""` for the entry module).
    pub fn register_function(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        params: Vec<Type>,
        returns: Type,
        func: impl Fn(&[Value]) -> PluginResult + 'static,
    ) {
        let module = module.into();
        let function = Rc::new(PluginFunction {
            name: name.into(),
            module: module.clone(),
            params,
            returns,
            func: Box::new(func),
        });
        self.functions.entry(module).or_default().push(function);
    }

    /// Declares that a deploy handler exists for the named resource
    /// definition. The evaluator links the flag when the definition closes.
    pub fn register_handler_name(&mut self, resource_name: impl Into<String>) {
        self.handler_names.insert(resource_name.into());
    }

    pub fn has_handler(&self, resource_name: &str) -> bool {
        self.handler_names.contains(resource_name)
    }

    /// Plugins registered for a module path, in registration order.
    pub fn functions_for(&self, module: &str) -> &[Rc<PluginFunction>] {
        self.functions.get(module).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Host types that mirror a resource definition ("linked models").
///
/// `RESOURCE` names the definition the model binds to; the conversion gets
/// the fully built instance and pulls whatever properties it needs.
pub trait EikoModel: Sized + 'static {
    const RESOURCE: &'static str;

    fn from_resource(resource: &ResourceInstance) -> Result<Self, String>;
}

/// Converts a resource into its linked model, caching the result on the
/// instance. Repeated calls return the same `Rc`, preserving identity
/// across plugin invocations.
pub fn linked_model<T: EikoModel>(resource: &Rc<ResourceInstance>) -> Result<Rc<T>, String> {
    if let Some(existing) = resource.linked.borrow().as_ref() {
        if let Ok(typed) = existing.clone().downcast::<T>() {
            return Ok(typed);
        }
    }
    if resource.def.name != T::RESOURCE {
        return Err(format!(
            "model expects resource `{}`, got `{}`",
            T::RESOURCE,
            resource.def.name
        ));
    }
    let model = Rc::new(T::from_resource(resource)?);
    *resource.linked.borrow_mut() = Some(model.clone());
    Ok(model)
}
