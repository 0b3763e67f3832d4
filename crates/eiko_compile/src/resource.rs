//! Resource definitions, instances, and the global resource table.
//!
//! A [`ResourceDef`] is the schema side: property types and defaults,
//! constructor overloads, the inheritance parent, and the `@index` key list.
//! A [`ResourceInstance`] is one immutable record built from it, identified
//! for the rest of its life by its index string.
//!
//! Construction itself (overload dispatch, body execution, coercion) is
//! driven by the evaluator; this module owns the data model, the builder
//! that accumulates property writes, index computation, and registration.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use eiko_base::{FileId, Span};
use eiko_language::ast::{Expr, Stmt};
use indexmap::IndexMap;

use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct PropertySchema {
    pub ty: Type,
    pub default: Option<Expr>,
    pub promise: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CtorParam {
    pub name: String,
    pub ty: Option<Type>,
    pub default: Option<Expr>,
    pub span: Span,
}

/// One constructor overload. The body is shared because dispatch may probe
/// several overloads per call site.
#[derive(Debug, Clone)]
pub struct Constructor {
    pub name: String,
    pub params: Vec<CtorParam>,
    pub body: Rc<Vec<Stmt>>,
    pub constraint: Option<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ResourceDef {
    pub name: String,
    pub module: String,
    pub file: FileId,
    pub span: Span,
    /// Full schema, parent properties first (copied at declaration).
    pub properties: IndexMap<String, PropertySchema>,
    /// Overloads declared on this definition; never inherited.
    pub constructors: Vec<Constructor>,
    pub parent: Option<Rc<ResourceDef>>,
    /// `@index` paths, inherited from the parent unless overridden.
    pub index_keys: Option<Vec<String>>,
    /// Set when a handler registered under this definition's name is linked.
    pub has_handler: Cell<bool>,
}

/// An immutable, registered resource.
pub struct ResourceInstance {
    pub def: Rc<ResourceDef>,
    pub properties: IndexMap<String, Value>,
    pub index: String,
    /// Cache for the host-side linked model; written once by the plugin
    /// bridge and reused so repeated conversions preserve identity.
    pub linked: RefCell<Option<Rc<dyn Any>>>,
}

impl fmt::Debug for ResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceInstance")
            .field("index", &self.index)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Why a property write into a builder was refused.
pub enum BuilderWriteError {
    NoSuchProperty,
    PromiseProperty,
    AlreadyAssigned(Span),
}

/// Accumulates property writes while a constructor body runs.
#[derive(Debug)]
pub struct ResourceBuilder {
    pub def: Rc<ResourceDef>,
    pub values: IndexMap<String, Value>,
    assigned: IndexMap<String, Span>,
}

impl ResourceBuilder {
    /// Starts a build with every promise property pre-seeded with its
    /// unresolved [`crate::value::PromiseRef`].
    pub fn new(def: Rc<ResourceDef>) -> Self {
        let mut values = IndexMap::new();
        for (name, schema) in &def.properties {
            if schema.promise {
                values.insert(
                    name.clone(),
                    Value::Promise(Rc::new(crate::value::PromiseRef {
                        property: name.clone(),
                        ty: schema.ty.clone(),
                        owner: RefCell::new(None),
                    })),
                );
            }
        }
        Self { def, values, assigned: IndexMap::new() }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Records `self.<name> = value`. The value is stored as-is; coercion to
    /// the declared type happens once when construction closes.
    pub fn assign(
        &mut self,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), BuilderWriteError> {
        let Some(schema) = self.def.properties.get(name) else {
            return Err(BuilderWriteError::NoSuchProperty);
        };
        if schema.promise {
            return Err(BuilderWriteError::PromiseProperty);
        }
        if let Some(prev) = self.assigned.get(name) {
            return Err(BuilderWriteError::AlreadyAssigned(*prev));
        }
        self.assigned.insert(name.to_string(), span);
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Properties the constructor body never assigned and that have no
    /// default to fall back on (promises excluded).
    pub fn missing_properties(&self) -> Vec<String> {
        self.def
            .properties
            .iter()
            .filter(|(name, schema)| {
                !schema.promise
                    && schema.default.is_none()
                    && !self.assigned.contains_key(*name)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_assigned(&self, name: &str) -> bool {
        self.assigned.contains_key(name)
    }
}

/// What went wrong while computing an index.
pub enum IndexComputeError {
    Unindexable,
    BadPath { path: String, reason: String },
}

/// Computes the index string for a resource: the definition name, then the
/// string form of each key property, joined with `-`.
///
/// Without an `@index` decorator the first declared property is the key,
/// provided its type is indexable (`str`, `int`, `Path`, an enum, or a
/// typedef of one of those).
pub fn compute_index(
    def: &ResourceDef,
    properties: &IndexMap<String, Value>,
) -> Result<String, IndexComputeError> {
    let keys: Vec<String> = match &def.index_keys {
        Some(keys) => keys.clone(),
        None => {
            let (first_name, first_schema) = def
                .properties
                .iter()
                .next()
                .ok_or(IndexComputeError::Unindexable)?;
            if !first_schema.ty.is_indexable() {
                return Err(IndexComputeError::Unindexable);
            }
            vec![first_name.clone()]
        }
    };

    let mut parts = vec![def.name.clone()];
    for path in &keys {
        let mut segments = path.split('.');
        let first = segments.next().expect("split yields at least one segment");
        let mut value = properties
            .get(first)
            .cloned()
            .ok_or_else(|| IndexComputeError::BadPath {
                path: path.clone(),
                reason: format!("no property `{first}`"),
            })?;
        for segment in segments {
            let Value::Resource(instance) = &value else {
                return Err(IndexComputeError::BadPath {
                    path: path.clone(),
                    reason: format!("`{segment}` is reached through a non-resource value"),
                });
            };
            value = instance.properties.get(segment).cloned().ok_or_else(|| {
                IndexComputeError::BadPath {
                    path: path.clone(),
                    reason: format!("no property `{segment}`"),
                }
            })?;
        }
        let fragment = index_fragment(&value).ok_or_else(|| IndexComputeError::BadPath {
            path: path.clone(),
            reason: "key property is not an indexable value".to_string(),
        })?;
        parts.push(fragment);
    }
    Ok(parts.join("-"))
}

fn index_fragment(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Path(p) => Some(p.display().to_string()),
        Value::EnumMember(info, idx) => Some(info.members[*idx as usize].clone()),
        _ => None,
    }
}

/// Global registry of constructed resources, keyed by index (the index
/// already embeds the definition name, making the pair unique).
#[derive(Debug, Default)]
pub struct ResourceTable {
    entries: IndexMap<String, Rc<ResourceInstance>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance; returns `false` if the index is taken.
    pub fn register(&mut self, instance: Rc<ResourceInstance>) -> bool {
        if self.entries.contains_key(&instance.index) {
            return false;
        }
        self.entries.insert(instance.index.clone(), instance);
        true
    }

    pub fn get(&self, index: &str) -> Option<&Rc<ResourceInstance>> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registration-ordered iteration; the exporter relies on this order
    /// being deterministic.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<ResourceInstance>> {
        self.entries.values()
    }
}
