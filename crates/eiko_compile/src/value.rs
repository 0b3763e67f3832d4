//! Runtime values of the evaluator.
//!
//! Everything a piece of Eiko source can evaluate to is a [`Value`]. Values
//! are cheap to clone — compound data sits behind `Rc` — and immutable once
//! user code can observe them, with one deliberate exception: lists and
//! dicts stay appendable until the resource that owns them closes
//! construction, at which point [`Value::freeze`] walks the property graph
//! and seals every container for good.
//!
//! Equality is structural for data and identity-based for the nominal
//! values (resources compare by index, promises and plugins by pointer).
//! Display output redacts [`Value::Protected`] strings; the actual secret
//! only leaves the value through an explicit f-string interpolation.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::module::ModuleEnv;
use crate::plugins::PluginFunction;
use crate::resource::{ResourceBuilder, ResourceInstance};
use crate::types::{unify, EnumInfo, Type};

/// A list with its freeze flag. Appends are rejected once frozen.
#[derive(Debug)]
pub struct ListValue {
    pub items: Vec<Value>,
    pub frozen: bool,
}

/// A dict with insertion-ordered entries and its freeze flag.
#[derive(Debug)]
pub struct DictValue {
    pub entries: IndexMap<DictKey, Value>,
    pub frozen: bool,
}

/// Dict keys are restricted to hashable scalar kinds.
#[derive(Debug, Clone)]
pub enum DictKey {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Enum definition and member position.
    Enum(Rc<EnumInfo>, u32),
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DictKey::Bool(a), DictKey::Bool(b)) => a == b,
            (DictKey::Int(a), DictKey::Int(b)) => a == b,
            (DictKey::Str(a), DictKey::Str(b)) => a == b,
            (DictKey::Enum(a, ai), DictKey::Enum(b, bi)) => Rc::ptr_eq(a, b) && ai == bi,
            _ => false,
        }
    }
}

impl Eq for DictKey {}

impl std::hash::Hash for DictKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            DictKey::Bool(b) => (0u8, b).hash(state),
            DictKey::Int(i) => (1u8, i).hash(state),
            DictKey::Str(s) => (2u8, s).hash(state),
            DictKey::Enum(info, idx) => (3u8, &info.name, idx).hash(state),
        }
    }
}

impl DictKey {
    pub fn display(&self) -> String {
        match self {
            DictKey::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            DictKey::Int(i) => i.to_string(),
            DictKey::Str(s) => s.clone(),
            DictKey::Enum(info, idx) => {
                format!("{}.{}", info.name, info.members[*idx as usize])
            }
        }
    }

    /// The key back as a value; dict iteration hands these to loop bodies.
    pub fn to_value(&self) -> Value {
        match self {
            DictKey::Bool(b) => Value::Bool(*b),
            DictKey::Int(i) => Value::Int(*i),
            DictKey::Str(s) => Value::str(s.as_str()),
            DictKey::Enum(info, idx) => Value::EnumMember(info.clone(), *idx),
        }
    }
}

/// A read of a promise property. Carries the owning resource's identity
/// (filled in when the owner is registered) so the exporter can add the
/// dependency edge and the deployer can find the slot.
#[derive(Debug)]
pub struct PromiseRef {
    pub property: String,
    /// Declared type of the promised value.
    pub ty: Type,
    pub owner: RefCell<Option<PromiseOwner>>,
}

#[derive(Debug, Clone)]
pub struct PromiseOwner {
    pub def_name: String,
    pub index: String,
}

#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A `ProtectedStr`: compares and reads like a string, renders as `***`.
    Protected(Rc<str>),
    Path(Rc<PathBuf>),
    None,
    List(Rc<RefCell<ListValue>>),
    Dict(Rc<RefCell<DictValue>>),
    /// Member of an enum, by declaration position.
    EnumMember(Rc<EnumInfo>, u32),
    Resource(Rc<ResourceInstance>),
    Promise(Rc<PromiseRef>),
    /// A type used as a value (`int`, a typedef, a resource definition...).
    Type(Type),
    Plugin(Rc<PluginFunction>),
    Module(Rc<ModuleEnv>),
    /// `self` while a constructor body runs. Never escapes construction.
    Builder(Rc<RefCell<ResourceBuilder>>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(ListValue { items, frozen: false })))
    }

    pub fn dict(entries: IndexMap<DictKey, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(DictValue { entries, frozen: false })))
    }

    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    /// The dynamic type of this value.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Str(_) => Type::Str,
            Value::Protected(_) => Type::ProtectedStr,
            Value::Path(_) => Type::Path,
            Value::None => Type::None,
            Value::List(list) => {
                let list = list.borrow();
                let elem = list
                    .items
                    .iter()
                    .map(Value::type_of)
                    .reduce(|a, b| unify(&a, &b))
                    .unwrap_or(Type::Union(Vec::new()));
                Type::List(Box::new(elem))
            }
            Value::Dict(dict) => {
                let dict = dict.borrow();
                let key = dict
                    .entries
                    .keys()
                    .map(DictKey::type_hint)
                    .reduce(|a, b| unify(&a, &b))
                    .unwrap_or(Type::Union(Vec::new()));
                let value = dict
                    .entries
                    .values()
                    .map(Value::type_of)
                    .reduce(|a, b| unify(&a, &b))
                    .unwrap_or(Type::Union(Vec::new()));
                Type::Dict(Box::new(key), Box::new(value))
            }
            Value::EnumMember(info, _) => Type::Enum(info.clone()),
            Value::Resource(instance) => Type::Resource(instance.def.clone()),
            Value::Promise(promise) => promise.ty.clone(),
            Value::Type(_) => Type::Meta,
            Value::Plugin(_) => Type::Plugin,
            Value::Module(_) => Type::Module,
            Value::Builder(builder) => Type::Resource(builder.borrow().def.clone()),
        }
    }

    /// Structural equality; resources compare by index, `None` only equals
    /// itself, and ints compare equal to whole floats.
    pub fn eq_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a) | Value::Protected(a), Value::Str(b) | Value::Protected(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.items.len() == b.items.len()
                    && a.items.iter().zip(&b.items).all(|(x, y)| x.eq_value(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.entries.len() == b.entries.len()
                    && a.entries
                        .iter()
                        .all(|(k, v)| b.entries.get(k).is_some_and(|w| v.eq_value(w)))
            }
            (Value::EnumMember(a, ai), Value::EnumMember(b, bi)) => {
                Rc::ptr_eq(a, b) && ai == bi
            }
            (Value::Resource(a), Value::Resource(b)) => a.index == b.index,
            (Value::Promise(a), Value::Promise(b)) => Rc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Plugin(a), Value::Plugin(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Is this value truthy? Only booleans have truth in Eiko; everything
    /// else must be compared explicitly. The evaluator enforces that, so
    /// this returns `None` for non-booleans.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Human-readable rendering with protected strings redacted.
    pub fn display(&self) -> String {
        match self {
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    format!("{x:.1}")
                } else {
                    x.to_string()
                }
            }
            Value::Str(s) => s.to_string(),
            Value::Protected(_) => "***".to_string(),
            Value::Path(p) => p.display().to_string(),
            Value::None => "None".to_string(),
            Value::List(list) => {
                let list = list.borrow();
                let parts: Vec<String> = list.items.iter().map(Value::display).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(dict) => {
                let dict = dict.borrow();
                let parts: Vec<String> = dict
                    .entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.display(), v.display()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::EnumMember(info, idx) => {
                format!("{}.{}", info.name, info.members[*idx as usize])
            }
            Value::Resource(instance) => instance.index.clone(),
            Value::Promise(promise) => {
                let owner = promise.owner.borrow();
                match owner.as_ref() {
                    Some(owner) => format!("<promise {}.{}>", owner.index, promise.property),
                    None => format!("<promise .{}>", promise.property),
                }
            }
            Value::Type(ty) => ty.to_string(),
            Value::Plugin(plugin) => format!("<plugin {}>", plugin.name),
            Value::Module(env) => format!("<module {}>", env.name),
            Value::Builder(builder) => {
                format!("<{} under construction>", builder.borrow().def.name)
            }
        }
    }

    /// The raw text of a string-like value. Used by f-strings, where an
    /// explicit interpolation is allowed to spell out a protected value.
    pub fn interpolate(&self) -> String {
        match self {
            Value::Str(s) | Value::Protected(s) => s.to_string(),
            other => other.display(),
        }
    }

    /// Recursively seals every container reachable from this value. Called
    /// when the resource holding them closes construction.
    pub fn freeze(&self) {
        match self {
            Value::List(list) => {
                let mut list = list.borrow_mut();
                if list.frozen {
                    return;
                }
                list.frozen = true;
                for item in &list.items {
                    item.freeze();
                }
            }
            Value::Dict(dict) => {
                let mut dict = dict.borrow_mut();
                if dict.frozen {
                    return;
                }
                dict.frozen = true;
                for value in dict.entries.values() {
                    value.freeze();
                }
            }
            // Resources reachable here closed their own construction
            // already; scalars have nothing to seal.
            _ => {}
        }
    }

    /// JSON projection for `compile --output-model`. Protected strings stay
    /// redacted; resources collapse to their index so the graph stays a DAG
    /// in the output too.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value as Json};
        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => json!(i),
            Value::Float(x) => json!(x),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Protected(_) => Json::String("***".to_string()),
            Value::Path(p) => Json::String(p.display().to_string()),
            Value::None => Json::Null,
            Value::List(list) => {
                Json::Array(list.borrow().items.iter().map(Value::to_json).collect())
            }
            Value::Dict(dict) => Json::Object(
                dict.borrow()
                    .entries
                    .iter()
                    .map(|(k, v)| (k.display(), v.to_json()))
                    .collect(),
            ),
            Value::EnumMember(..) => Json::String(self.display()),
            Value::Resource(instance) => json!({ "$ref": instance.index }),
            Value::Promise(promise) => {
                let owner = promise.owner.borrow();
                json!({
                    "$promise": {
                        "resource": owner.as_ref().map(|o| o.index.clone()),
                        "property": promise.property,
                    }
                })
            }
            _ => Json::String(self.display()),
        }
    }
}

impl DictKey {
    /// Builds a key from a value, if the value is a legal key kind.
    pub fn from_value(value: &Value) -> Option<DictKey> {
        match value {
            Value::Bool(b) => Some(DictKey::Bool(*b)),
            Value::Int(i) => Some(DictKey::Int(*i)),
            Value::Str(s) | Value::Protected(s) => Some(DictKey::Str(s.to_string())),
            Value::EnumMember(info, idx) => Some(DictKey::Enum(info.clone(), *idx)),
            _ => None,
        }
    }

    /// The type this key contributes to the dict's key type.
    pub fn type_hint(&self) -> Type {
        match self {
            DictKey::Bool(_) => Type::Bool,
            DictKey::Int(_) => Type::Int,
            DictKey::Str(_) => Type::Str,
            DictKey::Enum(info, _) => Type::Enum(info.clone()),
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_equals_only_itself() {
        assert!(Value::None.eq_value(&Value::None));
        assert!(!Value::None.eq_value(&Value::Int(0)));
        assert!(!Value::None.eq_value(&Value::Bool(false)));
        assert!(!Value::None.eq_value(&Value::str("")));
    }

    #[test]
    fn int_float_cross_equality() {
        assert!(Value::Int(1).eq_value(&Value::Float(1.0)));
        assert!(!Value::Int(1).eq_value(&Value::Float(1.5)));
    }

    #[test]
    fn list_equality_is_structural() {
        let a = Value::list(vec![Value::Int(1), Value::str("x")]);
        let b = Value::list(vec![Value::Int(1), Value::str("x")]);
        assert!(a.eq_value(&b));
    }

    #[test]
    fn protected_string_is_redacted_in_display() {
        let secret = Value::Protected("hunter2".into());
        assert_eq!(secret.display(), "***");
        assert_eq!(secret.interpolate(), "hunter2");
        assert!(secret.to_json().as_str().unwrap().contains("***"));
    }

    #[test]
    fn frozen_flag_propagates_through_nesting() {
        let inner = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![inner.clone()]);
        outer.freeze();
        let Value::List(inner) = inner else { unreachable!() };
        assert!(inner.borrow().frozen);
    }

    #[test]
    fn empty_list_type_is_bottom_element() {
        let empty = Value::list(vec![]);
        let Type::List(elem) = empty.type_of() else { panic!() };
        assert!(crate::types::is_subtype(&elem, &Type::Int));
    }
}
