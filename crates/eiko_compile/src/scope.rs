//! Lexical scopes and the single-assignment discipline.
//!
//! The evaluator keeps a stack of frames. Frame 0 of a module evaluation is
//! the module scope (its assigned bindings become the module environment);
//! constructor calls and `for` iterations push short-lived frames on top.
//!
//! Bindings move through at most two states: *declared* (a forward type
//! annotation, no value yet) and *assigned*. An assigned binding can never
//! be written again — that is the language's core invariant, enforced here
//! so every write path shares it.

use eiko_base::Span;
use indexmap::IndexMap;

use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Option<Value>,
    /// Type from a forward declaration or annotated assignment.
    pub declared: Option<Type>,
    pub span: Span,
}

/// What a write attempt found. The evaluator turns these into diagnostics
/// with the right spans.
pub enum WriteOutcome {
    /// Fresh binding created in the innermost frame.
    Created,
    /// A forward declaration was fulfilled; carries the declared type so the
    /// caller can coerce.
    Fulfilled(Option<Type>),
    /// The name is already assigned (here or in an enclosing frame).
    AlreadyAssigned(Span),
}

#[derive(Default)]
pub struct Frame {
    vars: IndexMap<String, Binding>,
}

pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { frames: vec![Frame::default()] }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the root frame");
        self.frames.pop();
    }

    /// Reads a binding's value, innermost frame first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.vars.get(name))
            .and_then(|b| b.value.as_ref())
    }

    /// Looks up the binding record itself (assigned or merely declared).
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.vars.get(name))
    }

    /// Records a forward declaration (`name: type`). Fails on a duplicate
    /// declaration or an already-assigned name by returning the prior span.
    pub fn declare(&mut self, name: &str, ty: Type, span: Span) -> Result<(), Span> {
        if let Some(existing) = self.frames.iter().rev().find_map(|f| f.vars.get(name)) {
            return Err(existing.span);
        }
        self.frames
            .last_mut()
            .unwrap()
            .vars
            .insert(name.to_string(), Binding { value: None, declared: Some(ty), span });
        Ok(())
    }

    /// Attempts to write `name`. Does not store the value when the outcome
    /// is [`WriteOutcome::Fulfilled`] — the caller coerces first and then
    /// calls [`ScopeStack::store`].
    pub fn check_write(&mut self, name: &str) -> WriteOutcome {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.vars.get(name) {
                return if binding.value.is_some() {
                    WriteOutcome::AlreadyAssigned(binding.span)
                } else {
                    WriteOutcome::Fulfilled(binding.declared.clone())
                };
            }
        }
        WriteOutcome::Created
    }

    /// Stores a value, either fulfilling the existing declaration (wherever
    /// it lives) or creating a binding in the innermost frame.
    pub fn store(&mut self, name: &str, value: Value, declared: Option<Type>, span: Span) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(binding) = frame.vars.get_mut(name) {
                debug_assert!(binding.value.is_none(), "reassignment must be caught first");
                binding.value = Some(value);
                binding.span = span;
                return;
            }
        }
        self.frames
            .last_mut()
            .unwrap()
            .vars
            .insert(name.to_string(), Binding { value: Some(value), declared, span });
    }

    /// Creates a binding in the innermost frame unconditionally, shadowing
    /// any outer binding of the same name. Used for loop variables,
    /// constructor parameters, `self`, and refinement evaluation — the
    /// bindings the language defines as fresh per entry.
    pub fn store_local(&mut self, name: &str, value: Value, span: Span) {
        self.frames
            .last_mut()
            .unwrap()
            .vars
            .insert(name.to_string(), Binding { value: Some(value), declared: None, span });
    }

    /// Drains the root frame's assigned bindings; used when a module
    /// evaluation finishes to build the module environment.
    pub fn into_module_bindings(mut self) -> IndexMap<String, Value> {
        let root = self.frames.remove(0);
        root.vars
            .into_iter()
            .filter_map(|(name, binding)| binding.value.map(|v| (name, v)))
            .collect()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
