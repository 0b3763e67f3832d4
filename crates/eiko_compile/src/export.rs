//! Lowering the resource table into the task graph.
//!
//! One task per registered resource, identified by the resource's index. A
//! task depends on every resource referenced from its property values —
//! directly, nested inside lists/dicts, or through a promise (the consumer
//! of a promise must wait for the task that resolves it). References *through*
//! another resource are not followed: that resource has its own task, and
//! the chain of edges carries the ordering.
//!
//! The graph is validated to be a DAG before it leaves this module, and
//! frozen — the deployer never mutates it, only its own per-task state.

use std::collections::BTreeSet;
use std::rc::Rc;

use eiko_base::{EikoError, ErrorKind, Result, Span};
use indexmap::IndexMap;
use serde_json::json;

use crate::resource::{ResourceInstance, ResourceTable};
use crate::value::Value;

/// One node of the task DAG.
#[derive(Debug)]
pub struct TaskNode {
    /// Stable task id — the resource index.
    pub id: String,
    pub resource: Rc<ResourceInstance>,
    /// Indices of the tasks that must be deployed first.
    pub depends_on: BTreeSet<String>,
}

/// The frozen deployer input.
#[derive(Debug, Default)]
pub struct TaskGraph {
    pub tasks: IndexMap<String, TaskNode>,
}

impl TaskGraph {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.tasks.get(id)
    }

    /// JSON projection used by `compile --output-model`.
    pub fn to_json(&self) -> serde_json::Value {
        let tasks: Vec<serde_json::Value> = self
            .tasks
            .values()
            .map(|task| {
                json!({
                    "id": task.id,
                    "resource": task.resource.def.name,
                    "depends_on": task.depends_on.iter().collect::<Vec<_>>(),
                    "properties": task.resource.properties.iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect::<serde_json::Map<String, serde_json::Value>>(),
                })
            })
            .collect();
        json!({ "task_count": self.task_count(), "tasks": tasks })
    }
}

/// Walks every registered resource and produces the task DAG.
pub fn export_graph(table: &ResourceTable) -> Result<TaskGraph> {
    let mut tasks = IndexMap::new();
    for resource in table.iter() {
        let mut depends_on = BTreeSet::new();
        for value in resource.properties.values() {
            collect_dependencies(value, &resource.index, &mut depends_on);
        }
        tasks.insert(
            resource.index.clone(),
            TaskNode { id: resource.index.clone(), resource: resource.clone(), depends_on },
        );
    }
    let graph = TaskGraph { tasks };
    check_acyclic(&graph)?;
    tracing::debug!(tasks = graph.task_count(), "exported task graph");
    Ok(graph)
}

/// Adds an edge for each resource referenced by `value`, without traversing
/// through resources (their own tasks carry the transitive edges).
fn collect_dependencies(value: &Value, own_index: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Resource(instance) => {
            if instance.index != own_index {
                out.insert(instance.index.clone());
            }
        }
        Value::Promise(promise) => {
            if let Some(owner) = promise.owner.borrow().as_ref() {
                if owner.index != own_index {
                    out.insert(owner.index.clone());
                }
            }
        }
        Value::List(list) => {
            for item in &list.borrow().items {
                collect_dependencies(item, own_index, out);
            }
        }
        Value::Dict(dict) => {
            for entry in dict.borrow().entries.values() {
                collect_dependencies(entry, own_index, out);
            }
        }
        _ => {}
    }
}

/// Depth-first three-colour cycle check.
fn check_acyclic(graph: &TaskGraph) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }

    fn visit(
        id: &str,
        graph: &TaskGraph,
        marks: &mut IndexMap<String, Mark>,
        trail: &mut Vec<String>,
    ) -> std::result::Result<(), Vec<String>> {
        match marks.get(id).copied().unwrap_or(Mark::White) {
            Mark::Black => return Ok(()),
            Mark::Grey => {
                let mut cycle = trail.clone();
                cycle.push(id.to_string());
                return Err(cycle);
            }
            Mark::White => {}
        }
        marks.insert(id.to_string(), Mark::Grey);
        trail.push(id.to_string());
        if let Some(task) = graph.get(id) {
            for dep in &task.depends_on {
                visit(dep, graph, marks, trail)?;
            }
        }
        trail.pop();
        marks.insert(id.to_string(), Mark::Black);
        Ok(())
    }

    let mut marks = IndexMap::new();
    for id in graph.tasks.keys() {
        let mut trail = Vec::new();
        if let Err(cycle) = visit(id, graph, &mut marks, &mut trail) {
            return Err(EikoError::new(
                ErrorKind::ExportCycle { path: cycle.join(" -> ") },
                Span::default(),
            ));
        }
    }
    Ok(())
}
