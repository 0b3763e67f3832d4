//! The bounded-concurrency task scheduler.
//!
//! One cooperative event loop drives every task future through the CRUD
//! state machine:
//!
//! ```text
//! Pending ──(all preds Deployed/Skipped-free)──► Ready ──pick──► Running
//! Running ── read: exists, no changes ─────────► Deployed
//! Running ── read: exists + changes ── update ─► Deployed
//! Running ── read: absent ──────────── create ─► Deployed
//! Running ── handler sets failed ──────────────► Failed
//! Pending ── any predecessor Failed/Skipped ───► Skipped
//! ```
//!
//! At most `parallelism` tasks are in flight at once. Tasks own their
//! mutable state (context, change map, log buffer); the only cross-task
//! channels are promise slots, so the scheduler needs no locking. When a
//! task reaches a terminal state its unresolved promise slots are sealed,
//! which is what turns a dead upstream into a precise
//! `DeployError::PromiseUnresolved` at each consumer.
//!
//! Cancellation is graceful: running steps finish, nothing new starts,
//! pending work is skipped, and promise waiters observe the cancellation.

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use eiko_base::DeployError;
use eiko_compile::{ResourceInstance, TaskGraph, Value};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use tokio::sync::watch;

use crate::handler::{HandlerCtx, HandlerRegistry, RegisteredHandler};
use crate::promise::{PromiseStore, SealReason};

#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Dispatch only `read`; report changes without applying them.
    pub dry_run: bool,
    /// Maximum tasks in flight at once.
    pub parallelism: usize,
    /// Ceiling for each handler step; expiry fails the task.
    pub step_timeout: Option<Duration>,
    /// Root for per-task scratch directories.
    pub workspace: PathBuf,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            parallelism: 8,
            step_timeout: None,
            workspace: PathBuf::from(".eikobot/cache"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Deployed,
    Failed,
    Skipped,
}

impl TaskState {
    fn is_terminal(self) -> bool {
        matches!(self, TaskState::Deployed | TaskState::Failed | TaskState::Skipped)
    }
}

/// Terminal record of one task.
#[derive(Debug)]
pub struct TaskReport {
    pub state: TaskState,
    pub changes: indexmap::IndexMap<String, Value>,
    pub logs: Vec<String>,
    pub error: Option<DeployError>,
}

/// Outcome of a whole deploy.
#[derive(Debug, Default)]
pub struct DeployReport {
    pub tasks: IndexMap<String, TaskReport>,
}

impl DeployReport {
    pub fn success(&self) -> bool {
        self.tasks.values().all(|t| t.state == TaskState::Deployed)
    }

    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.tasks.get(id).map(|t| t.state)
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.values().filter(|t| t.state == state).count()
    }
}

/// Fires the graceful-cancellation path; cheap to clone and `Send`, so a
/// signal handler on another thread may hold it.
#[derive(Clone)]
pub struct CancelToken(Arc<watch::Sender<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

enum Outcome {
    Deployed,
    Failed(DeployError),
}

pub struct Deployer<'a> {
    graph: &'a TaskGraph,
    handlers: &'a HandlerRegistry,
    options: DeployOptions,
    promises: Rc<PromiseStore>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl<'a> Deployer<'a> {
    pub fn new(graph: &'a TaskGraph, handlers: &'a HandlerRegistry, options: DeployOptions) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            graph,
            handlers,
            options,
            promises: Rc::new(PromiseStore::new()),
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken(self.cancel_tx.clone())
    }

    /// Runs the deploy to completion and returns the per-task report.
    pub async fn run(mut self) -> DeployReport {
        let ids: Vec<String> = self.graph.tasks.keys().cloned().collect();
        let mut states: IndexMap<String, TaskState> =
            ids.iter().map(|id| (id.clone(), TaskState::Pending)).collect();
        let mut reports: IndexMap<String, TaskReport> = IndexMap::new();
        let mut executed: Vec<(String, RegisteredHandler, Rc<ResourceInstance>)> = Vec::new();
        let parallelism = self.options.parallelism.max(1);

        type TaskFuture<'f> = LocalBoxFuture<'f, (String, HandlerCtx, Outcome)>;
        let mut in_flight: FuturesUnordered<TaskFuture<'_>> = FuturesUnordered::new();
        let mut cancelled = false;

        loop {
            // Pick up a cancellation that raced ahead of the event loop
            // (e.g. fired before the first task was scheduled).
            if !cancelled && *self.cancel_rx.borrow() {
                tracing::warn!("deploy cancelled; letting running tasks finish");
                cancelled = true;
                self.promises.seal_all(SealReason::Cancelled);
            }

            // Cascade: skip anything downstream of a failure, promote the
            // rest whose predecessors all succeeded.
            let mut progressed = true;
            while progressed {
                progressed = false;
                for id in &ids {
                    if states[id] != TaskState::Pending {
                        continue;
                    }
                    let node = self.graph.get(id).expect("graph owns all ids");
                    let blocked = node.depends_on.iter().any(|dep| {
                        matches!(states.get(dep), Some(TaskState::Failed | TaskState::Skipped))
                    });
                    if blocked {
                        tracing::info!(task = %id, "skipped (failed predecessor)");
                        states[id] = TaskState::Skipped;
                        self.promises.seal_owner(id, SealReason::Unresolved);
                        let error = unresolved_promise_error(&node.resource, &self.promises);
                        reports.insert(id.clone(), skipped_report(error));
                        progressed = true;
                        continue;
                    }
                    let ready = node
                        .depends_on
                        .iter()
                        .all(|dep| states.get(dep) == Some(&TaskState::Deployed));
                    if ready {
                        states[id] = TaskState::Ready;
                        progressed = true;
                    }
                }
            }

            if cancelled {
                for id in &ids {
                    if matches!(states[id], TaskState::Pending | TaskState::Ready) {
                        states[id] = TaskState::Skipped;
                        self.promises.seal_owner(id, SealReason::Cancelled);
                        reports.insert(id.clone(), skipped_report(Some(DeployError::Cancelled)));
                    }
                }
            } else {
                for id in &ids {
                    if in_flight.len() >= parallelism {
                        break;
                    }
                    if states[id] != TaskState::Ready {
                        continue;
                    }
                    states[id] = TaskState::Running;
                    let node = self.graph.get(id).expect("graph owns all ids");
                    let handler = self.handlers.lookup(&node.resource);
                    if let Some(handler) = &handler {
                        executed.push((id.clone(), handler.clone(), node.resource.clone()));
                    }
                    tracing::info!(task = %id, "running");
                    in_flight.push(
                        run_task(
                            id.clone(),
                            node.resource.clone(),
                            handler,
                            self.promises.clone(),
                            self.options.clone(),
                        )
                        .boxed_local(),
                    );
                }
            }

            if in_flight.is_empty() {
                let unfinished: Vec<String> = ids
                    .iter()
                    .filter(|id| !states[*id].is_terminal())
                    .cloned()
                    .collect();
                if unfinished.is_empty() {
                    break;
                }
                if cancelled {
                    continue;
                }
                // Nothing running and nothing became ready: unreachable for
                // a DAG, but never leave a task unreported.
                for id in unfinished {
                    states[&id] = TaskState::Skipped;
                    self.promises.seal_owner(&id, SealReason::Unresolved);
                    reports.insert(id, skipped_report(None));
                }
                break;
            }

            tokio::select! {
                biased;
                changed = self.cancel_rx.changed(), if !cancelled => {
                    if changed.is_ok() && *self.cancel_rx.borrow() {
                        tracing::warn!("deploy cancelled; letting running tasks finish");
                        cancelled = true;
                        self.promises.seal_all(SealReason::Cancelled);
                    }
                }
                completed = in_flight.next() => {
                    let Some((id, ctx, outcome)) = completed else { continue };
                    let (state, error) = match outcome {
                        Outcome::Deployed => (TaskState::Deployed, None),
                        Outcome::Failed(err) => (TaskState::Failed, Some(err)),
                    };
                    tracing::info!(task = %id, ?state, "finished");
                    states[&id] = state;
                    // A terminal owner resolves nothing further.
                    self.promises.seal_owner(&id, SealReason::Unresolved);
                    reports.insert(id, report_from_ctx(ctx, state, error));
                }
            }
        }

        // Cleanup hooks: once per executed task, failures logged only.
        for (id, handler, resource) in executed {
            if let RegisteredHandler::Crud(crud) = handler {
                let mut ctx = HandlerCtx::new(
                    resource,
                    self.options.workspace.clone(),
                    self.promises.clone(),
                );
                crud.cleanup(&mut ctx).await;
                if ctx.failed {
                    tracing::warn!(task = %id, "cleanup failed (ignored)");
                }
                if let Some(report) = reports.get_mut(&id) {
                    report.logs.extend(ctx.logs().iter().cloned());
                }
            }
        }

        DeployReport { tasks: reports }
    }
}

/// A task skipped behind a failure reports the promise it can now never
/// read, if any of its properties is one.
fn unresolved_promise_error(
    resource: &ResourceInstance,
    promises: &PromiseStore,
) -> Option<DeployError> {
    for value in resource.properties.values() {
        if let Value::Promise(promise) = value {
            let Some(owner) = promise.owner.borrow().clone() else { continue };
            if owner.index == resource.index {
                continue;
            }
            if promises.slot(&owner.index, &promise.property).value().is_none() {
                return Some(DeployError::PromiseUnresolved {
                    resource: owner.index,
                    property: promise.property.clone(),
                });
            }
        }
    }
    None
}

fn skipped_report(error: Option<DeployError>) -> TaskReport {
    TaskReport {
        state: TaskState::Skipped,
        changes: indexmap::IndexMap::new(),
        logs: Vec::new(),
        error,
    }
}

fn report_from_ctx(ctx: HandlerCtx, state: TaskState, error: Option<DeployError>) -> TaskReport {
    let mut changes = indexmap::IndexMap::new();
    for (key, value) in &ctx.changes {
        changes.insert(key.clone(), value.clone());
    }
    TaskReport { state, changes, logs: ctx.logs().to_vec(), error }
}

/// Runs one handler step under the optional per-step timeout. Returns
/// `true` if the step timed out.
async fn bounded<F>(future: F, limit: Option<Duration>) -> bool
where
    F: std::future::Future<Output = ()>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.is_err(),
        None => {
            future.await;
            false
        }
    }
}

async fn run_task(
    id: String,
    resource: Rc<ResourceInstance>,
    handler: Option<RegisteredHandler>,
    promises: Rc<PromiseStore>,
    options: DeployOptions,
) -> (String, HandlerCtx, Outcome) {
    let mut ctx = HandlerCtx::new(resource, options.workspace.clone(), promises);
    let timeout = options.step_timeout;
    let timeout_err = || Outcome::Failed(DeployError::Timeout { task: id.clone() });
    let handler_err = |ctx: &HandlerCtx| {
        Outcome::Failed(DeployError::HandlerFailed {
            task: id.clone(),
            detail: ctx
                .logs()
                .iter()
                .rev()
                .find(|line| line.starts_with("error: "))
                .cloned()
                .unwrap_or_else(|| "handler reported failure".to_string()),
        })
    };

    let Some(handler) = handler else {
        // Nothing registered for this definition: the resource exists only
        // in the model, so the task is trivially deployed.
        tracing::debug!(task = %id, "no handler registered");
        return (id, ctx, Outcome::Deployed);
    };

    match handler {
        RegisteredHandler::Exec(exec) => {
            if options.dry_run {
                ctx.log("dry run: execute step skipped");
                return (id, ctx, Outcome::Deployed);
            }
            if bounded(exec.execute(&mut ctx), timeout).await {
                return (id.clone(), ctx, timeout_err());
            }
            if ctx.failed {
                let outcome = handler_err(&ctx);
                return (id, ctx, outcome);
            }
            if !ctx.deployed {
                ctx.fail("handler finished without marking the resource deployed");
                let outcome = handler_err(&ctx);
                return (id, ctx, outcome);
            }
            (id, ctx, Outcome::Deployed)
        }
        RegisteredHandler::Crud(crud) => {
            if bounded(crud.pre(&mut ctx), timeout).await {
                return (id.clone(), ctx, timeout_err());
            }
            if bounded(crud.read(&mut ctx), timeout).await {
                return (id.clone(), ctx, timeout_err());
            }
            if ctx.failed {
                let outcome = handler_err(&ctx);
                return (id, ctx, outcome);
            }

            if options.dry_run {
                if !ctx.changes.is_empty() || !ctx.deployed {
                    ctx.log(if ctx.deployed {
                        "dry run: update required"
                    } else {
                        "dry run: create required"
                    });
                }
                return (id, ctx, Outcome::Deployed);
            }

            if !ctx.deployed {
                if bounded(crud.create(&mut ctx), timeout).await {
                    return (id.clone(), ctx, timeout_err());
                }
            } else if !ctx.changes.is_empty() {
                if bounded(crud.update(&mut ctx), timeout).await {
                    return (id.clone(), ctx, timeout_err());
                }
            }
            if ctx.failed {
                let outcome = handler_err(&ctx);
                return (id, ctx, outcome);
            }

            if bounded(crud.post(&mut ctx), timeout).await {
                return (id.clone(), ctx, timeout_err());
            }
            if ctx.failed {
                let outcome = handler_err(&ctx);
                return (id, ctx, outcome);
            }
            (id, ctx, Outcome::Deployed)
        }
    }
}
