//! Deployer behaviour: the CRUD state machine, ordering, promises,
//! dry runs, failure cascades, idempotence, cleanup.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use eiko_base::DeployError;
use eiko_compile::{compile_source, CompileOutput, Value};
use eiko_deploy::{
    CrudHandler, DeployOptions, Deployer, Handler, HandlerCtx, HandlerRegistry, TaskState,
};

fn compile(source: &str) -> CompileOutput {
    let (_, output) = compile_source(source, Path::new(".")).expect("compiles");
    output
}

/// Shared fake backing store: which ids exist, and an event journal.
#[derive(Default)]
struct Cloud {
    existing: HashSet<String>,
    records: HashMap<String, String>,
    events: Vec<String>,
}

impl Cloud {
    fn shared() -> Rc<RefCell<Cloud>> {
        Rc::new(RefCell::new(Cloud::default()))
    }
}

/// CRUD handler writing a resource's `name` property into the fake cloud.
struct CloudHandler {
    cloud: Rc<RefCell<Cloud>>,
}

#[async_trait(?Send)]
impl CrudHandler for CloudHandler {
    async fn read(&self, ctx: &mut HandlerCtx) {
        let cloud = self.cloud.borrow();
        ctx.deployed = cloud.existing.contains(&ctx.task_id);
        if ctx.deployed {
            let desired = ctx.resource.properties.get("name").cloned().unwrap();
            let current = cloud.records.get(&ctx.task_id).cloned().unwrap_or_default();
            if desired.display() != current {
                ctx.changes.insert("name".to_string(), desired);
            }
        }
    }

    async fn create(&self, ctx: &mut HandlerCtx) {
        let mut cloud = self.cloud.borrow_mut();
        cloud.existing.insert(ctx.task_id.clone());
        let name = ctx.resource.properties.get("name").unwrap().display();
        cloud.records.insert(ctx.task_id.clone(), name);
        cloud.events.push(format!("create:{}", ctx.task_id));
    }

    async fn update(&self, ctx: &mut HandlerCtx) {
        let mut cloud = self.cloud.borrow_mut();
        let name = ctx.resource.properties.get("name").unwrap().display();
        cloud.records.insert(ctx.task_id.clone(), name);
        cloud.events.push(format!("update:{}", ctx.task_id));
        ctx.changes.clear();
    }

    async fn cleanup(&self, ctx: &mut HandlerCtx) {
        self.cloud.borrow_mut().events.push(format!("cleanup:{}", ctx.task_id));
    }
}

const STACK: &str = "\
resource BotRes:
    name: str

resource MidRes:
    name: str
    bot: BotRes

resource TopRes:
    name: str
    mid: MidRes

bot = BotRes(\"bot\")
mid = MidRes(\"mid\", bot)
top = TopRes(\"top\", mid)
";

fn stack_registry(cloud: &Rc<RefCell<Cloud>>) -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();
    for name in ["BotRes", "MidRes", "TopRes"] {
        handlers.register_crud(name, CloudHandler { cloud: cloud.clone() });
    }
    handlers
}

#[tokio::test]
async fn first_deploy_creates_in_dependency_order() {
    let output = compile(STACK);
    let cloud = Cloud::shared();
    let handlers = stack_registry(&cloud);
    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;

    assert!(report.success());
    let events = cloud.borrow().events.clone();
    let pos = |needle: &str| events.iter().position(|e| e == needle).unwrap();
    assert!(pos("create:BotRes-bot") < pos("create:MidRes-mid"));
    assert!(pos("create:MidRes-mid") < pos("create:TopRes-top"));
}

#[tokio::test]
async fn second_deploy_is_idempotent() {
    let output = compile(STACK);
    let cloud = Cloud::shared();
    let handlers = stack_registry(&cloud);

    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;
    assert!(report.success());
    cloud.borrow_mut().events.clear();

    // Unchanged model, correct read: the second run makes zero writes.
    let output2 = compile(STACK);
    let report2 = Deployer::new(&output2.graph, &handlers, DeployOptions::default())
        .run()
        .await;
    assert!(report2.success());
    assert!(cloud.borrow().events.is_empty(), "no create/update on second run");
}

#[tokio::test]
async fn drift_triggers_update_not_create() {
    let output = compile(STACK);
    let cloud = Cloud::shared();
    let handlers = stack_registry(&cloud);
    Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;

    // Drift one record behind Eiko's back.
    cloud.borrow_mut().records.insert("MidRes-mid".into(), "tampered".into());
    cloud.borrow_mut().events.clear();

    let output2 = compile(STACK);
    let report = Deployer::new(&output2.graph, &handlers, DeployOptions::default())
        .run()
        .await;
    assert!(report.success());
    let events = cloud.borrow().events.clone();
    assert_eq!(events, vec!["update:MidRes-mid".to_string()]);
}

#[tokio::test]
async fn dry_run_reads_but_never_writes() {
    let output = compile(STACK);
    let cloud = Cloud::shared();
    let handlers = stack_registry(&cloud);
    let options = DeployOptions { dry_run: true, ..DeployOptions::default() };
    let report = Deployer::new(&output.graph, &handlers, options).run().await;

    assert!(report.success());
    assert!(cloud.borrow().events.is_empty());
    assert!(cloud.borrow().existing.is_empty());
    // Everything is absent, so every task logs a pending create.
    assert!(report.tasks["BotRes-bot"].logs.iter().any(|l| l.contains("create")));
}

/// Handler that always fails in `read`.
struct BrokenHandler;

#[async_trait(?Send)]
impl CrudHandler for BrokenHandler {
    async fn read(&self, ctx: &mut HandlerCtx) {
        ctx.fail("backing service unreachable");
    }
    async fn create(&self, _ctx: &mut HandlerCtx) {}
    async fn update(&self, _ctx: &mut HandlerCtx) {}
}

#[tokio::test]
async fn failure_cascades_to_dependents() {
    let output = compile(STACK);
    let cloud = Cloud::shared();
    let mut handlers = HandlerRegistry::new();
    handlers.register_crud("BotRes", BrokenHandler);
    handlers.register_crud("MidRes", CloudHandler { cloud: cloud.clone() });
    handlers.register_crud("TopRes", CloudHandler { cloud: cloud.clone() });

    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;

    assert!(!report.success());
    assert_eq!(report.state("BotRes-bot"), Some(TaskState::Failed));
    assert_eq!(report.state("MidRes-mid"), Some(TaskState::Skipped));
    assert_eq!(report.state("TopRes-top"), Some(TaskState::Skipped));
    assert!(cloud.borrow().events.is_empty(), "nothing downstream ran");
    assert!(matches!(
        report.tasks["BotRes-bot"].error,
        Some(DeployError::HandlerFailed { .. })
    ));
}

const PROMISE_MODEL: &str = "\
resource Vm:
    name: str
    promise ip: str

resource Dns:
    name: str
    address: str

vm = Vm(\"vm-1\")
dns = Dns(\"rec\", vm.ip)
";

/// Creates the VM and resolves its `ip` promise.
struct VmHandler {
    fail: bool,
}

#[async_trait(?Send)]
impl CrudHandler for VmHandler {
    async fn read(&self, ctx: &mut HandlerCtx) {
        if self.fail {
            ctx.fail("hypervisor offline");
        }
    }
    async fn create(&self, ctx: &mut HandlerCtx) {
        ctx.resolve_promise("ip", Value::str("10.0.0.7")).unwrap();
    }
    async fn update(&self, _ctx: &mut HandlerCtx) {}
}

/// Reads the promised address and records what it saw.
struct DnsHandler {
    seen: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl CrudHandler for DnsHandler {
    async fn read(&self, _ctx: &mut HandlerCtx) {}
    async fn create(&self, ctx: &mut HandlerCtx) {
        match ctx.property("address").await {
            Ok(value) => self.seen.borrow_mut().push(value.display()),
            Err(err) => ctx.fail(err.to_string()),
        }
    }
    async fn update(&self, _ctx: &mut HandlerCtx) {}
}

#[tokio::test]
async fn promise_resolution_reaches_the_consumer() {
    let output = compile(PROMISE_MODEL);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut handlers = HandlerRegistry::new();
    handlers.register_crud("Vm", VmHandler { fail: false });
    handlers.register_crud("Dns", DnsHandler { seen: seen.clone() });

    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;

    assert!(report.success());
    assert_eq!(seen.borrow().as_slice(), ["10.0.0.7".to_string()]);
}

#[tokio::test]
async fn failed_promise_owner_surfaces_unresolved_error() {
    let output = compile(PROMISE_MODEL);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut handlers = HandlerRegistry::new();
    handlers.register_crud("Vm", VmHandler { fail: true });
    handlers.register_crud("Dns", DnsHandler { seen: seen.clone() });

    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;

    assert_eq!(report.state("Vm-vm-1"), Some(TaskState::Failed));
    assert_eq!(report.state("Dns-rec"), Some(TaskState::Skipped));
    assert!(seen.borrow().is_empty());
    assert!(matches!(
        report.tasks["Dns-rec"].error,
        Some(DeployError::PromiseUnresolved { ref property, .. }) if property == "ip"
    ));
}

#[tokio::test]
async fn cleanup_runs_once_per_executed_task() {
    let output = compile(STACK);
    let cloud = Cloud::shared();
    let handlers = stack_registry(&cloud);
    Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;

    let events = cloud.borrow().events.clone();
    let cleanups: Vec<_> = events.iter().filter(|e| e.starts_with("cleanup:")).collect();
    assert_eq!(cleanups.len(), 3);
    // Cleanup happens strictly after every create.
    let last_create = events.iter().rposition(|e| e.starts_with("create:")).unwrap();
    let first_cleanup = events.iter().position(|e| e.starts_with("cleanup:")).unwrap();
    assert!(last_create < first_cleanup);
}

/// Sleeps long enough to trip the step timeout.
struct SlowHandler;

#[async_trait(?Send)]
impl CrudHandler for SlowHandler {
    async fn read(&self, _ctx: &mut HandlerCtx) {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
    async fn create(&self, _ctx: &mut HandlerCtx) {}
    async fn update(&self, _ctx: &mut HandlerCtx) {}
}

#[tokio::test(start_paused = true)]
async fn step_timeout_fails_the_task() {
    let output = compile("resource Slow:\n    name: str\n\nSlow(\"s\")\n");
    let mut handlers = HandlerRegistry::new();
    handlers.register_crud("Slow", SlowHandler);
    let options = DeployOptions {
        step_timeout: Some(Duration::from_secs(5)),
        ..DeployOptions::default()
    };
    let report = Deployer::new(&output.graph, &handlers, options).run().await;

    assert_eq!(report.state("Slow-s"), Some(TaskState::Failed));
    assert!(matches!(
        report.tasks["Slow-s"].error,
        Some(DeployError::Timeout { .. })
    ));
}

#[tokio::test]
async fn cancellation_before_start_skips_everything() {
    let output = compile(STACK);
    let cloud = Cloud::shared();
    let handlers = stack_registry(&cloud);
    let deployer = Deployer::new(&output.graph, &handlers, DeployOptions::default());
    deployer.cancel_token().cancel();
    let report = deployer.run().await;

    assert_eq!(report.count(TaskState::Skipped), 3);
    assert!(cloud.borrow().events.is_empty());
}

/// Single-step handler flavour.
struct TouchHandler {
    cloud: Rc<RefCell<Cloud>>,
    mark_deployed: bool,
}

#[async_trait(?Send)]
impl Handler for TouchHandler {
    async fn execute(&self, ctx: &mut HandlerCtx) {
        self.cloud.borrow_mut().events.push(format!("execute:{}", ctx.task_id));
        if self.mark_deployed {
            ctx.deployed = true;
        }
    }
}

#[tokio::test]
async fn exec_handler_success_is_the_deployed_flag() {
    let output = compile("resource Ping:\n    name: str\n\nPing(\"a\")\n");
    let cloud = Cloud::shared();
    let mut handlers = HandlerRegistry::new();
    handlers.register("Ping", TouchHandler { cloud: cloud.clone(), mark_deployed: true });
    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;
    assert!(report.success());
    assert_eq!(cloud.borrow().events, vec!["execute:Ping-a".to_string()]);
}

#[tokio::test]
async fn exec_handler_without_flag_fails() {
    let output = compile("resource Ping:\n    name: str\n\nPing(\"a\")\n");
    let cloud = Cloud::shared();
    let mut handlers = HandlerRegistry::new();
    handlers.register("Ping", TouchHandler { cloud: cloud.clone(), mark_deployed: false });
    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;
    assert_eq!(report.state("Ping-a"), Some(TaskState::Failed));
}

#[tokio::test]
async fn handler_lookup_walks_the_inheritance_chain() {
    let source = "\
resource Host:
    name: str

resource Debian(Host):
    ...

Debian(\"deb-1\")
";
    let output = compile(source);
    let cloud = Cloud::shared();
    let mut handlers = HandlerRegistry::new();
    // Registered for the parent; the derived resource reuses it.
    handlers.register_crud("Host", CloudHandler { cloud: cloud.clone() });
    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;
    assert!(report.success());
    assert_eq!(cloud.borrow().events, vec!["create:Debian-deb-1".to_string()]);
}

#[tokio::test]
async fn tasks_without_handlers_deploy_as_no_ops() {
    let output = compile("resource Note:\n    name: str\n\nNote(\"n\")\n");
    let handlers = HandlerRegistry::new();
    let report = Deployer::new(&output.graph, &handlers, DeployOptions::default())
        .run()
        .await;
    assert!(report.success());
}

#[tokio::test]
async fn scratch_dirs_are_unique_per_task() {
    let workspace = tempfile::tempdir().unwrap();

    struct ScratchHandler;

    #[async_trait(?Send)]
    impl CrudHandler for ScratchHandler {
        async fn read(&self, _ctx: &mut HandlerCtx) {}
        async fn create(&self, ctx: &mut HandlerCtx) {
            let dir = ctx.scratch_dir().unwrap().to_path_buf();
            std::fs::write(dir.join("state"), ctx.task_id.as_bytes()).unwrap();
        }
        async fn update(&self, _ctx: &mut HandlerCtx) {}
    }

    let output = compile("resource W:\n    name: str\n\nW(\"a\")\nW(\"b\")\n");
    let mut handlers = HandlerRegistry::new();
    handlers.register_crud("W", ScratchHandler);
    let options = DeployOptions {
        workspace: workspace.path().to_path_buf(),
        ..DeployOptions::default()
    };
    let report = Deployer::new(&output.graph, &handlers, options).run().await;

    assert!(report.success());
    assert!(workspace.path().join("W-a").join("state").exists());
    assert!(workspace.path().join("W-b").join("state").exists());
}
