//! Exporter: task-per-resource, dependency edges, dedup, DAG validation.

use std::path::Path;

use eiko_compile::compile_source;

fn compile_ok(source: &str) -> (eiko_compile::Compiler, eiko_compile::CompileOutput) {
    compile_source(source, Path::new(".")).expect("compilation should succeed")
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

resource Collector:
    name: str
    tops: list[TopRes]

bot = BotRes(\"bot\")
mid_a = MidRes(\"mid-a\", bot)
mid_b = MidRes(\"mid-b\", bot)
top_a = TopRes(\"top-a\", mid_a)
top_b = TopRes(\"top-b\", mid_b)
collector = Collector(\"all\", [top_a, top_b])
";

#[test]
fn layered_stack_exports_six_tasks() {
    let (_, output) = compile_ok(STACK);
    assert_eq!(output.graph.task_count(), 6);
}

#[test]
fn edges_follow_direct_references_only() {
    let (_, output) = compile_ok(STACK);
    let graph = &output.graph;

    let mid_a = graph.get("MidRes-mid-a").unwrap();
    assert!(mid_a.depends_on.contains("BotRes-bot"));

    let top_a = graph.get("TopRes-top-a").unwrap();
    assert!(top_a.depends_on.contains("MidRes-mid-a"));
    // Not through MidRes: BotRes is MidRes's dependency, not TopRes's.
    assert!(!top_a.depends_on.contains("BotRes-bot"));

    let collector = graph.get("Collector-all").unwrap();
    assert!(collector.depends_on.contains("TopRes-top-a"));
    assert!(collector.depends_on.contains("TopRes-top-b"));
    assert_eq!(collector.depends_on.len(), 2);
}

#[test]
fn shared_children_are_deduplicated() {
    let (_, output) = compile_ok(STACK);
    // `bot` is referenced by both MidRes tasks but appears once.
    let bots: Vec<_> = output
        .graph
        .tasks
        .keys()
        .filter(|id| id.starts_with("BotRes-"))
        .collect();
    assert_eq!(bots.len(), 1);
}

#[test]
fn anonymous_resources_still_export() {
    let source = "\
resource Marker:
    name: str

Marker(\"unbound\")
";
    let (_, output) = compile_ok(source);
    assert_eq!(output.graph.task_count(), 1);
    assert!(output.graph.get("Marker-unbound").is_some());
}

#[test]
fn promise_references_create_edges() {
    let source = "\
resource Vm:
    name: str
    promise ip: str

resource Dns:
    name: str
    address: str

vm = Vm(\"vm-1\")
dns = Dns(\"rec\", vm.ip)
";
    let (_, output) = compile_ok(source);
    let dns = output.graph.get("Dns-rec").unwrap();
    assert!(dns.depends_on.contains("Vm-vm-1"));
}

#[test]
fn dict_nested_references_create_edges() {
    let source = "\
resource Disk:
    name: str

resource Vm:
    name: str
    mounts: dict[str, Disk]

d = Disk(\"data\")
vm = Vm(\"vm-1\", {\"/data\": d})
";
    let (_, output) = compile_ok(source);
    let vm = output.graph.get("Vm-vm-1").unwrap();
    assert!(vm.depends_on.contains("Disk-data"));
}

#[test]
fn model_json_contains_tasks_and_edges() {
    let (_, output) = compile_ok(STACK);
    let json = output.graph.to_json();
    assert_eq!(json["task_count"], 6);
    let tasks = json["tasks"].as_array().unwrap();
    assert!(tasks.iter().any(|t| t["id"] == "Collector-all"));
}
