//! Typedef refinements: coercion succeeds iff the predicate holds.

use std::path::Path;

use eiko_base::{EikoError, ErrorKind};
use eiko_compile::{compile_source, Value};

fn compile(source: &str) -> Result<(eiko_compile::Compiler, eiko_compile::CompileOutput), Vec<EikoError>> {
    compile_source(source, Path::new("."))
}

fn first_error(source: &str) -> EikoError {
    compile(source).expect_err("compilation should fail").remove(0)
}

const PORT_TYPEDEF: &str = "typedef Port int if 1 <= self and self <= 65535\n";

#[test]
fn refined_value_passes_coercion() {
    let source = format!(
        "{PORT_TYPEDEF}\
resource S:
    port: Port

s = S(8080)
"
    );
    let (compiler, _) = compile(&source).expect("S(8080) should compile");
    assert!(compiler.resources.get("S-8080").is_some());
}

#[test]
fn refinement_rejection_is_a_refinement_error() {
    let source = format!(
        "{PORT_TYPEDEF}\
resource S:
    port: Port

s = S(-1)
"
    );
    let err = first_error(&source);
    assert!(
        matches!(err.kind, ErrorKind::Refinement { ref typedef, .. } if typedef == "Port"),
        "got {err:?}"
    );
}

#[test]
fn explicit_typedef_call_coerces() {
    let source = format!("{PORT_TYPEDEF}p = Port(443)\n");
    let (_, output) = compile(&source).expect("Port(443) should compile");
    assert!(matches!(output.entry.get("p"), Some(Value::Int(443))));
}

#[test]
fn explicit_typedef_call_rejects() {
    let source = format!("{PORT_TYPEDEF}p = Port(0)\n");
    let err = first_error(&source);
    assert!(matches!(err.kind, ErrorKind::Refinement { .. }));
}

#[test]
fn typedef_without_refinement_is_a_rename() {
    let source = "\
typedef Hostname str

resource H:
    name: Hostname

h = H(\"db-1\")
";
    let (compiler, _) = compile(source).expect("rename typedef accepts any str");
    assert!(compiler.resources.get("H-db-1").is_some());
}

#[test]
fn typedef_refinement_can_use_string_operations() {
    let source = "\
typedef NonEmpty str if self != \"\"

resource N:
    name: NonEmpty

bad = N(\"\")
";
    let err = first_error(source);
    assert!(matches!(err.kind, ErrorKind::Refinement { .. }));
}

#[test]
fn isinstance_treats_typedef_as_refined_subtype() {
    let source = format!(
        "{PORT_TYPEDEF}\
yes = isinstance(8080, Port)
no = isinstance(700000, Port)
not_int = isinstance(\"x\", Port)
plain = isinstance(8080, int)
"
    );
    let (_, output) = compile(&source).expect("isinstance calls compile");
    assert!(matches!(output.entry.get("yes"), Some(Value::Bool(true))));
    assert!(matches!(output.entry.get("no"), Some(Value::Bool(false))));
    assert!(matches!(output.entry.get("not_int"), Some(Value::Bool(false))));
    assert!(matches!(output.entry.get("plain"), Some(Value::Bool(true))));
}

#[test]
fn typedef_over_typedef_chains_refinements() {
    let source = format!(
        "{PORT_TYPEDEF}\
typedef WellKnown Port if self <= 1023

resource S:
    port: WellKnown

ok = S(443)
"
    );
    let (compiler, _) = compile(&source).expect("chained refinement accepts 443");
    assert!(compiler.resources.get("S-443").is_some());
}

#[test]
fn chained_refinement_rejects_on_outer_predicate() {
    let source = format!(
        "{PORT_TYPEDEF}\
typedef WellKnown Port if self <= 1023

resource S:
    port: WellKnown

bad = S(8080)
"
    );
    let err = first_error(&source);
    assert!(matches!(err.kind, ErrorKind::Refinement { .. }));
}

#[test]
fn container_coercion_builds_new_containers() {
    let source = format!(
        "{PORT_TYPEDEF}\
raw = [80, 443]

resource Firewall:
    name: str
    open: list[Port]

f = Firewall(\"fw\", raw)
raw.append(99999)
"
    );
    // The coerced list is a fresh container: the original stays appendable
    // and the out-of-range value never touches the resource.
    let (compiler, _) = compile(&source).expect("original list stays unfrozen");
    assert!(compiler.resources.get("Firewall-fw").is_some());
}
