//! Evaluator semantics: single assignment, operators, control flow,
//! container freezing.

use std::path::Path;

use eiko_base::{EikoError, ErrorKind};
use eiko_compile::{compile_source, Value};

fn compile(source: &str) -> Result<(eiko_compile::Compiler, eiko_compile::CompileOutput), Vec<EikoError>> {
    compile_source(source, Path::new("."))
}

fn compile_ok(source: &str) -> (eiko_compile::Compiler, eiko_compile::CompileOutput) {
    compile(source).expect("compilation should succeed")
}

fn first_error(source: &str) -> EikoError {
    compile(source).expect_err("compilation should fail").remove(0)
}

#[test]
fn reassignment_fails_on_second_occurrence() {
    let err = first_error("a = 1\na = 2\n");
    assert!(matches!(err.kind, ErrorKind::Reassign { ref name } if name == "a"));
    // Line 2, column 1: byte offset 6.
    assert_eq!(err.span.start, 6);
}

#[test]
fn forward_declaration_is_written_once() {
    let (_, output) = compile_ok("a: int\na = 5\n");
    let Some(Value::Int(5)) = output.entry.get("a") else {
        panic!("expected a == 5");
    };
}

#[test]
fn forward_declaration_cannot_be_written_twice() {
    let err = first_error("a: int\na = 5\na = 6\n");
    assert!(matches!(err.kind, ErrorKind::Reassign { .. }));
}

#[test]
fn declared_type_coerces_the_value() {
    let (_, output) = compile_ok("x: float\nx = 3\n");
    let Some(Value::Float(v)) = output.entry.get("x") else {
        panic!("expected float");
    };
    assert_eq!(v, 3.0);
}

#[test]
fn declared_type_rejects_mismatches() {
    let err = first_error("x: int\nx = \"nope\"\n");
    assert!(matches!(err.kind, ErrorKind::Type(_)));
}

#[test]
fn integer_division_promotes_when_inexact() {
    let (_, output) = compile_ok("a = 7 / 2\nb = 6 / 2\nc = 7 // 2\n");
    assert!(matches!(output.entry.get("a"), Some(Value::Float(v)) if v == 3.5));
    assert!(matches!(output.entry.get("b"), Some(Value::Int(3))));
    assert!(matches!(output.entry.get("c"), Some(Value::Int(3))));
}

#[test]
fn division_by_zero_is_an_error() {
    let err = first_error("x = 1 / 0\n");
    assert!(matches!(err.kind, ErrorKind::Eval(_)));
}

#[test]
fn string_concatenation() {
    let (_, output) = compile_ok("s = \"web\" + \"-\" + \"1\"\n");
    assert!(matches!(output.entry.get("s"), Some(Value::Str(s)) if &*s == "web-1"));
}

#[test]
fn none_compares_equal_only_to_itself() {
    let (_, output) = compile_ok("a = None == None\nb = None == 0\nc = None == False\n");
    assert!(matches!(output.entry.get("a"), Some(Value::Bool(true))));
    assert!(matches!(output.entry.get("b"), Some(Value::Bool(false))));
    assert!(matches!(output.entry.get("c"), Some(Value::Bool(false))));
}

#[test]
fn membership_tests_use_structural_equality() {
    let source = "\
xs = [1, 2, 3]
a = 2 in xs
b = 5 in xs
d = {\"k\": 1}
c = \"k\" in d
s = \"ell\" in \"hello\"
";
    let (_, output) = compile_ok(source);
    assert!(matches!(output.entry.get("a"), Some(Value::Bool(true))));
    assert!(matches!(output.entry.get("b"), Some(Value::Bool(false))));
    assert!(matches!(output.entry.get("c"), Some(Value::Bool(true))));
    assert!(matches!(output.entry.get("s"), Some(Value::Bool(true))));
}

#[test]
fn if_elif_else_takes_one_branch() {
    let source = "\
x = 7
if x == 1:
    r = \"one\"
elif x == 7:
    r = \"seven\"
else:
    r = \"other\"
";
    let (_, output) = compile_ok(source);
    assert!(matches!(output.entry.get("r"), Some(Value::Str(s)) if &*s == "seven"));
}

#[test]
fn condition_must_be_bool() {
    let err = first_error("if 1:\n    x = 2\n");
    assert!(matches!(err.kind, ErrorKind::Type(_)));
}

#[test]
fn for_iterates_lists_in_order() {
    let source = "\
out = []
for n in [1, 2, 3]:
    out.append(n * 10)
";
    let (_, output) = compile_ok(source);
    let Some(Value::List(list)) = output.entry.get("out") else { panic!() };
    let items: Vec<i64> = list
        .borrow()
        .items
        .iter()
        .map(|v| match v {
            Value::Int(i) => *i,
            other => panic!("expected int, got {other:?}"),
        })
        .collect();
    assert_eq!(items, vec![10, 20, 30]);
}

#[test]
fn for_iterates_dict_keys_in_insertion_order() {
    let source = "\
out = []
for key in {\"b\": 1, \"a\": 2}:
    out.append(key)
";
    let (_, output) = compile_ok(source);
    let Some(Value::List(list)) = output.entry.get("out") else { panic!() };
    let keys: Vec<String> = list
        .borrow()
        .items
        .iter()
        .map(|v| v.display())
        .collect();
    assert_eq!(keys, vec!["b", "a"]);
}

#[test]
fn loop_variable_is_fresh_per_iteration() {
    // Re-binding the loop variable across iterations is not a reassignment.
    let (_, output) = compile_ok("count = [1, 2, 3]\nfor n in count:\n    m = n\n");
    assert!(output.entry.get("count").is_some());
}

#[test]
fn fstring_interpolation() {
    let source = "\
host = \"web\"
port = 8080
addr = f\"{host}:{port}\"
";
    let (_, output) = compile_ok(source);
    assert!(matches!(output.entry.get("addr"), Some(Value::Str(s)) if &*s == "web:8080"));
}

#[test]
fn list_append_works_until_a_resource_freezes_it() {
    let source = "\
xs = [1, 2]
xs.append(3)

resource Box:
    name: str
    items: list[int]

b = Box(\"b\", xs)
xs.append(4)
";
    let err = first_error(source);
    assert!(matches!(err.kind, ErrorKind::Eval(_)));
    assert!(err.to_string().contains("append"));
}

#[test]
fn unknown_name_is_a_name_error() {
    let err = first_error("x = missing\n");
    assert!(matches!(err.kind, ErrorKind::Name(ref n) if n == "missing"));
}

#[test]
fn protected_str_is_redacted_in_model_output() {
    let source = "\
resource Secret:
    name: str
    token: ProtectedStr

s = Secret(\"s\", \"hunter2\")
";
    let (_, output) = compile_ok(source);
    let json = output.graph.to_json().to_string();
    assert!(!json.contains("hunter2"));
    assert!(json.contains("***"));
}

#[test]
fn enum_members_compare_and_key_dicts() {
    let source = "\
enum Flavour:
    debian
    alpine

pick = Flavour.debian
same = pick == Flavour.debian
names = {Flavour.debian: \"deb\", Flavour.alpine: \"alp\"}
chosen = names[pick]
";
    let (_, output) = compile_ok(source);
    assert!(matches!(output.entry.get("same"), Some(Value::Bool(true))));
    assert!(matches!(output.entry.get("chosen"), Some(Value::Str(s)) if &*s == "deb"));
}

#[test]
fn float_keys_are_rejected_in_dicts() {
    let err = first_error("d = {1.5: \"x\"}\n");
    assert!(matches!(err.kind, ErrorKind::Type(_)));
}
