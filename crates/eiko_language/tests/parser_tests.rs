//! Parser integration tests: whole-module parses and error recovery.

use std::path::PathBuf;

use eiko_base::{Interner, SourceMap};
use eiko_language::ast::{ExprKind, Literal, StmtKind, TypeExprKind};
use eiko_language::parse_source;

fn parse(source: &str) -> (eiko_language::Module, Vec<eiko_base::EikoError>, Interner) {
    let mut sources = SourceMap::new();
    let file = sources.add(PathBuf::from("test.eiko"), source.to_string());
    let mut interner = Interner::new();
    let (module, errors) = parse_source(source, file, &mut interner);
    (module, errors, interner)
}

fn parse_ok(source: &str) -> (eiko_language::Module, Interner) {
    let (module, errors, interner) = parse(source);
    assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
    (module, interner)
}

#[test]
fn assignment_and_annotation() {
    let (module, interner) = parse_ok("a = 1\nb: int = 2\nc: str\n");
    assert_eq!(module.stmts.len(), 3);
    match &module.stmts[1].kind {
        StmtKind::Assign { annotation: Some(ann), .. } => match &ann.kind {
            TypeExprKind::Name(sym) => assert_eq!(interner.resolve(*sym), "int"),
            other => panic!("expected plain type name, got {other:?}"),
        },
        other => panic!("expected annotated assignment, got {other:?}"),
    }
    assert!(matches!(module.stmts[2].kind, StmtKind::Declare { .. }));
}

#[test]
fn resource_with_properties_and_constructor() {
    let source = "\
resource Host:
    name: str
    port: int = 22

    def __init__(self, name: str):
        self.name = name
";
    let (module, interner) = parse_ok(source);
    let StmtKind::Resource(decl) = &module.stmts[0].kind else {
        panic!("expected resource declaration");
    };
    assert_eq!(interner.resolve(decl.name), "Host");
    assert_eq!(decl.properties.len(), 2);
    assert!(decl.properties[1].default.is_some());
    assert_eq!(decl.constructors.len(), 1);
    assert_eq!(decl.constructors[0].params.len(), 1);
}

#[test]
fn promise_property_is_flagged() {
    let source = "\
resource Vm:
    name: str
    promise ip: str
";
    let (module, _) = parse_ok(source);
    let StmtKind::Resource(decl) = &module.stmts[0].kind else { panic!() };
    assert!(!decl.properties[0].promise);
    assert!(decl.properties[1].promise);
}

#[test]
fn index_decorator_is_extracted() {
    let source = "\
@index([\"host.name\", \"path\"])
resource File:
    path: str
";
    let (module, _) = parse_ok(source);
    let StmtKind::Resource(decl) = &module.stmts[0].kind else { panic!() };
    assert_eq!(
        decl.index_keys.as_deref(),
        Some(&["host.name".to_string(), "path".to_string()][..])
    );
}

#[test]
fn constraint_decorator_attaches_to_constructor() {
    let source = "\
resource WebServer:
    host: str

    @constraint(isinstance(h, Debian))
    implement debian(self, h: Host):
        self.host = h

    @constraint(isinstance(h, Windows))
    implement windows(self, h: Host):
        self.host = h
";
    let (module, _) = parse_ok(source);
    let StmtKind::Resource(decl) = &module.stmts[0].kind else { panic!() };
    assert_eq!(decl.constructors.len(), 2);
    assert!(decl.constructors.iter().all(|c| c.constraint.is_some()));
}

#[test]
fn inherit_only_body() {
    let source = "\
resource Derived(Base):
    ...
";
    let (module, interner) = parse_ok(source);
    let StmtKind::Resource(decl) = &module.stmts[0].kind else { panic!() };
    assert!(decl.inherit_only);
    let (parent, _) = decl.parent.expect("parent");
    assert_eq!(interner.resolve(parent), "Base");
}

#[test]
fn inherit_only_with_constructor_override() {
    let source = "\
resource Derived(Base):
    ...

    def __init__(self, name: str):
        self.name = name
";
    let (module, _) = parse_ok(source);
    let StmtKind::Resource(decl) = &module.stmts[0].kind else { panic!() };
    assert!(decl.inherit_only);
    assert_eq!(decl.constructors.len(), 1);
}

#[test]
fn typedef_with_refinement() {
    let (module, interner) =
        parse_ok("typedef Port int if 1 <= self and self <= 65535\n");
    let StmtKind::Typedef(decl) = &module.stmts[0].kind else { panic!() };
    assert_eq!(interner.resolve(decl.name), "Port");
    assert!(decl.refinement.is_some());
}

#[test]
fn enum_declaration() {
    let source = "\
enum Flavour:
    debian
    alpine
";
    let (module, interner) = parse_ok(source);
    let StmtKind::Enum(decl) = &module.stmts[0].kind else { panic!() };
    assert_eq!(interner.resolve(decl.name), "Flavour");
    assert_eq!(decl.members.len(), 2);
}

#[test]
fn imports_plain_dotted_aliased() {
    let (module, _) = parse_ok("import std\nimport std.file as f\nfrom .sub import a, b as c\n");
    assert!(matches!(module.stmts[0].kind, StmtKind::Import { ref path, alias: None } if path.len() == 1));
    assert!(matches!(module.stmts[1].kind, StmtKind::Import { ref path, alias: Some(_) } if path.len() == 2));
    match &module.stmts[2].kind {
        StmtKind::FromImport { dots, path, names } => {
            assert_eq!(*dots, 1);
            assert_eq!(path.len(), 1);
            assert_eq!(names.len(), 2);
            assert!(names[1].1.is_some());
        }
        other => panic!("expected from-import, got {other:?}"),
    }
}

#[test]
fn for_and_if_blocks() {
    let source = "\
for port in [80, 443]:
    if port == 80:
        a = port
    else:
        b = port
";
    let (module, _) = parse_ok(source);
    let StmtKind::For { body, .. } = &module.stmts[0].kind else { panic!() };
    assert!(matches!(body[0].kind, StmtKind::If { .. }));
}

#[test]
fn multiline_call_with_trailing_comma() {
    let source = "\
s = Server(
    \"web-1\",
    8080,
)
";
    let (module, _) = parse_ok(source);
    let StmtKind::Assign { value, .. } = &module.stmts[0].kind else { panic!() };
    let ExprKind::Call { args, .. } = &value.kind else { panic!() };
    assert_eq!(args.len(), 2);
}

#[test]
fn keyword_arguments() {
    let (module, _) = parse_ok("s = Server(name=\"web\", port=8080)\n");
    let StmtKind::Assign { value, .. } = &module.stmts[0].kind else { panic!() };
    let ExprKind::Call { args, .. } = &value.kind else { panic!() };
    assert!(args.iter().all(|a| a.name.is_some()));
}

#[test]
fn positional_after_keyword_is_rejected() {
    let (_, errors, _) = parse("s = Server(name=\"web\", 8080)\n");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("positional argument"));
}

#[test]
fn fstring_expression_parses() {
    let (module, _) = parse_ok("msg = f\"{host}:{port}\"\n");
    let StmtKind::Assign { value, .. } = &module.stmts[0].kind else { panic!() };
    let ExprKind::FString(parts) = &value.kind else { panic!() };
    assert_eq!(parts.len(), 3); // expr, ":", expr
}

#[test]
fn union_and_optional_annotations() {
    let (module, _) = parse_ok("x: Optional[str]\ny: Union[int, str, None]\nz: dict[str, list[int]]\n");
    for stmt in &module.stmts {
        assert!(matches!(stmt.kind, StmtKind::Declare { .. }));
    }
    let StmtKind::Declare { annotation, .. } = &module.stmts[1].kind else { panic!() };
    let TypeExprKind::Generic { args, .. } = &annotation.kind else { panic!() };
    assert_eq!(args.len(), 3);
    assert!(matches!(args[2].kind, TypeExprKind::None));
}

#[test]
fn error_recovery_keeps_later_statements() {
    let (module, errors, _) = parse("a = = 1\nb = 2\n");
    assert_eq!(errors.len(), 1);
    assert_eq!(module.stmts.len(), 1);
    assert!(matches!(module.stmts[0].kind, StmtKind::Assign { .. }));
}

#[test]
fn error_in_resource_body_skips_whole_block() {
    let source = "\
resource Broken:
    name str

after = 1
";
    let (module, errors, _) = parse(source);
    assert_eq!(errors.len(), 1);
    let last = module.stmts.last().expect("statement after bad resource");
    assert!(matches!(last.kind, StmtKind::Assign { .. }));
}

#[test]
fn invalid_assignment_target() {
    let (_, errors, _) = parse("a.b = 1\n");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("assignment target"));
}

#[test]
fn self_attribute_assignment_in_constructor() {
    let source = "\
resource R:
    name: str

    def __init__(self, n: str):
        self.name = n
";
    let (module, _) = parse_ok(source);
    let StmtKind::Resource(decl) = &module.stmts[0].kind else { panic!() };
    let body = &decl.constructors[0].body;
    assert!(matches!(
        body[0].kind,
        StmtKind::Assign { target: eiko_language::ast::AssignTarget::SelfAttr(_), .. }
    ));
}

#[test]
fn literal_expression_values() {
    let (module, _) = parse_ok("x = -1.5\ny = not True\nz = None\n");
    let StmtKind::Assign { value, .. } = &module.stmts[2].kind else { panic!() };
    assert!(matches!(value.kind, ExprKind::Literal(Literal::None)));
}
