//! Plugin bridge: linked models, handler name linkage, marshalling.

use std::path::Path;
use std::rc::Rc;

use eiko_base::ErrorKind;
use eiko_compile::{
    compile_source_with, linked_model, EikoModel, PluginFailure, PluginRegistry,
    ResourceInstance, Type, Value,
};

#[derive(Debug, PartialEq)]
struct HostModel {
    name: String,
    port: i64,
}

impl EikoModel for HostModel {
    const RESOURCE: &'static str = "Host";

    fn from_resource(resource: &ResourceInstance) -> Result<Self, String> {
        let name = match resource.properties.get("name") {
            Some(Value::Str(s)) => s.to_string(),
            other => return Err(format!("bad name property: {other:?}")),
        };
        let port = match resource.properties.get("port") {
            Some(Value::Int(i)) => *i,
            other => return Err(format!("bad port property: {other:?}")),
        };
        Ok(HostModel { name, port })
    }
}

const HOST_MODEL: &str = "\
resource Host:
    name: str
    port: int = 22

h = Host(\"web-1\")
";

#[test]
fn model_conversion_reads_properties() {
    let (compiler, _) =
        compile_source_with(HOST_MODEL, Path::new("."), PluginRegistry::new()).unwrap();
    let host = compiler.resources.get("Host-web-1").unwrap();
    let model = linked_model::<HostModel>(host).unwrap();
    assert_eq!(*model, HostModel { name: "web-1".into(), port: 22 });
}

#[test]
fn model_conversion_is_cached_and_identity_preserving() {
    let (compiler, _) =
        compile_source_with(HOST_MODEL, Path::new("."), PluginRegistry::new()).unwrap();
    let host = compiler.resources.get("Host-web-1").unwrap();
    let first = linked_model::<HostModel>(host).unwrap();
    let second = linked_model::<HostModel>(host).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn model_rejects_the_wrong_resource() {
    let source = "\
resource Other:
    name: str

Other(\"x\")
";
    let (compiler, _) =
        compile_source_with(source, Path::new("."), PluginRegistry::new()).unwrap();
    let other = compiler.resources.get("Other-x").unwrap();
    assert!(linked_model::<HostModel>(other).is_err());
}

#[test]
fn handler_names_link_onto_definitions() {
    let mut registry = PluginRegistry::new();
    registry.register_handler_name("Host");
    let (compiler, _) = compile_source_with(HOST_MODEL, Path::new("."), registry).unwrap();
    let host = compiler.resources.get("Host-web-1").unwrap();
    assert!(host.def.has_handler.get());
}

#[test]
fn unlinked_definitions_carry_no_handler_flag() {
    let (compiler, _) =
        compile_source_with(HOST_MODEL, Path::new("."), PluginRegistry::new()).unwrap();
    let host = compiler.resources.get("Host-web-1").unwrap();
    assert!(!host.def.has_handler.get());
}

#[test]
fn plugin_arguments_are_coerced_to_declared_types() {
    let mut registry = PluginRegistry::new();
    registry.register_function("__main__", "halve", vec![Type::Float], Type::Float, |args| {
        let Value::Float(x) = &args[0] else {
            return Err(PluginFailure::user("expected a float after coercion"));
        };
        Ok(Value::Float(x / 2.0))
    });
    // Passing an int exercises the Int -> Float widening before the call.
    let (_, output) =
        compile_source_with("h = halve(9)\n", Path::new("."), registry).unwrap();
    assert!(matches!(output.entry.get("h"), Some(Value::Float(v)) if v == 4.5));
}

#[test]
fn plugin_return_type_is_enforced() {
    let mut registry = PluginRegistry::new();
    registry.register_function("__main__", "lies", vec![], Type::Int, |_| {
        Ok(Value::str("not an int"))
    });
    let errors = compile_source_with("x = lies()\n", Path::new("."), registry)
        .expect_err("return type mismatch");
    assert!(matches!(errors[0].kind, ErrorKind::Plugin(_)));
}

#[test]
fn internal_plugin_errors_keep_their_trace() {
    let mut registry = PluginRegistry::new();
    registry.register_function("__main__", "crash", vec![], Type::None, |_| {
        Err(PluginFailure::Internal {
            message: "index out of bounds".into(),
            trace: Some("at host_ext::crash (plugins.rs:42)".into()),
        })
    });
    let errors =
        compile_source_with("crash()\n", Path::new("."), registry).expect_err("must fail");
    let ErrorKind::Plugin(eiko_base::PluginError::Internal { trace, .. }) = &errors[0].kind
    else {
        panic!("expected an internal plugin error");
    };
    assert!(trace.as_deref().unwrap().contains("plugins.rs:42"));
}
