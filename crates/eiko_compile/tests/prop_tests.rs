//! Property tests for the language invariants that hold for *every*
//! program, not just the handwritten cases.

use std::path::Path;

use eiko_base::ErrorKind;
use eiko_compile::compile_source;
use proptest::prelude::*;

fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("avoid keywords", |s| {
        !matches!(
            s.as_str(),
            "import" | "from" | "as" | "resource" | "typedef" | "enum" | "def" | "implement"
                | "self" | "if" | "elif" | "else" | "for" | "in" | "and" | "or" | "not"
                | "promise" | "isinstance"
        )
    })
}

proptest! {
    /// Assigning any identifier twice in the same scope fails with a
    /// reassignment error at the second site.
    #[test]
    fn double_assignment_always_fails(name in ident_strategy(), a in 0i64..1000, b in 0i64..1000) {
        let source = format!("{name} = {a}\n{name} = {b}\n");
        let errors = compile_source(&source, Path::new(".")).expect_err("must fail");
        prop_assert!(matches!(
            errors[0].kind,
            ErrorKind::Reassign { name: ref n } if *n == name
        ));
    }

    /// Single assignment of any identifier always succeeds.
    #[test]
    fn single_assignment_always_succeeds(name in ident_strategy(), a in 0i64..1000) {
        let source = format!("{name} = {a}\n");
        prop_assert!(compile_source(&source, Path::new(".")).is_ok());
    }

    /// For `typedef Port int if 1 <= self and self <= 65535`, coercion of
    /// `v` succeeds exactly when the predicate holds for `v`.
    #[test]
    fn typedef_refinement_matches_predicate(v in -100_000i64..200_000) {
        let source = format!(
            "typedef Port int if 1 <= self and self <= 65535\np = Port({v})\n"
        );
        let result = compile_source(&source, Path::new("."));
        let holds = (1..=65535).contains(&v);
        if holds {
            prop_assert!(result.is_ok());
        } else {
            let errors = result.expect_err("refinement must reject");
            prop_assert!(matches!(errors[0].kind, ErrorKind::Refinement { .. }));
        }
    }

    /// No two registered resources ever share an index: constructing two
    /// resources from distinct names yields two tasks, from the same name
    /// a duplicate-index error.
    #[test]
    fn index_uniqueness(a in "[a-z]{1,6}", b in "[a-z]{1,6}") {
        let source = format!(
            "resource Host:\n    name: str\n\nx = Host(\"{a}\")\ny = Host(\"{b}\")\n"
        );
        let result = compile_source(&source, Path::new("."));
        if a == b {
            let errors = result.expect_err("same index must collide");
            prop_assert!(matches!(errors[0].kind, ErrorKind::Index(_)));
        } else {
            let (compiler, output) = result.expect("distinct indexes compile");
            prop_assert_eq!(output.graph.task_count(), 2);
            prop_assert!(compiler.resources.get(&format!("Host-{a}")).is_some());
        }
    }

    /// The exported graph is always a DAG: every dependency of every task
    /// refers to an earlier-registered task (construction order is a
    /// topological order by construction).
    #[test]
    fn exported_graph_is_a_dag(n in 1usize..8) {
        let mut source = String::from(
            "resource Base:\n    name: str\n\n\
             resource Link(Base):\n    prev: Optional[Base] = None\n\n",
        );
        source.push_str("r0 = Link(\"n0\")\n");
        for i in 1..n {
            source.push_str(&format!("r{i} = Link(\"n{i}\", r{})\n", i - 1));
        }
        let (_, output) = compile_source(&source, Path::new(".")).expect("chain compiles");
        prop_assert_eq!(output.graph.task_count(), n);
        let ids: Vec<&String> = output.graph.tasks.keys().collect();
        for (pos, id) in ids.iter().enumerate() {
            let task = output.graph.get(id).unwrap();
            for dep in &task.depends_on {
                let dep_pos = ids.iter().position(|other| *other == dep).unwrap();
                prop_assert!(dep_pos < pos, "dependency must precede dependent");
            }
        }
    }
}
