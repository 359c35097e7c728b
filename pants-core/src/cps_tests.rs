use std::collections::BTreeSet;

use crate::cps::{self, Call, Callable, CallableId, Expression, NamedArgument};
use crate::error::CompilerError;
use crate::name::{self, Name};
use crate::{Compiler, Converted};

fn convert(source: &str) -> Converted {
    let lowered = Compiler::parse(source)
        .and_then(|parsed| parsed.lower())
        .unwrap_or_else(|e| panic!("front end failed: {:?}", e));
    match lowered.to_cps() {
        Ok(converted) => converted,
        Err(e) => panic!("CPS conversion failed: {:?}", e),
    }
}

fn convert_error(source: &str) -> CompilerError {
    let lowered = Compiler::parse(source)
        .and_then(|parsed| parsed.lower())
        .unwrap_or_else(|e| panic!("front end failed: {:?}", e));
    match lowered.to_cps() {
        Ok(converted) => panic!("expected an error, got {:#?}", converted.cps),
        Err(e) => e,
    }
}

fn set(names: &[Name]) -> BTreeSet<Name> {
    names.iter().cloned().collect()
}

/// `continuation(args...)` with no continuation of its own.
fn tail_call(args: Vec<Name>) -> Expression {
    Expression::Call(Call {
        callable: name::continuation(),
        left_positional: Vec::new(),
        left_arbitrary: None,
        right_positional: args,
        right_optional: Vec::new(),
        right_arbitrary: None,
        right_keyword: None,
        continuation: None,
    })
}

fn functions(program: &cps::Program) -> Vec<&Callable> {
    let mut callables = Vec::new();
    program.root.callables(&mut callables);
    callables.into_iter().filter(|c| c.function).collect()
}

#[test]
fn test_function_free_names_drop_arguments_and_add_defaults() {
    let (a, b, c, d) = (Name::user("a"), Name::user("b"), Name::user("c"), Name::user("d"));
    let mut callable = Callable::continuation(CallableId(0), a.clone(), tail_call(vec![a.clone(), b.clone(), c.clone()]));
    callable.function = true;
    callable.right_optional.push(NamedArgument {
        name: b.clone(),
        value: d.clone(),
    });
    // The continuation and dynamic scope are the function's own.
    assert_eq!(callable.free_names(), set(&[c, d]));
}

#[test]
fn test_continuation_free_names_keep_enclosing_continuation() {
    let x = Name::user("x");
    let callable = Callable::continuation(CallableId(0), x.clone(), tail_call(vec![x]));
    assert_eq!(
        callable.free_names(),
        set(&[name::continuation(), name::dynamic_vars()])
    );
}

#[test]
fn test_default_values_are_free_in_enclosing_scope() {
    let error = convert_error("{|a: b| a}");
    assert!(matches!(error, CompilerError::UnboundVariable(..)), "{:?}", error);
    assert_eq!(error.message(), "unbound variable: b");
}

#[test]
fn test_frame_names_of_function() {
    let converted = convert("f = {|a| b = a\n b}");
    let functions = functions(&converted.cps);
    assert_eq!(functions.len(), 1);
    let frame = functions[0].frame_names();
    for expected in [
        Name::user("a"),
        Name::user("b"),
        name::return_name(),
        name::continuation(),
        name::dynamic_vars(),
    ] {
        assert!(frame.contains(&expected), "frame is missing {}", expected);
    }
    assert!(!frame.contains(&Name::user("f")));

    let mut root = BTreeSet::new();
    converted.cps.root.collect_frame_names(&mut root);
    assert!(root.contains(&Name::user("f")));
    assert!(!root.contains(&Name::user("b")));
}

#[test]
fn test_captured_and_reassigned_names_are_marked() {
    let mut converted = convert("x = 0\nf = {x := 1}\nf.");
    assert_eq!(converted.mutated, set(&[Name::user("x")]));

    let mut marks = Vec::new();
    converted.cps.root.for_each_name_mut(&mut |n: &mut Name| {
        if n.name == "x" {
            marks.push(n.mutated);
        }
    });
    assert!(!marks.is_empty());
    assert!(marks.iter().all(|m| *m), "every occurrence of x should be marked");
}

#[test]
fn test_runtime_names_are_never_marked() {
    let converted = convert("print := 1\nf = {print(2)}");
    assert!(!converted.mutated.contains(&Name::user("print")));
}

#[test]
fn test_uncaptured_reassignment_is_not_marked() {
    let converted = convert("x = 0\nx := 1\nprint(x)");
    assert!(converted.mutated.is_empty());
}

#[test]
fn test_field_mutation_on_unbound_object() {
    let error = convert_error("x.field := 3");
    assert!(matches!(error, CompilerError::UnboundVariable(..)), "{:?}", error);
    assert_eq!(error.message(), "unbound variable: x");
}

#[test]
fn test_bound_program_passes() {
    let converted = convert("x = {}\nx.field := 3\nprint(x.field)");
    assert!(converted.mutated.is_empty());
}

#[test]
fn test_each_call_gets_a_continuation() {
    let converted = convert("print(1)\nprint(2)");
    let mut callables = Vec::new();
    converted.cps.root.callables(&mut callables);
    assert_eq!(callables.len(), 2);
    assert!(callables.iter().all(|c| !c.function));

    let ids: BTreeSet<CallableId> = callables.iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), 2);

    // The last continuation hands the final value to the exit continuation.
    match &callables[1].body {
        Expression::Call(call) => {
            assert_eq!(call.callable, name::continuation());
            assert!(call.continuation.is_none());
        }
        other => panic!("expected a tail call, got {:?}", other),
    }
}

#[test]
fn test_duplicate_arguments_rejected() {
    let a = Name::user("a");
    let mut callable = Callable::continuation(CallableId(0), a.clone(), tail_call(vec![a.clone()]));
    callable.left_positional.push(a);
    let error = callable.check_unique_arguments().unwrap_err();
    assert!(matches!(error, CompilerError::NamingError(..)));
}

#[test]
fn test_long_statement_chain() {
    let mut source = String::from("x = 0\n");
    for _ in 0..20_000 {
        source.push_str("x := x add. 1\n");
    }
    let converted = convert(&source);
    let mut callables = Vec::new();
    converted.cps.root.callables(&mut callables);
    assert_eq!(callables.len(), 20_000);
    assert!(converted.cps.root.free_names().contains(&Name::user("add")));
    assert!(converted.mutated.is_empty());
    // Dropped here without exhausting the test thread's stack.
}
