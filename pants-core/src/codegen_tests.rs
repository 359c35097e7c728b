use std::collections::BTreeSet;

use crate::codegen::{self, GeneratedCode, NameSet, NameSetId, NameSetManager, c_string_literal};
use crate::cps::CallableId;
use crate::error::CompilerError;
use crate::name::Name;
use crate::{CodegenOptions, Compiler, runtime};

fn generate(source: &str) -> GeneratedCode {
    let converted = Compiler::parse(source)
        .and_then(|parsed| parsed.lower())
        .and_then(|lowered| lowered.to_cps())
        .unwrap_or_else(|e| panic!("front end failed: {:?}", e));
    codegen::generate(&converted.cps, &converted.provided).unwrap_or_else(|e| panic!("codegen failed: {:?}", e))
}

fn compile_error(source: &str) -> CompilerError {
    match crate::compile(source, &CodegenOptions::default()) {
        Ok(_) => panic!("expected {:?} to fail", source),
        Err(e) => e,
    }
}

fn function_code(code: &GeneratedCode) -> String {
    code.functions.concat()
}

fn user_set(names: &[&str]) -> NameSet {
    names.iter().map(|n| Name::user(*n)).collect()
}

/// `((struct X*)frame)->name = source;` for any record X.
fn binds(code: &str, name: &str, source: &str) -> bool {
    let suffix = format!("*)frame)->{} = {};", name, source);
    code.lines().any(|line| line.trim().starts_with("((struct nameset_") && line.trim().ends_with(&suffix))
}

#[test]
fn test_nameset_ids_are_structural() {
    let mut manager = NameSetManager::new();
    let first = manager.get_or_assign_id(&user_set(&["a", "b"]));
    let again = manager.get_or_assign_id(&user_set(&["b", "a"]));
    let other = manager.get_or_assign_id(&user_set(&["a"]));
    assert_eq!(first, NameSetId(0));
    assert_eq!(again, first);
    assert_eq!(other, NameSetId(1));
    assert_eq!(manager.len(), 2);
}

#[test]
fn test_nameset_layouts() {
    let mut manager = NameSetManager::new();
    manager.get_or_assign_id(&user_set(&["b", "a"]));
    manager.get_or_assign_id(&BTreeSet::new());
    assert_eq!(
        manager.write_layouts(),
        "struct nameset_0 {\n  union Value u_a;\n  union Value u_b;\n};\n\
         struct nameset_1 {\n  char empty_;\n};\n"
    );
}

#[test]
fn test_globals_are_record_zero() {
    let code = generate("print(1)");
    let layouts = code.namesets.write_layouts();
    let globals = layouts.split("};").next().unwrap_or_default();
    assert!(globals.starts_with("struct nameset_0 {"));
    for provided in runtime::provided_names() {
        assert!(globals.contains(&format!(" {};", provided.c_name())), "{} missing", provided);
    }
    assert!(code.root.contains("dest = ((struct nameset_0*)frame)->u_print;"));
}

#[test]
fn test_slot_ceiling() {
    let args = |n: usize| (0..n).map(|i| format!("a{}", i)).collect::<Vec<_>>().join(", ");

    let code = generate(&format!("{{|{}| a0}}", args(63)));
    assert!(function_code(&code).contains("named_slots[1] = right_positional_args.size >= 63"));

    let error = compile_error(&format!("{{|{}| a0}}", args(64)));
    assert!(matches!(error, CompilerError::CapacityError(..)), "{:?}", error);
    assert!(error.message().starts_with("too many right arguments (64)"));

    let error = compile_error(&format!("{{|{}; x| x}}", args(64)));
    assert!(matches!(error, CompilerError::CapacityError(..)), "{:?}", error);
    assert!(error.message().starts_with("too many left arguments (64)"));
}

#[test]
fn test_keyword_table_is_sorted() {
    let code = function_code(&generate("{|zeta, alpha, mid| alpha}"));
    let search = code
        .lines()
        .find(|line| line.contains("binary_search(key, "))
        .unwrap_or_else(|| panic!("no keyword search in\n{}", code));
    let positions: Vec<usize> = ["u_alpha", "u_mid", "u_zeta"]
        .iter()
        .map(|key| {
            search
                .find(&c_string_literal(key.as_bytes()))
                .unwrap_or_else(|| panic!("{} not in table", key))
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", search);
    assert!(code.contains("side = ((const unsigned int[]){1, 1, 1})[j];"));
    assert!(code.contains("j = ((const unsigned int[]){1, 2, 0})[j];"));
}

#[test]
fn test_left_arguments_numbered_in_reverse() {
    let code = generate("f = {|x, y; z| z}\n1 2 f. 3");
    let body = function_code(&code);
    assert!(binds(&body, "u_x", "left_positional_args.data[1]"), "{}", body);
    assert!(binds(&body, "u_y", "left_positional_args.data[0]"), "{}", body);
    assert!(binds(&body, "u_z", "right_positional_args.data[0]"), "{}", body);

    // The caller fills the left buffer from the far end.
    let first = code.root.find("left_positional_args.data[1] =");
    let second = code.root.find("left_positional_args.data[0] =");
    assert!(matches!((first, second), (Some(a), Some(b)) if a < b), "{}", code.root);
}

#[test]
fn test_captured_reassigned_variable_lives_in_cell() {
    let code = generate("x = 0\nf = {x := 1}\nf.\nprint(x)");
    assert!(code.root.contains("((struct nameset_0*)frame)->u_x = make_cell(((struct nameset_0*)frame)->c_null);"));
    assert!(code.root.contains("(*((struct nameset_0*)frame)->u_x.cell.addr)"));
    // The closure copies the cell, not the value.
    assert!(code.root.contains("->u_x = ((struct nameset_0*)frame)->u_x;"));
    assert!(function_code(&code).contains("(*((struct nameset_"));
}

#[test]
fn test_plain_variable_has_no_cell() {
    let code = generate("x = 0\nprint(x)");
    assert!(!code.root.contains("make_cell"));
}

#[test]
fn test_continuation_entry_uses_cheap_path() {
    let code = generate("print(1)");
    assert!(code.root.contains("NO_KEYWORD_ARGS(((struct nameset_0*)frame)->c_dynamic__vars)"));
    assert!(code.root.contains("MIN_RIGHT_ARGS(((struct nameset_0*)frame)->c_dynamic__vars, 1)"));
    assert!(code.root.contains("MAX_RIGHT_ARGS(((struct nameset_0*)frame)->c_dynamic__vars, 1)"));
    assert!(!code.root.contains("binary_search"));
}

#[test]
fn test_function_entry_checks_named_arguments() {
    let body = function_code(&generate("{|a, b: 2| a}"));
    assert!(body.contains("argument missing!"));
    assert!(body.contains("if(!(named_slots[1] & (1ULL << 1))) {"));
    assert!(!body.contains("NO_KEYWORD_ARGS"));
}

#[test]
fn test_rest_arguments_collected_into_array() {
    let body = function_code(&generate("{|:(xs)| xs}"));
    assert!(body.contains("raw_array = new_array(&dest, j);"));
    assert!(body.lines().any(|line| line.trim().starts_with("MAX_LEFT_ARGS(") && line.trim().ends_with(", 0)")));
    assert!(!body.contains("MAX_RIGHT_ARGS"));
}

#[test]
fn test_keyword_catch_all_is_sealed() {
    let body = function_code(&generate("{|::(opts)| opts}"));
    assert!(body.contains("make_object(&dest);"));
    assert!(body.contains("seal_object("));
    assert!(!body.contains("argument %.*s unknown!"));
}

#[test]
fn test_call_site_keywords_and_splat() {
    let code = generate("xs = [1]\nopts = {}\nprint(k: 1, :(xs), ::(opts))");
    assert!(code.root.contains("keyword argument is not an object!"));
    assert!(code.root.contains("arbitrary argument is not an array!"));
    assert!(code.root.contains(&format!("set_field(&keyword_args, {}", codegen::byte_array(b"u_k"))));
}

#[test]
fn test_string_literal_bytes() {
    let code = generate("print(\"hi\")");
    assert!(code.root.contains("dest.string.value = (struct ByteArray){\"\\x68\\x69\", 2};"));
    assert!(code.root.contains("dest.string.byte_oriented = false;"));
}

#[test]
fn test_dispatch_table() {
    let dispatch = codegen::write_dispatch([CallableId(0), CallableId(3)]);
    assert_eq!(
        dispatch,
        "dispatch: ;\n  switch(target) {\n    BUILTIN_DISPATCH\n    \
         case FIRST_CALLABLE_ENTRY + 0: goto f_0;\n    \
         case FIRST_CALLABLE_ENTRY + 3: goto f_3;\n  }\n"
    );
}

#[test]
fn test_every_callable_has_a_label_and_case() {
    let code = generate("f = {|a| print(a)}\nf(1)");
    let all = format!("{}{}", code.root, function_code(&code));
    for id in 0..3 {
        assert!(all.contains(&format!("\nf_{}: ;\n", id)), "missing label f_{}", id);
        assert!(code.dispatch.contains(&format!("goto f_{};", id)));
    }
}

#[test]
fn test_repeated_keyword_at_call_site_is_accepted() {
    let code = generate("f = {|a| a}\nf(a: 1, a: 2)");
    let key = format!("set_field(&keyword_args, {}", codegen::byte_array(b"u_a"));
    assert_eq!(code.root.matches(&key).count(), 2);
    // A keyword naming a slot the positional arguments already filled.
    assert!(function_code(&code).contains("argument %.*s already provided!"));
}

#[test]
fn test_throw_sites_raise_in_current_scope() {
    let code = generate("f = {|a| a}\nf(1)\nx = new_object()\nx.y := 1\nprint(x.y)");
    let all = format!("{}{}", code.root, function_code(&code));
    let throws: Vec<&str> = all.lines().filter(|line| line.contains("THROW_ERROR(")).collect();
    assert!(throws.len() > 3);
    for line in throws {
        assert!(line.contains("->c_dynamic__vars, make_c_string("), "{}", line);
    }
    // Inside a function the scope is the one saved at entry.
    assert!(function_code(&code).contains("*)frame)->c_dynamic__vars, make_c_string(\"argument missing!\")"));
}

#[test]
fn test_shadowing_argument_gets_own_cell() {
    let code = generate("f = {|if|\n  h = {if}\n  if := 2\n  println(h())\n}\nf(1)");
    assert!(binds(&function_code(&code), "u_if", "make_cell(right_positional_args.data[0])"));
    // Assigning through the argument marks the global too, which is boxed
    // before the program starts.
    assert!(code.root.starts_with("  ((struct nameset_0*)frame)->u_if = make_cell(((struct nameset_0*)frame)->u_if);\n"));
}

#[test]
fn test_redefined_global_is_boxed() {
    let code = generate("print = {|x| 0}\ng = {print(1)}\nprint := {|x| 1}\ng()");
    assert!(code.root.contains("((struct nameset_0*)frame)->u_print = make_cell(((struct nameset_0*)frame)->u_print);"));
    assert!(code.root.contains("((struct nameset_0*)frame)->u_print = make_cell(((struct nameset_0*)frame)->c_null);"));
    assert!(code.root.contains("(*((struct nameset_0*)frame)->u_print.cell.addr)"));
    // Runtime names stay unboxed.
    assert!(!code.root.contains("c_dynamic__vars = make_cell("));
}
