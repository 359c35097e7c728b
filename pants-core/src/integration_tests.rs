use crate::error::CompilerError;
use crate::{CodegenOptions, Compiler, compile, diags, runtime};

const FIBONACCI: &str = r#"
fib = {|n|
  if(n lessthan. 2, {n}, {add(fib(n subtract. 1), fib(n subtract. 2))})
}
println(fib(10))
"#;

const COUNTER: &str = r#"
count = 0
bump = {|by: 1| count := count add. by}
bump()
bump(by: 5)
println(count)
"#;

const OBJECTS: &str = r#"
point = new_object(x: 1, y: 2)
point.x := 10
xs = [point.x, point.y, "three"]
xs[0] := 0.5
d = {"a": 1, b"b": 2}
print(xs[2], d["a"])
"#;

fn compile_ok(source: &str) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    compile(source, &CodegenOptions::default()).unwrap_or_else(|e| panic!("compile failed: {}", e))
}

#[test]
fn test_compile_sample_programs() {
    for source in [FIBONACCI, COUNTER, OBJECTS] {
        let c = compile_ok(source);
        assert!(c.contains("int main(int argc, char** argv) {"));
        assert!(c.contains("dispatch: ;"));
        assert!(c.trim_end().ends_with('}'));
    }
}

#[test]
fn test_output_is_deterministic() {
    for source in [FIBONACCI, COUNTER, OBJECTS] {
        assert_eq!(compile_ok(source), compile_ok(source));
    }
}

#[test]
fn test_blocks_are_assembled_in_order() {
    let c = compile_ok(FIBONACCI);
    let position = |needle: &str| c.find(needle).unwrap_or_else(|| panic!("{:?} missing", needle));
    let header = position(runtime::HEADER);
    let data = position(runtime::DATA_STRUCTURES);
    let layouts = position("struct nameset_0 {");
    let start = position(runtime::START_MAIN);
    let dispatch = position("dispatch: ;");
    let end = position(runtime::END_MAIN);
    assert!(header < data && data < layouts && layouts < start && start < dispatch && dispatch < end);
}

#[test]
fn test_gc_option_adds_define() {
    let plain = compile_ok("println(1)");
    let collected = compile("println(1)", &CodegenOptions { use_gc: true }).unwrap();
    assert!(!plain.contains("#define PANTS_USE_GC"));
    assert!(collected.starts_with("#define PANTS_USE_GC 1\n"));
    assert_eq!(collected.len() - plain.len(), "#define PANTS_USE_GC 1\n".len());
}

#[test]
fn test_counter_shares_one_cell() {
    let c = compile_ok(COUNTER);
    assert_eq!(c.matches("->u_count = make_cell(").count(), 1);
}

#[test]
fn test_mutual_recursion_compiles() {
    let c = compile_ok(
        "odd = null\n\
         even = {|n| if(n equals. 0, {true}, {odd(n subtract. 1)})}\n\
         odd := {|n| if(n equals. 0, {false}, {even(n subtract. 1)})}\n\
         println(even(4))",
    );
    assert!(c.contains("((struct nameset_0*)frame)->u_even = make_cell("));
    assert!(c.contains("((struct nameset_0*)frame)->u_odd = make_cell("));
}

#[test]
fn test_forward_reference_is_unbound() {
    let error = compile(
        "even = {|n| odd(n)}\nodd = {|n| even(n)}",
        &CodegenOptions::default(),
    )
    .unwrap_err();
    assert_eq!(error.message(), "unbound variable: odd");
}

#[test]
fn test_unbound_variable_reported() {
    let error = compile("println(missing)", &CodegenOptions::default()).unwrap_err();
    assert_eq!(error, CompilerError::UnboundVariable("unbound variable: missing".into(), None));
}

#[test]
fn test_parse_error_has_location() {
    let error = compile("f(1,\n2", &CodegenOptions::default()).unwrap_err();
    assert!(matches!(error, CompilerError::ParseError(..)));
    assert!(error.span().is_some());
}

#[test]
fn test_lexer_error_is_parse_error() {
    let error = compile("x = \"unterminated", &CodegenOptions::default()).unwrap_err();
    assert!(matches!(error, CompilerError::ParseError(..)), "{:?}", error);
}

#[test]
fn test_stage_dumps_are_stable() {
    let dumps = |source: &str| {
        let parsed = Compiler::parse(source).unwrap_or_else(|e| panic!("{}", e));
        let ast = diags::format_ast(&parsed.ast);
        let lowered = parsed.lower().unwrap_or_else(|e| panic!("{}", e));
        let ir = diags::format_ir(&lowered.ir);
        let converted = lowered.to_cps().unwrap_or_else(|e| panic!("{}", e));
        (ast, ir, diags::format_cps(&converted.cps))
    };
    let first = dumps(COUNTER);
    assert_eq!(first, dumps(COUNTER));

    let (ast, ir, cps) = first;
    assert_eq!(ast.lines().count(), 5);
    assert!(ast.starts_with("Definition(Term(Variable(u_count)), Application(Term(Integer(0))))\n"));
    assert!(ir.lines().last().is_some_and(|line| line.starts_with("Lastval(c_ir_")));
    assert!(cps.contains("u_count*"));
}

#[test]
fn test_long_program_compiles() {
    let mut source = String::from("x = 0\n");
    for _ in 0..20_000 {
        source.push_str("x := x add. 1\n");
    }
    source.push_str("println(x)\n");
    let c = compile_ok(&source);
    assert!(c.contains("\nf_20000: ;\n"));
    assert!(!c.contains("\nf_20001: ;\n"));
}
