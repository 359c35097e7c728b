use super::*;
use crate::error::CompilerError;
use crate::lexer::tokenize;

/// Helper function that expects parsing to fail with a specific error.
/// If parsing succeeds when it shouldn't, outputs the parsed AST.
fn expect_parse_error<F>(input: &str, error_check: F)
where
    F: FnOnce(&CompilerError) -> std::result::Result<(), String>,
{
    let tokens = tokenize(input).expect("Failed to tokenize input");
    match Parser::new(tokens).parse() {
        Ok(program) => {
            println!("Parsed AST: {:#?}", program);
            panic!("Expected parse to fail, but it succeeded");
        }
        Err(ref error) => {
            if let Err(msg) = error_check(error) {
                println!("Actual error: {:?}", error);
                panic!("Error assertion failed: {}", msg);
            }
        }
    }
}

fn is_parse_error(error: &CompilerError) -> std::result::Result<(), String> {
    match error {
        CompilerError::ParseError(..) => Ok(()),
        other => Err(format!("expected a parse error, got {:?}", other)),
    }
}

/// Parse input and return the Program, panicking on failure
fn parse_ok(input: &str) -> Program {
    let tokens = tokenize(input).expect("tokenize failed");
    Parser::new(tokens).parse().unwrap_or_else(|e| panic!("parse failed: {:?}", e))
}

fn single_expression(input: &str) -> Expression {
    let program = parse_ok(input);
    assert_eq!(program.expressions.len(), 1, "expected exactly one expression");
    program.expressions.into_iter().next().unwrap()
}

fn single_application(input: &str) -> Application {
    match single_expression(input) {
        Expression::Application(app) => app,
        other => panic!("expected an application, got {:?}", other),
    }
}

fn variable_name(term: &Term) -> &str {
    match &term.value {
        Value::Variable(var) => &var.name,
        other => panic!("expected a variable, got {:?}", other),
    }
}

#[test]
fn test_parse_closed_call() {
    let app = single_application("f(arg)");
    assert_eq!(app.terms.len(), 1);
    let term = &app.terms[0];
    assert_eq!(variable_name(term), "f");
    match term.trailers.as_slice() {
        [Trailer::ClosedCall(call)] => {
            assert!(call.left_required.is_empty());
            assert_eq!(call.right_required.len(), 1);
        }
        other => panic!("expected one closed call, got {:?}", other),
    }
}

#[test]
fn test_spaced_paren_is_a_separate_term() {
    let app = single_application("f (arg)");
    assert_eq!(app.terms.len(), 2);
    assert!(app.terms[0].trailers.is_empty());
    assert!(matches!(app.terms[1].value, Value::SubExpression(_)));
}

#[test]
fn test_parse_open_call() {
    let app = single_application("a b f. c");
    assert_eq!(app.terms.len(), 4);
    assert_eq!(variable_name(&app.terms[2]), "f");
    assert_eq!(app.terms[2].trailers, vec![Trailer::OpenCall]);
    assert!(app.terms[3].trailers.is_empty());
}

#[test]
fn test_definition_and_mutation() {
    assert!(matches!(single_expression("x = 1"), Expression::Definition(_)));
    assert!(matches!(single_expression("x := 1"), Expression::Mutation(_)));
}

#[test]
fn test_empty_braces_are_a_dictionary() {
    let app = single_application("{}");
    assert_eq!(app.terms[0].value, Value::Dictionary(Vec::new()));
}

#[test]
fn test_parse_dictionary_entries() {
    let app = single_application("{1: 2, \"k\": v,}");
    match &app.terms[0].value {
        Value::Dictionary(entries) => assert_eq!(entries.len(), 2),
        other => panic!("expected a dictionary, got {:?}", other),
    }
}

#[test]
fn test_brace_without_colon_is_a_function() {
    let app = single_application("{x; y}");
    match &app.terms[0].value {
        Value::Function(function) => {
            assert_eq!(function.expressions.len(), 2);
            assert_eq!(function.argument_variables().count(), 0);
        }
        other => panic!("expected a function, got {:?}", other),
    }
}

#[test]
fn test_function_sides() {
    let app = single_application("{|a, b; c, d: 1, :(rest), ::(kw)| c}");
    let Value::Function(function) = &app.terms[0].value else {
        panic!("expected a function");
    };
    let names = |vars: &[Variable]| vars.iter().map(|v| v.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&function.left_required), vec!["a", "b"]);
    assert_eq!(names(&function.right_required), vec!["c"]);
    assert_eq!(function.right_optional.len(), 1);
    assert_eq!(function.right_optional[0].name.name, "d");
    assert_eq!(function.right_arbitrary.as_ref().map(|v| v.name.as_str()), Some("rest"));
    assert_eq!(function.right_keyword.as_ref().map(|v| v.name.as_str()), Some("kw"));
}

#[test]
fn test_arguments_without_semicolon_are_right() {
    let app = single_application("{|a, b| a}");
    let Value::Function(function) = &app.terms[0].value else {
        panic!("expected a function");
    };
    assert!(function.left_required.is_empty());
    assert_eq!(function.right_required.len(), 2);
}

#[test]
fn test_field_and_index_trailers() {
    let app = single_application("x.field[i]");
    let trailers = &app.terms[0].trailers;
    assert_eq!(trailers.len(), 2);
    assert_eq!(trailers[0], Trailer::Field(Variable::user("field")));
    assert!(matches!(&trailers[1], Trailer::Index(index) if index.len() == 1));
}

#[test]
fn test_call_site_named_and_splat_arguments() {
    let app = single_application("f(:(pre); x, k: 2, :(xs), ::(opts))");
    let [Trailer::ClosedCall(call)] = app.terms[0].trailers.as_slice() else {
        panic!("expected one closed call");
    };
    assert!(call.left_arbitrary.is_some());
    assert_eq!(call.right_required.len(), 1);
    assert_eq!(call.right_optional[0].name.name, "k");
    assert!(call.right_arbitrary.is_some());
    assert!(call.right_keyword.is_some());
}

#[test]
fn test_newlines_separate_expressions() {
    let program = parse_ok("a\nb\n\nc");
    assert_eq!(program.expressions.len(), 3);
    // Inside brackets they are whitespace.
    let program = parse_ok("[1,\n 2\n]");
    assert_eq!(program.expressions.len(), 1);
}

#[test]
fn test_assignment_needs_single_term_target() {
    expect_parse_error("a b = 1", is_parse_error);
}

#[test]
fn test_unclosed_paren() {
    expect_parse_error("f(a, b", is_parse_error);
}

#[test]
fn test_named_argument_on_left_rejected() {
    expect_parse_error("f(k: 1; x)", is_parse_error);
}

#[test]
fn test_two_keyword_arguments_rejected() {
    expect_parse_error("{|::(a), ::(b)| a}", |error| {
        if error.message().contains("more than one keyword argument") {
            Ok(())
        } else {
            Err(format!("unexpected message {:?}", error.message()))
        }
    });
}

#[test]
fn test_optional_arguments_sit_farther_from_the_call() {
    let app = single_application("{|o: 1, p; a, b: 2| a}");
    let Value::Function(function) = &app.terms[0].value else {
        panic!("expected a function");
    };
    assert_eq!(function.left_optional[0].name.name, "o");
    assert_eq!(function.left_required[0].name, "p");
    assert_eq!(function.right_required[0].name, "a");
    assert_eq!(function.right_optional[0].name.name, "b");
}

#[test]
fn test_interleaved_argument_kinds_rejected() {
    expect_parse_error("{|p, a: 1; b| b}", |error| {
        if error.message() == "optional left argument a must come before the required ones" {
            Ok(())
        } else {
            Err(format!("unexpected message {:?}", error.message()))
        }
    });
    expect_parse_error("{|a: 1, b| b}", |error| {
        if error.message() == "required right argument b must come before the optional ones" {
            Ok(())
        } else {
            Err(format!("unexpected message {:?}", error.message()))
        }
    });
}
