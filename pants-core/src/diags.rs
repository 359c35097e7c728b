//! Debug formatting for the AST, IR and CPS forms.
//!
//! Nodes print as `Kind(child, child)`; names print with their provenance
//! prefix. Output depends only on the tree, so two runs over the same source
//! format identically.

use itertools::Itertools;

use crate::ast;
use crate::cps;
use crate::ir;
use crate::name::Name;

fn names(names: &[Name]) -> String {
    format!("[{}]", names.iter().join(", "))
}

fn optional(name: &Option<Name>) -> String {
    match name {
        Some(name) => name.to_string(),
        None => "-".to_string(),
    }
}

fn named(args: &[ir::NamedArgument]) -> String {
    format!("[{}]", args.iter().map(|a| format!("{}: {}", a.name, a.value)).join(", "))
}

// =============================================================================
// AST
// =============================================================================

/// One line per top-level expression.
pub fn format_ast(program: &ast::Program) -> String {
    let mut out = String::new();
    for expression in &program.expressions {
        out.push_str(&ast_expression(expression));
        out.push('\n');
    }
    out
}

fn ast_expression(expression: &ast::Expression) -> String {
    match expression {
        ast::Expression::Application(app) => ast_application(app),
        ast::Expression::Definition(assignment) => format!(
            "Definition({}, {})",
            ast_term(&assignment.assignee),
            ast_application(&assignment.value)
        ),
        ast::Expression::Mutation(assignment) => format!(
            "Mutation({}, {})",
            ast_term(&assignment.assignee),
            ast_application(&assignment.value)
        ),
    }
}

fn ast_application(app: &ast::Application) -> String {
    format!("Application({})", app.terms.iter().map(ast_term).join(", "))
}

fn ast_applications(apps: &[ast::Application]) -> String {
    format!("[{}]", apps.iter().map(ast_application).join(", "))
}

fn ast_term(term: &ast::Term) -> String {
    let trailers = term.trailers.iter().map(ast_trailer);
    format!("Term({})", std::iter::once(ast_value(&term.value)).chain(trailers).join(", "))
}

fn ast_variable(var: &ast::Variable) -> String {
    Name::from(var).to_string()
}

fn ast_optionals(args: &[ast::OptionalArgument]) -> String {
    let mut items = args
        .iter()
        .map(|opt| format!("{}: {}", ast_variable(&opt.name), ast_application(&opt.value)));
    format!("[{}]", items.join(", "))
}

fn ast_value(value: &ast::Value) -> String {
    match value {
        ast::Value::Variable(var) => format!("Variable({})", ast_variable(var)),
        ast::Value::Integer(n) => format!("Integer({})", n),
        ast::Value::Float(x) => format!("Float({:?})", x),
        ast::Value::CharString(s) => format!("CharString({:?})", s),
        ast::Value::ByteString(bytes) => format!("ByteString({:?})", String::from_utf8_lossy(bytes)),
        ast::Value::SubExpression(expressions) => {
            format!("SubExpression({})", expressions.iter().map(ast_expression).join(", "))
        }
        ast::Value::Array(apps) => format!("Array({})", ast_applications(apps)),
        ast::Value::Dictionary(entries) => {
            let mut items = entries
                .iter()
                .map(|e| format!("{}: {}", ast_application(&e.key), ast_application(&e.value)));
            format!("Dictionary([{}])", items.join(", "))
        }
        ast::Value::Function(function) => {
            let var_list = |vars: &[ast::Variable]| format!("[{}]", vars.iter().map(ast_variable).join(", "));
            let var_opt = |var: &Option<ast::Variable>| var.as_ref().map(ast_variable).unwrap_or_else(|| "-".into());
            let body = function.expressions.iter().map(ast_expression).join(", ");
            format!(
                "Function(left({}, {}, {}), right({}, {}, {}, {}), [{}])",
                var_list(&function.left_required),
                ast_optionals(&function.left_optional),
                var_opt(&function.left_arbitrary),
                var_list(&function.right_required),
                ast_optionals(&function.right_optional),
                var_opt(&function.right_arbitrary),
                var_opt(&function.right_keyword),
                body
            )
        }
    }
}

fn ast_trailer(trailer: &ast::Trailer) -> String {
    match trailer {
        ast::Trailer::OpenCall => "OpenCall".to_string(),
        ast::Trailer::Field(var) => format!("Field({})", ast_variable(var)),
        ast::Trailer::Index(expressions) => format!("Index({})", expressions.iter().map(ast_expression).join(", ")),
        ast::Trailer::ClosedCall(call) => {
            let app_opt = |app: &Option<ast::Application>| app.as_ref().map(ast_application).unwrap_or_else(|| "-".into());
            format!(
                "ClosedCall(left({}, {}), right({}, {}, {}, {}))",
                ast_applications(&call.left_required),
                app_opt(&call.left_arbitrary),
                ast_applications(&call.right_required),
                ast_optionals(&call.right_optional),
                app_opt(&call.right_arbitrary),
                app_opt(&call.right_keyword)
            )
        }
    }
}

// =============================================================================
// IR
// =============================================================================

pub fn format_ir(program: &ir::Program) -> String {
    let mut f = IrFormatter::default();
    for expression in &program.expressions {
        f.write_expression(expression);
    }
    f.write_line(&format!("Lastval({})", program.lastval));
    f.output
}

#[derive(Default)]
struct IrFormatter {
    output: String,
    indent: usize,
}

impl IrFormatter {
    fn write_line(&mut self, content: &str) {
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(content);
        self.output.push('\n');
    }

    fn write_expression(&mut self, expression: &ir::Expression) {
        match expression {
            ir::Expression::Assignment(assignment) => {
                let local = if assignment.local { "local" } else { "nonlocal" };
                match &assignment.value {
                    ir::Value::Function(function) => {
                        self.write_line(&format!(
                            "Assignment({}, {}, Function(left({}, {}, {}), right({}, {}, {}, {}))",
                            assignment.assignee,
                            local,
                            names(&function.left_positional),
                            named(&function.left_optional),
                            optional(&function.left_arbitrary),
                            names(&function.right_positional),
                            named(&function.right_optional),
                            optional(&function.right_arbitrary),
                            optional(&function.right_keyword),
                        ));
                        self.indent += 1;
                        for inner in &function.expressions {
                            self.write_expression(inner);
                        }
                        self.write_line(&format!("Lastval({})", function.lastval));
                        self.indent -= 1;
                        self.write_line("))");
                    }
                    value => {
                        let value = ir_value(value);
                        self.write_line(&format!("Assignment({}, {}, {})", assignment.assignee, local, value));
                    }
                }
            }
            ir::Expression::ObjectMutation(mutation) => {
                self.write_line(&format!(
                    "ObjectMutation({}, {}, {})",
                    mutation.object, mutation.field, mutation.value
                ));
            }
            ir::Expression::ReturnValue(ret) => {
                let call = &ret.term;
                self.write_line(&format!(
                    "ReturnValue({}, Call({}, left({}, {}), right({}, {}, {}, {})))",
                    ret.assignee,
                    call.callable,
                    names(&call.left_positional),
                    optional(&call.left_arbitrary),
                    names(&call.right_positional),
                    named(&call.right_optional),
                    optional(&call.right_arbitrary),
                    optional(&call.right_keyword),
                ));
            }
        }
    }
}

fn ir_value(value: &ir::Value) -> String {
    match value {
        ir::Value::Field { object, field } => format!("Field({}, {})", object, field),
        ir::Value::Variable(name) => format!("Variable({})", name),
        ir::Value::Integer(n) => format!("Integer({})", n),
        ir::Value::Float(x) => format!("Float({:?})", x),
        ir::Value::CharString(s) => format!("CharString({:?})", s),
        ir::Value::ByteString(bytes) => format!("ByteString({:?})", String::from_utf8_lossy(bytes)),
        ir::Value::Function(_) => "Function(..)".to_string(),
    }
}

// =============================================================================
// CPS
// =============================================================================

/// Continuations print at the level of the call that receives them; function
/// bodies are indented.
pub fn format_cps(program: &cps::Program) -> String {
    let mut f = CpsFormatter::default();
    f.write_expression(&program.root);
    f.output
}

#[derive(Default)]
struct CpsFormatter {
    output: String,
    indent: usize,
}

impl CpsFormatter {
    fn write_line(&mut self, content: &str) {
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(content);
        self.output.push('\n');
    }

    fn write_expression(&mut self, mut expression: &cps::Expression) {
        loop {
            match expression {
                cps::Expression::Call(call) => {
                    self.write_line(&format!(
                        "Call({}, left({}, {}), right({}, {}, {}, {}))",
                        call.callable,
                        names(&call.left_positional),
                        optional(&call.left_arbitrary),
                        names(&call.right_positional),
                        named(&call.right_optional),
                        optional(&call.right_arbitrary),
                        optional(&call.right_keyword),
                    ));
                    match &call.continuation {
                        Some(continuation) => {
                            self.write_line(&format!(
                                "{}: Continuation({})",
                                continuation.id,
                                names(&continuation.right_positional)
                            ));
                            expression = &continuation.body;
                        }
                        None => return,
                    }
                }
                cps::Expression::Assignment(assignment) => {
                    let local = if assignment.local { "local" } else { "nonlocal" };
                    match &assignment.value {
                        cps::Value::Callable(callable) => {
                            self.write_line(&format!(
                                "Assignment({}, {}, {}: Function(left({}, {}, {}), right({}, {}, {}, {}))",
                                cps_name(&assignment.assignee),
                                local,
                                callable.id,
                                names(&callable.left_positional),
                                named(&callable.left_optional),
                                optional(&callable.left_arbitrary),
                                names(&callable.right_positional),
                                named(&callable.right_optional),
                                optional(&callable.right_arbitrary),
                                optional(&callable.right_keyword),
                            ));
                            self.indent += 1;
                            self.write_expression(&callable.body);
                            self.indent -= 1;
                            self.write_line("))");
                        }
                        value => {
                            let value = cps_value(value);
                            self.write_line(&format!(
                                "Assignment({}, {}, {})",
                                cps_name(&assignment.assignee),
                                local,
                                value
                            ));
                        }
                    }
                    expression = &assignment.next;
                }
                cps::Expression::ObjectMutation(mutation) => {
                    self.write_line(&format!(
                        "ObjectMutation({}, {}, {})",
                        cps_name(&mutation.object),
                        mutation.field,
                        cps_name(&mutation.value)
                    ));
                    expression = &mutation.next;
                }
            }
        }
    }
}

/// Boxed names are marked with a trailing `*`.
fn cps_name(name: &Name) -> String {
    if name.mutated { format!("{}*", name) } else { name.to_string() }
}

fn cps_value(value: &cps::Value) -> String {
    match value {
        cps::Value::Field { object, field } => format!("Field({}, {})", cps_name(object), field),
        cps::Value::Variable(name) => format!("Variable({})", cps_name(name)),
        cps::Value::Integer(n) => format!("Integer({})", n),
        cps::Value::Float(x) => format!("Float({:?})", x),
        cps::Value::String { bytes, byte_oriented } => {
            let kind = if *byte_oriented { "ByteString" } else { "String" };
            format!("{}({:?})", kind, String::from_utf8_lossy(bytes))
        }
        cps::Value::Callable(callable) => format!("Callable({})", callable.id),
    }
}
