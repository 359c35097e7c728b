//! Lowering pass: AST -> IR
//!
//! Every intermediate value gets a fresh compiler name, applications become
//! explicit calls, and the surface forms (arrays, dictionaries, indexing,
//! sub-expressions) are rewritten into calls on the runtime's constructor and
//! accessor entry points.

use std::collections::BTreeSet;

use log::debug;

use crate::ast::{self, Span, Trailer};
use crate::error::Result;
use crate::ir::{self, Call, NamedArgument};
use crate::name::{self, Name};
use crate::{CompileContext, bail_lower_at, bail_naming_at};

/// Lower a parsed program into IR.
pub fn lower_program(program: &ast::Program, ctx: &mut CompileContext) -> Result<ir::Program> {
    let mut lowerer = Lowerer::new(ctx);
    lowerer.lower_expressions(&program.expressions)?;
    let (expressions, lastval) = lowerer.finish();
    debug!("lowered {} top-level statements", expressions.len());
    Ok(ir::Program { expressions, lastval })
}

/// Lowers one scope. Nested functions and sub-expressions get their own
/// `Lowerer` sharing the compilation context.
struct Lowerer<'a> {
    ctx: &'a mut CompileContext,
    out: Vec<ir::Expression>,
    /// Name holding the value of the most recently lowered construct.
    lastval: Name,
}

impl<'a> Lowerer<'a> {
    fn new(ctx: &'a mut CompileContext) -> Self {
        Lowerer {
            ctx,
            out: Vec::new(),
            lastval: name::null_value(),
        }
    }

    fn finish(self) -> (Vec<ir::Expression>, Name) {
        (self.out, self.lastval)
    }

    fn emit(&mut self, expression: ir::Expression) {
        self.out.push(expression);
    }

    /// Bind `value` to a fresh local name and make it the last value.
    fn assign(&mut self, value: ir::Value) -> Name {
        let assignee = self.ctx.gensym();
        self.emit(ir::Expression::Assignment(ir::Assignment {
            assignee: assignee.clone(),
            value,
            local: true,
        }));
        self.lastval = assignee.clone();
        assignee
    }

    /// Emit a call whose result lands in a fresh name, the new last value.
    fn call(&mut self, term: Call) -> Name {
        let assignee = self.ctx.gensym();
        self.emit(ir::Expression::ReturnValue(ir::ReturnValue {
            assignee: assignee.clone(),
            term,
        }));
        self.lastval = assignee.clone();
        assignee
    }

    fn lower_expressions(&mut self, expressions: &[ast::Expression]) -> Result<()> {
        for expression in expressions {
            self.lower_expression(expression)?;
        }
        Ok(())
    }

    fn lower_expression(&mut self, expression: &ast::Expression) -> Result<()> {
        match expression {
            ast::Expression::Application(app) => self.lower_application(app),
            ast::Expression::Definition(assignment) => self.lower_assignment(assignment, true),
            ast::Expression::Mutation(assignment) => self.lower_assignment(assignment, false),
        }
    }

    fn lower_application(&mut self, app: &ast::Application) -> Result<()> {
        let terms = app.terms.as_slice();
        match terms {
            [] => bail_lower_at!(app.span, "application has 0 terms"),
            [term] => self.lower_term(term, &term.trailers),
            _ => {
                let open_calls: Vec<usize> = terms
                    .iter()
                    .enumerate()
                    .filter(|(_, term)| matches!(term.trailers.last(), Some(Trailer::OpenCall)))
                    .map(|(i, _)| i)
                    .collect();
                if open_calls.len() > 1 {
                    bail_lower_at!(app.span, "application has more than 1 open calls");
                }

                // Without an open call the first term is the callable.
                let (index, trailers) = match open_calls.first() {
                    Some(&i) => {
                        let trailers = &terms[i].trailers;
                        (i, &trailers[..trailers.len() - 1])
                    }
                    None => (0, terms[0].trailers.as_slice()),
                };

                let mut call = Call::new(name::null_value());
                for term in &terms[..index] {
                    self.lower_term(term, &term.trailers)?;
                    call.left_positional.push(self.lastval.clone());
                }
                self.lower_term(&terms[index], trailers)?;
                call.callable = self.lastval.clone();
                for term in &terms[index + 1..] {
                    self.lower_term(term, &term.trailers)?;
                    call.right_positional.push(self.lastval.clone());
                }
                self.call(call);
                Ok(())
            }
        }
    }

    /// Lower a term's value followed by the given trailers, which may be a
    /// prefix of the term's own trailers.
    fn lower_term(&mut self, term: &ast::Term, trailers: &[Trailer]) -> Result<()> {
        self.lower_value(&term.value, term.span)?;
        for trailer in trailers {
            self.lower_trailer(trailer)?;
        }
        Ok(())
    }

    fn lower_value(&mut self, value: &ast::Value, span: Span) -> Result<()> {
        match value {
            ast::Value::Variable(var) => self.lastval = Name::from(var),
            ast::Value::Integer(n) => {
                self.assign(ir::Value::Integer(*n));
            }
            ast::Value::Float(x) => {
                self.assign(ir::Value::Float(*x));
            }
            ast::Value::CharString(s) => {
                self.assign(ir::Value::CharString(s.clone()));
            }
            ast::Value::ByteString(b) => {
                self.assign(ir::Value::ByteString(b.clone()));
            }
            ast::Value::SubExpression(expressions) => {
                self.lower_sub_expression(expressions)?;
            }
            ast::Value::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    self.lower_application(element)?;
                    values.push(self.lastval.clone());
                }
                self.call(Call::with_right(name::array_constructor(), values));
            }
            ast::Value::Dictionary(entries) => {
                let dict = self.call(Call::new(name::dict_constructor()));
                for entry in entries {
                    self.lower_application(&entry.key)?;
                    let key = self.lastval.clone();
                    self.lower_application(&entry.value)?;
                    let value = self.lastval.clone();
                    let update = self.assign(ir::Value::Field {
                        object: dict.clone(),
                        field: name::update_field(),
                    });
                    self.call(Call::with_right(update, vec![key, value]));
                }
                self.lastval = dict;
            }
            ast::Value::Function(function) => self.lower_function(function, span)?,
        }
        Ok(())
    }

    fn lower_trailer(&mut self, trailer: &Trailer) -> Result<()> {
        match trailer {
            // An open call that did not end an application has no arguments.
            Trailer::OpenCall => {
                self.call(Call::new(self.lastval.clone()));
            }
            Trailer::ClosedCall(call) => self.lower_closed_call(call)?,
            Trailer::Field(field) => {
                self.assign(ir::Value::Field {
                    object: self.lastval.clone(),
                    field: Name::from(field),
                });
            }
            Trailer::Index(expressions) => {
                let array = self.lastval.clone();
                let index = self.lower_sub_expression(expressions)?;
                let lookup = self.assign(ir::Value::Field {
                    object: array,
                    field: name::lookup_field(),
                });
                self.call(Call::with_right(lookup, vec![index]));
            }
        }
        Ok(())
    }

    fn lower_closed_call(&mut self, closed: &ast::ClosedCall) -> Result<()> {
        let mut call = Call::new(self.lastval.clone());
        if let Some(app) = &closed.left_arbitrary {
            self.lower_application(app)?;
            call.left_arbitrary = Some(self.lastval.clone());
        }
        for app in &closed.left_required {
            self.lower_application(app)?;
            call.left_positional.push(self.lastval.clone());
        }
        for app in &closed.right_required {
            self.lower_application(app)?;
            call.right_positional.push(self.lastval.clone());
        }
        for opt in &closed.right_optional {
            self.lower_application(&opt.value)?;
            call.right_optional.push(NamedArgument {
                name: Name::from(&opt.name),
                value: self.lastval.clone(),
            });
        }
        if let Some(app) = &closed.right_arbitrary {
            self.lower_application(app)?;
            call.right_arbitrary = Some(self.lastval.clone());
        }
        if let Some(app) = &closed.right_keyword {
            self.lower_application(app)?;
            call.right_keyword = Some(self.lastval.clone());
        }
        self.call(call);
        Ok(())
    }

    /// Lower `expressions` in a fresh scope as an argumentless function and
    /// call it immediately. Returns the name holding the result.
    fn lower_sub_expression(&mut self, expressions: &[ast::Expression]) -> Result<Name> {
        let mut inner = Lowerer::new(&mut *self.ctx);
        inner.lower_expressions(expressions)?;
        let (body, lastval) = inner.finish();
        let function = self.assign(ir::Value::Function(Box::new(ir::Function::nullary(body, lastval))));
        Ok(self.call(Call::new(function)))
    }

    fn lower_function(&mut self, function: &ast::Function, span: Span) -> Result<()> {
        let mut seen = BTreeSet::new();
        for var in function.argument_variables() {
            if !seen.insert(Name::from(var)) {
                bail_naming_at!(span, "non-unique argument name: {}", var.name);
            }
        }

        let mut lowered = ir::Function::nullary(Vec::new(), name::null_value());
        lowered.left_positional = function.left_required.iter().map(Name::from).collect();
        lowered.left_optional = self.lower_defaults(&function.left_optional)?;
        lowered.left_arbitrary = function.left_arbitrary.as_ref().map(Name::from);
        lowered.right_positional = function.right_required.iter().map(Name::from).collect();
        lowered.right_optional = self.lower_defaults(&function.right_optional)?;
        lowered.right_arbitrary = function.right_arbitrary.as_ref().map(Name::from);
        lowered.right_keyword = function.right_keyword.as_ref().map(Name::from);

        let mut body = Lowerer::new(&mut *self.ctx);
        body.emit(ir::Expression::Assignment(ir::Assignment {
            assignee: name::return_name(),
            value: ir::Value::Variable(name::continuation()),
            local: true,
        }));
        body.lower_expressions(&function.expressions)?;
        let (expressions, lastval) = body.finish();
        lowered.expressions = expressions;
        lowered.lastval = lastval;

        self.assign(ir::Value::Function(Box::new(lowered)));
        Ok(())
    }

    /// Default values are evaluated in the defining scope.
    fn lower_defaults(&mut self, optionals: &[ast::OptionalArgument]) -> Result<Vec<NamedArgument>> {
        let mut lowered = Vec::with_capacity(optionals.len());
        for opt in optionals {
            self.lower_application(&opt.value)?;
            lowered.push(NamedArgument {
                name: Name::from(&opt.name),
                value: self.lastval.clone(),
            });
        }
        Ok(lowered)
    }

    fn lower_assignment(&mut self, assignment: &ast::Assignment, definition: bool) -> Result<()> {
        let target = &assignment.assignee;
        match (target.trailers.split_last(), &target.value) {
            (None, ast::Value::Variable(var)) => {
                let var = Name::from(var);
                if definition {
                    self.emit(ir::Expression::Assignment(ir::Assignment {
                        assignee: var.clone(),
                        value: ir::Value::Variable(name::null_value()),
                        local: true,
                    }));
                }
                self.lower_application(&assignment.value)?;
                let rhs = self.lastval.clone();
                self.emit(ir::Expression::Assignment(ir::Assignment {
                    assignee: var,
                    value: ir::Value::Variable(rhs),
                    local: false,
                }));
            }
            (Some((Trailer::Field(field), rest)), _) => {
                self.lower_application(&assignment.value)?;
                let rhs = self.lastval.clone();
                self.lower_term(target, rest)?;
                self.emit(ir::Expression::ObjectMutation(ir::ObjectMutation {
                    object: self.lastval.clone(),
                    field: Name::from(field),
                    value: rhs.clone(),
                }));
                self.lastval = rhs;
            }
            (Some((Trailer::Index(expressions), rest)), _) => {
                self.lower_application(&assignment.value)?;
                let rhs = self.lastval.clone();
                self.lower_term(target, rest)?;
                let object = self.lastval.clone();
                let index = self.lower_sub_expression(expressions)?;
                let update = self.assign(ir::Value::Field {
                    object,
                    field: name::update_field(),
                });
                self.call(Call::with_right(update, vec![index, rhs.clone()]));
                self.lastval = rhs;
            }
            _ => bail_lower_at!(
                target.span,
                "left-hand side of an assignment must be a variable, field, or index"
            ),
        }
        Ok(())
    }
}
