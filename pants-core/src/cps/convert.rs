use log::debug;

use super::{Assignment, Call, Callable, Expression, ObjectMutation, Program, Value};
use crate::error::Result;
use crate::ir;
use crate::name::{self, Name};
use crate::CompileContext;

/// Convert a lowered program into continuation-passing form. The top level
/// ends by passing its last value to the runtime's exit continuation.
pub fn convert_program(program: &ir::Program, ctx: &mut CompileContext) -> Result<Program> {
    let root = convert_body(&program.expressions, &program.lastval, ctx)?;
    debug!("converted program into CPS with {} callables", ctx.callable_count());
    Ok(Program { root })
}

/// Fold a statement list from the end: the innermost expression returns
/// `lastval` to the current continuation, and every statement wraps what
/// follows it.
fn convert_body(expressions: &[ir::Expression], lastval: &Name, ctx: &mut CompileContext) -> Result<Expression> {
    let mut next = Expression::Call(Call {
        callable: name::continuation(),
        left_positional: Vec::new(),
        left_arbitrary: None,
        right_positional: vec![lastval.clone()],
        right_optional: Vec::new(),
        right_arbitrary: None,
        right_keyword: None,
        continuation: None,
    });

    for expression in expressions.iter().rev() {
        next = match expression {
            ir::Expression::Assignment(assignment) => Expression::Assignment(Assignment {
                assignee: assignment.assignee.clone(),
                value: convert_value(&assignment.value, ctx)?,
                local: assignment.local,
                next: Box::new(next),
            }),
            ir::Expression::ObjectMutation(mutation) => Expression::ObjectMutation(ObjectMutation {
                object: mutation.object.clone(),
                field: mutation.field.clone(),
                value: mutation.value.clone(),
                next: Box::new(next),
            }),
            ir::Expression::ReturnValue(ret) => {
                let continuation = Callable::continuation(ctx.next_callable_id(), ret.assignee.clone(), next);
                Expression::Call(convert_call(&ret.term, continuation))
            }
        };
    }
    Ok(next)
}

fn convert_call(call: &ir::Call, continuation: Callable) -> Call {
    Call {
        callable: call.callable.clone(),
        left_positional: call.left_positional.clone(),
        left_arbitrary: call.left_arbitrary.clone(),
        right_positional: call.right_positional.clone(),
        right_optional: call.right_optional.clone(),
        right_arbitrary: call.right_arbitrary.clone(),
        right_keyword: call.right_keyword.clone(),
        continuation: Some(Box::new(continuation)),
    }
}

fn convert_value(value: &ir::Value, ctx: &mut CompileContext) -> Result<Value> {
    Ok(match value {
        ir::Value::Field { object, field } => Value::Field {
            object: object.clone(),
            field: field.clone(),
        },
        ir::Value::Variable(name) => Value::Variable(name.clone()),
        ir::Value::Integer(n) => Value::Integer(*n),
        ir::Value::Float(x) => Value::Float(*x),
        ir::Value::CharString(s) => Value::String {
            bytes: s.as_bytes().to_vec(),
            byte_oriented: false,
        },
        ir::Value::ByteString(bytes) => Value::String {
            bytes: bytes.clone(),
            byte_oriented: true,
        },
        ir::Value::Function(function) => Value::Callable(Box::new(convert_function(function, ctx)?)),
    })
}

fn convert_function(function: &ir::Function, ctx: &mut CompileContext) -> Result<Callable> {
    let id = ctx.next_callable_id();
    let body = convert_body(&function.expressions, &function.lastval, ctx)?;
    let callable = Callable {
        id,
        function: true,
        left_positional: function.left_positional.clone(),
        left_optional: function.left_optional.clone(),
        left_arbitrary: function.left_arbitrary.clone(),
        right_positional: function.right_positional.clone(),
        right_optional: function.right_optional.clone(),
        right_arbitrary: function.right_arbitrary.clone(),
        right_keyword: function.right_keyword.clone(),
        body,
    };
    callable.check_unique_arguments()?;
    Ok(callable)
}
