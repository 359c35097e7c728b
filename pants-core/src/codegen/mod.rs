//! Code generation: CPS -> C.
//!
//! The whole program becomes the body of one C `main`. Every callable is a
//! label; a closure stores the callable's entry number together with the
//! environment and frame records it runs with, and `CALL_FUNC` jumps through
//! a single dispatch `switch` on that number. Arguments travel in the two
//! runtime argument buffers and the keyword table, see `entry` and `call`.

mod call;
mod context;
mod emitter;
mod entry;
pub mod namesets;

use std::collections::BTreeSet;

use log::debug;

pub use context::VariableContext;
pub use namesets::{NameSet, NameSetId, NameSetManager};

use crate::cps::{self, Callable, CallableId, Expression, Value};
use crate::error::Result;
use crate::name::{self, Name};
use emitter::{Emitter, emit};

/// Argument slots per side. The slot mask is one 64-bit word per side.
pub const MAX_ARGUMENT_SLOTS: usize = 64;

/// Generated pieces of one program, ready for assembly.
#[derive(Debug)]
pub struct GeneratedCode {
    pub namesets: NameSetManager,
    /// Top-level code, run straight after the start block.
    pub root: String,
    /// One block per true function, each starting at its label.
    pub functions: Vec<String>,
    pub dispatch: String,
}

/// Generate code for a converted program whose free names are all in
/// `provided`. A provided name marked `mutated` is boxed before the program
/// starts.
pub fn generate(program: &cps::Program, provided: &BTreeSet<Name>) -> Result<GeneratedCode> {
    let mut callables = Vec::new();
    program.root.callables(&mut callables);

    // The globals record doubles as the top level's frame and must get id 0.
    let mut namesets = NameSetManager::new();
    let mut globals = provided.clone();
    program.root.collect_frame_names(&mut globals);
    globals.extend(program.root.free_names());
    let globals_id = namesets.get_or_assign_id(&globals);

    let mut cg = CodeGen {
        namesets,
        out: Emitter::new(),
    };
    cg.out.indent();

    let mut root_ctx = VariableContext::new(globals_id, globals_id, provided.clone(), globals);
    for global in provided.iter().filter(|name| name.mutated) {
        let slot = root_ctx.var_access(global);
        emit!(cg.out, "{} = make_cell({});", slot, slot);
    }
    cg.write_expression(&program.root, &mut root_ctx)?;
    let root = cg.out.take();

    let mut functions = Vec::new();
    for callable in callables.iter().filter(|c| c.function) {
        let free_id = cg.namesets.get_or_assign_id(&callable.free_names());
        let frame = callable.frame_names();
        let frame_id = cg.namesets.get_or_assign_id(&frame);
        debug!("generating {} with env {} and frame {}", callable.id, free_id, frame_id);

        let mut ctx = VariableContext::new(free_id, frame_id, BTreeSet::new(), frame);
        cg.write_callable(callable, &mut ctx)?;
        functions.push(cg.out.take());
    }

    let dispatch = write_dispatch(callables.iter().map(|c| c.id));
    debug!(
        "generated {} functions, {} callables, {} name sets",
        functions.len(),
        callables.len(),
        cg.namesets.len()
    );
    Ok(GeneratedCode {
        namesets: cg.namesets,
        root,
        functions,
        dispatch,
    })
}

/// The trampoline: builtin entries from the runtime, then one case per
/// callable.
pub fn write_dispatch(ids: impl IntoIterator<Item = CallableId>) -> String {
    let mut out = Emitter::new();
    out.label("dispatch");
    out.indent();
    out.line("switch(target) {");
    out.indent();
    out.line("BUILTIN_DISPATCH");
    for id in ids {
        emit!(out, "case FIRST_CALLABLE_ENTRY + {}: goto {};", id.0, id);
    }
    out.dedent();
    out.line("}");
    out.take()
}

struct CodeGen {
    namesets: NameSetManager,
    out: Emitter,
}

impl CodeGen {
    fn write_callable(&mut self, callable: &Callable, ctx: &mut VariableContext) -> Result<()> {
        self.write_entry(callable, ctx)?;
        self.write_expression(&callable.body, ctx)
    }

    /// Walk the chain of expressions. Continuations are written inline right
    /// after the call that receives them.
    fn write_expression(&mut self, mut expression: &Expression, ctx: &mut VariableContext) -> Result<()> {
        loop {
            match expression {
                Expression::Call(call) => {
                    self.write_call(call, ctx)?;
                    match &call.continuation {
                        Some(continuation) => {
                            self.write_entry(continuation, ctx)?;
                            expression = &continuation.body;
                        }
                        None => return Ok(()),
                    }
                }
                Expression::Assignment(assignment) => {
                    let value = self.write_value(&assignment.value, ctx)?;
                    let assignee = &assignment.assignee;
                    // A definition always starts a fresh cell, even over a
                    // name the frame already holds.
                    if assignment.local {
                        ctx.define(assignee);
                        emit!(self.out, "{} = {};", ctx.var_access(assignee), boxed(assignee, &value));
                    } else {
                        emit!(self.out, "{} = {};", ctx.val_access(assignee), value);
                    }
                    expression = &assignment.next;
                }
                Expression::ObjectMutation(mutation) => {
                    emit!(self.out, "dest = {};", ctx.val_access(&mutation.object));
                    self.throw_unless(ctx, "dest.t == OBJECT", "\"not an object!\"");
                    self.throw_unless(
                        ctx,
                        &format!(
                            "set_field(dest.object.data, {}, {})",
                            field_key(&mutation.field),
                            ctx.val_access(&mutation.value)
                        ),
                        "\"object sealed!\"",
                    );
                    expression = &mutation.next;
                }
            }
        }
    }

    /// Write whatever `value` needs and return a C expression for it.
    fn write_value(&mut self, value: &Value, ctx: &VariableContext) -> Result<String> {
        Ok(match value {
            Value::Variable(name) => ctx.val_access(name),
            Value::Field { object, field } => {
                emit!(self.out, "dest = {};", ctx.val_access(object));
                self.throw_unless(ctx, "dest.t == OBJECT", "\"not an object!\"");
                self.throw_unless(
                    ctx,
                    &format!("get_field(dest.object.data, {}, &dest)", field_key(field)),
                    &format!("\"field %s not found!\", \"{}\"", field.c_name()),
                );
                "dest".to_string()
            }
            Value::Integer(n) => format!("(union Value){{.integer = {{INTEGER, {}}}}}", integer_literal(*n)),
            Value::Float(x) => format!("(union Value){{.floating = {{FLOAT, {}}}}}", float_literal(*x)),
            Value::String { bytes, byte_oriented } => {
                self.out.line("dest.t = STRING;");
                emit!(self.out, "dest.string.byte_oriented = {};", byte_oriented);
                emit!(self.out, "dest.string.value = {};", byte_array(bytes));
                "dest".to_string()
            }
            Value::Callable(callable) => self.write_closure(callable, ctx)?,
        })
    }

    /// Build a closure for `callable` in `dest`. Functions get a fresh
    /// environment holding copies of their free names; continuations share
    /// the current environment and frame.
    fn write_closure(&mut self, callable: &Callable, ctx: &VariableContext) -> Result<String> {
        self.out.line("dest.t = CLOSURE;");
        emit!(self.out, "dest.closure.func = FIRST_CALLABLE_ENTRY + {};", callable.id.0);
        if callable.function {
            let free = callable.free_names();
            let free_id = self.namesets.get_or_assign_id(&free);
            self.out.line("dest.closure.frame = NULL;");
            emit!(self.out, "dest.closure.env = GC_MALLOC(sizeof(struct {}));", free_id);
            for name in &free {
                emit!(
                    self.out,
                    "((struct {}*)dest.closure.env)->{} = {};",
                    free_id,
                    name.c_name(),
                    ctx.var_access(name)
                );
            }
        } else {
            self.out.line("dest.closure.env = env;");
            self.out.line("dest.closure.frame = frame;");
        }
        Ok("dest".to_string())
    }

    /// `if(!(cond)) { THROW_ERROR(scope, make_c_string(args)); }`, raised in
    /// the dynamic scope the surrounding code runs in.
    fn throw_unless(&mut self, ctx: &VariableContext, condition: &str, message_args: &str) {
        emit!(self.out, "if(!({})) {{", condition);
        self.out.indent();
        emit!(
            self.out,
            "THROW_ERROR({}, make_c_string({}));",
            ctx.val_access(&name::dynamic_vars()),
            message_args
        );
        self.out.dedent();
        self.out.line("}");
    }
}

/// Store `value` into a slot for `name`, boxing it first when needed.
fn boxed(name: &Name, value: &str) -> String {
    if name.mutated { format!("make_cell({})", value) } else { value.to_string() }
}

/// Object keys are mangled names.
fn field_key(field: &Name) -> String {
    byte_array(field.c_name().as_bytes())
}

/// A `struct ByteArray` compound literal.
pub(crate) fn byte_array(bytes: &[u8]) -> String {
    format!("(struct ByteArray){{{}, {}}}", c_string_literal(bytes), bytes.len())
}

/// A C string literal with every byte hex-escaped.
pub(crate) fn c_string_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 2);
    out.push('"');
    for byte in bytes {
        out.push_str(&format!("\\x{:02x}", byte));
    }
    out.push('"');
    out
}

fn integer_literal(n: i64) -> String {
    if n == i64::MIN {
        // The literal 9223372036854775808 does not fit a long long.
        format!("({}LL - 1)", n + 1)
    } else {
        format!("{}LL", n)
    }
}

fn float_literal(x: f64) -> String {
    if x.is_nan() {
        "NAN".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "HUGE_VAL".to_string() } else { "-HUGE_VAL".to_string() }
    } else {
        format!("{:?}", x)
    }
}
