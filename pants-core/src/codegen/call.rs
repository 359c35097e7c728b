use super::emitter::emit;
use super::{CodeGen, VariableContext, byte_array};
use crate::cps::Call;
use crate::error::Result;
use crate::name::{self, Name};
use crate::runtime::{MIN_LEFT_ARG_HIGHWATER, MIN_RIGHT_ARG_HIGHWATER};

impl CodeGen {
    /// Marshal a call's arguments and jump to the callee.
    ///
    /// The continuation closure is built first, then the keyword table, the
    /// right buffer and the left buffer, in that order.
    pub(super) fn write_call(&mut self, call: &Call, ctx: &VariableContext) -> Result<()> {
        match &call.continuation {
            Some(continuation) => {
                let value = self.write_closure(continuation, ctx)?;
                emit!(self.out, "continuation = {};", value);
            }
            None => self.out.line("continuation.t = NIL;"),
        }

        self.out.line("initialize_object(&keyword_args);");
        if let Some(keyword) = &call.right_keyword {
            emit!(self.out, "dest = {};", ctx.val_access(keyword));
            self.throw_unless(ctx, "dest.t == OBJECT", "\"keyword argument is not an object!\"");
            self.out.line("for(i = 0; i < dest.object.data->size; i++) {");
            self.out.indent();
            self.out.line(
                "set_field(&keyword_args, dest.object.data->entries[i].key, dest.object.data->entries[i].value);",
            );
            self.out.dedent();
            self.out.line("}");
        }
        // Later keys overwrite earlier ones.
        for opt in &call.right_optional {
            emit!(
                self.out,
                "set_field(&keyword_args, {}, {});",
                byte_array(opt.name.c_name().as_bytes()),
                ctx.val_access(&opt.value)
            );
        }

        self.write_right_buffer(&call.right_positional, call.right_arbitrary.as_ref(), ctx);
        self.write_left_buffer(&call.left_positional, call.left_arbitrary.as_ref(), ctx);

        emit!(self.out, "dynamic_vars = {};", ctx.val_access(&name::dynamic_vars()));
        emit!(self.out, "dest = {};", ctx.val_access(&call.callable));
        self.throw_unless(ctx, "dest.t == CLOSURE", "\"cannot call a non-function!\"");
        self.out.line("CALL_FUNC(dest);");
        Ok(())
    }

    /// Check `array` holds an array and leave its storage in `raw_array`.
    fn write_splat(&mut self, array: &Name, ctx: &VariableContext) {
        emit!(self.out, "dest = {};", ctx.val_access(array));
        self.throw_unless(ctx, "array_of(dest, &raw_array)", "\"arbitrary argument is not an array!\"");
    }

    fn write_right_buffer(&mut self, positional: &[Name], arbitrary: Option<&Name>, ctx: &VariableContext) {
        let count = positional.len();
        match arbitrary {
            Some(array) => {
                self.write_splat(array, ctx);
                emit!(self.out, "reserve_space(&right_positional_args, {} + raw_array->size);", count);
                emit!(self.out, "right_positional_args.size = {} + raw_array->size;", count);
            }
            None => {
                if count > MIN_RIGHT_ARG_HIGHWATER {
                    emit!(self.out, "reserve_space(&right_positional_args, {});", count);
                }
                emit!(self.out, "right_positional_args.size = {};", count);
            }
        }
        for (i, arg) in positional.iter().enumerate() {
            emit!(self.out, "right_positional_args.data[{}] = {};", i, ctx.val_access(arg));
        }
        if arbitrary.is_some() {
            self.out.line("for(i = 0; i < raw_array->size; i++) {");
            self.out.indent();
            emit!(self.out, "right_positional_args.data[{} + i] = raw_array->data[i];", count);
            self.out.dedent();
            self.out.line("}");
        }
    }

    /// Left arguments go in nearest-first, so the buffer is filled in
    /// reverse source order and a splatted array lands past them.
    fn write_left_buffer(&mut self, positional: &[Name], arbitrary: Option<&Name>, ctx: &VariableContext) {
        let count = positional.len();
        match arbitrary {
            Some(array) => {
                self.write_splat(array, ctx);
                emit!(self.out, "reserve_space(&left_positional_args, {} + raw_array->size);", count);
                emit!(self.out, "left_positional_args.size = {} + raw_array->size;", count);
            }
            None => {
                if count > MIN_LEFT_ARG_HIGHWATER {
                    emit!(self.out, "reserve_space(&left_positional_args, {});", count);
                }
                emit!(self.out, "left_positional_args.size = {};", count);
            }
        }
        for (i, arg) in positional.iter().enumerate() {
            emit!(
                self.out,
                "left_positional_args.data[{}] = {};",
                count - i - 1,
                ctx.val_access(arg)
            );
        }
        if arbitrary.is_some() {
            self.out.line("for(i = 0; i < raw_array->size; i++) {");
            self.out.indent();
            self.out
                .line("left_positional_args.data[left_positional_args.size - i - 1] = raw_array->data[i];");
            self.out.dedent();
            self.out.line("}");
        }
    }
}
