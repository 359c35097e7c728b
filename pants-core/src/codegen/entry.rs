//! Callable entry: unpack the argument buffers into the frame.
//!
//! Right arguments are numbered in declaration order. Left arguments are
//! pushed nearest-first by the caller, so they are numbered in reverse: the
//! last declared left argument reads slot 0. Optional arguments follow the
//! positional ones on their side.

use std::collections::BTreeSet;

use super::emitter::{Emitter, emit};
use super::{CodeGen, MAX_ARGUMENT_SLOTS, VariableContext, boxed, byte_array};
use crate::cps::Callable;
use crate::error::Result;
use crate::name::{self, Name};
use crate::{bail_capacity, bail_naming};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    fn buffer(self) -> &'static str {
        match self {
            Side::Left => "left_positional_args",
            Side::Right => "right_positional_args",
        }
    }
}

/// Where one declared positional or optional argument is read from.
#[derive(Debug)]
struct Slot<'a> {
    name: &'a Name,
    side: Side,
    index: usize,
    default: Option<&'a Name>,
}

fn argument_slots(callable: &Callable) -> Result<Vec<Slot<'_>>> {
    let mut slots = Vec::new();

    let right_positional = callable.right_positional.len();
    for (i, name) in callable.right_positional.iter().enumerate() {
        slots.push(Slot {
            name,
            side: Side::Right,
            index: i,
            default: None,
        });
    }
    for (i, opt) in callable.right_optional.iter().enumerate() {
        slots.push(Slot {
            name: &opt.name,
            side: Side::Right,
            index: right_positional + i,
            default: Some(&opt.value),
        });
    }

    let left_positional = callable.left_positional.len();
    let left_optional = callable.left_optional.len();
    for (i, name) in callable.left_positional.iter().enumerate() {
        slots.push(Slot {
            name,
            side: Side::Left,
            index: left_positional - i - 1,
            default: None,
        });
    }
    for (i, opt) in callable.left_optional.iter().enumerate() {
        slots.push(Slot {
            name: &opt.name,
            side: Side::Left,
            index: left_optional - i - 1 + left_positional,
            default: Some(&opt.value),
        });
    }

    for side in [Side::Left, Side::Right] {
        let mut seen = BTreeSet::new();
        for slot in slots.iter().filter(|slot| slot.side == side) {
            if !seen.insert(slot.name) {
                bail_naming!("non-unique argument name: {}", slot.name);
            }
        }
    }
    Ok(slots)
}

/// Bits of the first `count` slots.
fn full_mask(count: usize) -> u64 {
    debug_assert!(count < MAX_ARGUMENT_SLOTS);
    (1u64 << count) - 1
}

impl CodeGen {
    /// Label, frame setup and argument binding for `callable`.
    pub(super) fn write_entry(&mut self, callable: &Callable, ctx: &mut VariableContext) -> Result<()> {
        let slots = argument_slots(callable)?;
        let counts = [
            callable.left_positional.len() + callable.left_optional.len(),
            callable.right_positional.len() + callable.right_optional.len(),
        ];
        // One bit of each mask goes unused: 63 slots is the real maximum.
        if counts[Side::Right.index()] >= MAX_ARGUMENT_SLOTS {
            bail_capacity!("too many right arguments ({}) in {}", counts[1], callable.id);
        }
        if counts[Side::Left.index()] >= MAX_ARGUMENT_SLOTS {
            bail_capacity!("too many left arguments ({}) in {}", counts[0], callable.id);
        }

        self.out.label(callable.id.to_string());

        if callable.function {
            emit!(self.out, "frame = GC_MALLOC(sizeof(struct {}));", ctx.frame_id());
            for (saved, register) in [
                (name::continuation(), "continuation"),
                (name::dynamic_vars(), "dynamic_vars"),
            ] {
                ctx.define(&saved);
                emit!(self.out, "{} = {};", ctx.var_access(&saved), register);
            }
        }

        if let Some(keyword) = &callable.right_keyword {
            ctx.define(keyword);
            self.out.line("make_object(&dest);");
            emit!(self.out, "{} = {};", ctx.var_access(keyword), boxed(keyword, "dest"));
        }

        let named = !callable.left_optional.is_empty()
            || !callable.right_optional.is_empty()
            || callable.right_keyword.is_some()
            || callable.argument_names().any(Name::is_user_provided);
        let scope = ctx.val_access(&name::dynamic_vars());
        if named {
            self.write_named_arguments(callable, &slots, counts, ctx);
        } else {
            emit!(self.out, "NO_KEYWORD_ARGS({})", scope);
            emit!(self.out, "MIN_LEFT_ARGS({}, {})", scope, counts[0]);
            emit!(self.out, "MIN_RIGHT_ARGS({}, {})", scope, counts[1]);
        }

        for slot in &slots {
            ctx.define(slot.name);
            let source = format!("{}.data[{}]", slot.side.buffer(), slot.index);
            emit!(self.out, "{} = {};", ctx.var_access(slot.name), boxed(slot.name, &source));
        }

        match &callable.left_arbitrary {
            Some(rest) => self.write_rest(rest, Side::Left, counts[0], ctx),
            None => emit!(self.out, "MAX_LEFT_ARGS({}, {})", scope, counts[0]),
        }
        match &callable.right_arbitrary {
            Some(rest) => self.write_rest(rest, Side::Right, counts[1], ctx),
            None => emit!(self.out, "MAX_RIGHT_ARGS({}, {})", scope, counts[1]),
        }
        Ok(())
    }

    /// Match the incoming keyword table against the declared names, fill
    /// defaults, and check every slot ended up filled.
    fn write_named_arguments(
        &mut self,
        callable: &Callable,
        slots: &[Slot<'_>],
        counts: [usize; 2],
        ctx: &VariableContext,
    ) {
        for side in [Side::Left, Side::Right] {
            let (buffer, count) = (side.buffer(), counts[side.index()]);
            emit!(self.out, "reserve_space(&{}, {});", buffer, count);
            emit!(
                self.out,
                "named_slots[{}] = {}.size >= {} ? {}ULL : (1ULL << {}.size) - 1ULL;",
                side.index(),
                buffer,
                count,
                full_mask(count),
                buffer
            );
        }

        // The runtime compares keys bytewise, so sort the same way.
        let mut table: Vec<(String, &Slot<'_>)> = slots.iter().map(|slot| (slot.name.c_name(), slot)).collect();
        table.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let scope = ctx.val_access(&name::dynamic_vars());
        let catch_all = callable.right_keyword.as_ref().map(|keyword| ctx.val_access(keyword));
        let unknown = |out: &mut Emitter| match &catch_all {
            Some(object) => {
                emit!(out, "set_field({}.object.data, key, keyword_args.entries[i].value);", object);
                out.line("continue;");
            }
            None => emit!(
                out,
                "THROW_ERROR({}, make_c_string(\"argument %.*s unknown!\", (int)key.size, key.data));",
                scope
            ),
        };

        self.out.line("for(i = 0; i < keyword_args.size; i++) {");
        self.out.indent();
        self.out.line("key = keyword_args.entries[i].key;");
        if table.is_empty() {
            unknown(&mut self.out);
        } else {
            let keys: Vec<String> = table.iter().map(|(key, _)| byte_array(key.as_bytes())).collect();
            let sides: Vec<String> = table.iter().map(|(_, slot)| slot.side.index().to_string()).collect();
            let indexes: Vec<String> = table.iter().map(|(_, slot)| slot.index.to_string()).collect();
            emit!(
                self.out,
                "j = binary_search(key, (const struct ByteArray[]){{{}}}, {});",
                keys.join(", "),
                table.len()
            );
            emit!(self.out, "if(j == {}) {{", table.len());
            self.out.indent();
            unknown(&mut self.out);
            self.out.dedent();
            self.out.line("}");
            emit!(self.out, "side = ((const unsigned int[]){{{}}})[j];", sides.join(", "));
            emit!(self.out, "j = ((const unsigned int[]){{{}}})[j];", indexes.join(", "));
            self.out.line("if(named_slots[side] & (1ULL << j)) {");
            self.out.indent();
            emit!(
                self.out,
                "THROW_ERROR({}, make_c_string(\"argument %.*s already provided!\", (int)key.size, key.data));",
                scope
            );
            self.out.dedent();
            self.out.line("}");
            self.out.line("named_slots[side] |= 1ULL << j;");
            self.out.line("if(side == 0) {");
            self.out.indent();
            self.out.line("left_positional_args.data[j] = keyword_args.entries[i].value;");
            self.out.dedent();
            self.out.line("} else {");
            self.out.indent();
            self.out.line("right_positional_args.data[j] = keyword_args.entries[i].value;");
            self.out.dedent();
            self.out.line("}");
        }
        self.out.dedent();
        self.out.line("}");
        self.out.line("initialize_object(&keyword_args);");

        for slot in slots {
            let Some(default) = slot.default else { continue };
            let side = slot.side.index();
            emit!(self.out, "if(!(named_slots[{}] & (1ULL << {}))) {{", side, slot.index);
            self.out.indent();
            emit!(
                self.out,
                "{}.data[{}] = {};",
                slot.side.buffer(),
                slot.index,
                ctx.val_access(default)
            );
            emit!(self.out, "named_slots[{}] |= 1ULL << {};", side, slot.index);
            self.out.dedent();
            self.out.line("}");
        }

        if let Some(object) = &catch_all {
            emit!(self.out, "seal_object({}.object.data);", object);
        }

        let (left, right) = (full_mask(counts[0]), full_mask(counts[1]));
        emit!(
            self.out,
            "if((named_slots[0] & {}ULL) != {}ULL || (named_slots[1] & {}ULL) != {}ULL) {{",
            left,
            left,
            right,
            right
        );
        self.out.indent();
        emit!(self.out, "THROW_ERROR({}, make_c_string(\"argument missing!\"));", scope);
        self.out.dedent();
        self.out.line("}");
        for side in [Side::Left, Side::Right] {
            let (buffer, count) = (side.buffer(), counts[side.index()]);
            emit!(self.out, "if({}.size < {}) {}.size = {};", buffer, count, buffer, count);
        }
    }

    /// Collect everything past the declared slots into a fresh array, in
    /// source order.
    fn write_rest(&mut self, rest: &Name, side: Side, declared: usize, ctx: &mut VariableContext) {
        let buffer = side.buffer();
        emit!(
            self.out,
            "j = {}.size > {} ? {}.size - {} : 0;",
            buffer,
            declared,
            buffer,
            declared
        );
        self.out.line("raw_array = new_array(&dest, j);");
        self.out.line("for(i = 0; i < j; i++) {");
        self.out.indent();
        match side {
            Side::Right => emit!(self.out, "raw_array->data[i] = {}.data[{} + i];", buffer, declared),
            Side::Left => emit!(self.out, "raw_array->data[i] = {}.data[{}.size - i - 1];", buffer, buffer),
        }
        self.out.dedent();
        self.out.line("}");
        ctx.define(rest);
        emit!(self.out, "{} = {};", ctx.var_access(rest), boxed(rest, "dest"));
    }
}
