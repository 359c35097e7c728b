//! The fixed C runtime that generated code is assembled into.
//!
//! `HEADER` and `DATA_STRUCTURES` go before the name-set layouts,
//! `START_MAIN` opens `main` and initializes the globals record, and
//! `END_MAIN` holds the builtin bodies and closes `main`.

use std::collections::BTreeSet;

use crate::name::{self, Name};

pub const HEADER: &str = include_str!("header.c");
pub const DATA_STRUCTURES: &str = include_str!("data_structures.c");
pub const START_MAIN: &str = include_str!("start_main.c");
pub const END_MAIN: &str = include_str!("end_main.c");

/// Argument buffer sizes allocated at startup. Call sites with more
/// arguments than this grow the buffer first. Must match `header.c`.
pub const MIN_RIGHT_ARG_HIGHWATER: usize = 10;
pub const MIN_LEFT_ARG_HIGHWATER: usize = 2;

/// User-visible globals bound by the start block.
const USER_GLOBALS: &[&str] = &[
    "null",
    "true",
    "false",
    "print",
    "println",
    "readln",
    "if",
    "lessthan",
    "equals",
    "add",
    "subtract",
    "multiply",
    "divide",
    "modulo",
    "new_object",
    "seal_object",
    "Array",
    "Dictionary",
    "DynamicVar",
    "throw",
    "throw_handler",
];

/// Every name the runtime binds before the program starts. These are
/// never reported as unbound. The compiler's own names are never boxed; a
/// user-visible global is boxed when the program assigns to it.
pub fn provided_names() -> BTreeSet<Name> {
    let mut names: BTreeSet<Name> = [name::continuation(), name::dynamic_vars(), name::null_value()]
        .into_iter()
        .collect();
    names.extend(USER_GLOBALS.iter().map(|global| Name::user(*global)));
    names
}
