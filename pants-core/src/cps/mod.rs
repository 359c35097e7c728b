//! Continuation-passing form.
//!
//! Each non-call expression owns the expression that follows it, and each
//! call owns the continuation that receives its result, so a program is a
//! single tree. Functions and continuations are both `Callable`s; only
//! functions (`function == true`) allocate a fresh frame on entry.

mod convert;
mod mutation;

pub use convert::convert_program;
pub use mutation::annotate_mutations;

use std::collections::BTreeSet;
use std::fmt;

use crate::bail_naming;
use crate::error::Result;
use crate::name::{self, Name};

pub use crate::ir::NamedArgument;

/// Identifies a callable; doubles as its label and dispatch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(pub u32);

impl From<u32> for CallableId {
    fn from(id: u32) -> Self {
        CallableId(id)
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Call(Call),
    Assignment(Assignment),
    ObjectMutation(ObjectMutation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callable: Name,
    pub left_positional: Vec<Name>,
    pub left_arbitrary: Option<Name>,
    pub right_positional: Vec<Name>,
    pub right_optional: Vec<NamedArgument>,
    pub right_arbitrary: Option<Name>,
    pub right_keyword: Option<Name>,
    /// Receives the call's result. `None` only for the final return to the
    /// enclosing function's own continuation.
    pub continuation: Option<Box<Callable>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub assignee: Name,
    pub value: Value,
    pub local: bool,
    pub next: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMutation {
    pub object: Name,
    pub field: Name,
    pub value: Name,
    pub next: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Field { object: Name, field: Name },
    Variable(Name),
    Integer(i64),
    Float(f64),
    String { bytes: Vec<u8>, byte_oriented: bool },
    Callable(Box<Callable>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    pub id: CallableId,
    /// True for source-level functions, false for continuations.
    pub function: bool,
    pub left_positional: Vec<Name>,
    pub left_optional: Vec<NamedArgument>,
    pub left_arbitrary: Option<Name>,
    pub right_positional: Vec<Name>,
    pub right_optional: Vec<NamedArgument>,
    pub right_arbitrary: Option<Name>,
    pub right_keyword: Option<Name>,
    pub body: Expression,
}

/// A converted program: the top-level expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub root: Expression,
}

impl Callable {
    /// A continuation receiving a single value.
    pub fn continuation(id: CallableId, argument: Name, body: Expression) -> Self {
        Callable {
            id,
            function: false,
            left_positional: Vec::new(),
            left_optional: Vec::new(),
            left_arbitrary: None,
            right_positional: vec![argument],
            right_optional: Vec::new(),
            right_arbitrary: None,
            right_keyword: None,
            body,
        }
    }

    /// Every declared argument, left side first.
    pub fn argument_names(&self) -> impl Iterator<Item = &Name> {
        self.left_positional
            .iter()
            .chain(self.left_optional.iter().map(|opt| &opt.name))
            .chain(self.left_arbitrary.iter())
            .chain(self.right_positional.iter())
            .chain(self.right_optional.iter().map(|opt| &opt.name))
            .chain(self.right_arbitrary.iter())
            .chain(self.right_keyword.iter())
    }

    /// Names bound on entry: the declared arguments, plus the continuation
    /// and dynamic scope for functions.
    pub fn bound_names(&self) -> BTreeSet<Name> {
        let mut bound: BTreeSet<Name> = self.argument_names().cloned().collect();
        if self.function {
            bound.insert(name::continuation());
            bound.insert(name::dynamic_vars());
        }
        bound
    }

    pub fn check_unique_arguments(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for arg in self.argument_names() {
            if !seen.insert(arg) {
                bail_naming!("non-unique argument name: {}", arg);
            }
        }
        Ok(())
    }

    /// Names the callable reads from its enclosing scope.
    pub fn free_names(&self) -> BTreeSet<Name> {
        let mut names = self.body.free_names();
        for bound in self.bound_names() {
            names.remove(&bound);
        }
        // Defaults are evaluated where the callable is defined.
        for opt in self.left_optional.iter().chain(&self.right_optional) {
            names.insert(opt.value.clone());
        }
        names
    }

    /// Names stored in this callable's frame record.
    pub fn frame_names(&self) -> BTreeSet<Name> {
        let mut names = self.bound_names();
        self.body.collect_frame_names(&mut names);
        names
    }

    pub fn callables<'a>(&'a self, out: &mut Vec<&'a Callable>) {
        self.body.callables(out);
    }
}

impl Call {
    pub fn argument_names(&self) -> impl Iterator<Item = &Name> {
        self.left_arbitrary
            .iter()
            .chain(self.left_positional.iter())
            .chain(self.right_positional.iter())
            .chain(self.right_optional.iter().map(|opt| &opt.value))
            .chain(self.right_arbitrary.iter())
            .chain(self.right_keyword.iter())
    }
}

impl Value {
    fn collect_free_names(&self, out: &mut BTreeSet<Name>) {
        match self {
            Value::Field { object, .. } => {
                out.insert(object.clone());
            }
            Value::Variable(name) => {
                out.insert(name.clone());
            }
            Value::Integer(_) | Value::Float(_) | Value::String { .. } => {}
            Value::Callable(callable) => out.extend(callable.free_names()),
        }
    }
}

/// The expressions run one after another in a single frame: each `next`,
/// then into each call's continuation body. Nested functions are not entered.
pub struct Spine<'a> {
    next: Option<&'a Expression>,
}

impl<'a> Iterator for Spine<'a> {
    type Item = &'a Expression;

    fn next(&mut self) -> Option<Self::Item> {
        let expression = self.next?;
        self.next = match expression {
            Expression::Call(call) => call.continuation.as_ref().map(|continuation| &continuation.body),
            Expression::Assignment(assignment) => Some(&*assignment.next),
            Expression::ObjectMutation(mutation) => Some(&*mutation.next),
        };
        Some(expression)
    }
}

// Programs are chains as long as their statement count, so every pass below
// walks the spine in a loop and only recurses into nested functions.
impl Expression {
    pub fn spine(&self) -> Spine<'_> {
        Spine { next: Some(self) }
    }

    pub fn free_names(&self) -> BTreeSet<Name> {
        // Backwards, so a local definition can drop its name from everything
        // after it.
        let spine: Vec<&Expression> = self.spine().collect();
        let mut names = BTreeSet::new();
        for expression in spine.into_iter().rev() {
            match expression {
                Expression::Call(call) => {
                    // `names` holds the free names of the continuation body.
                    if let Some(continuation) = &call.continuation {
                        for bound in continuation.bound_names() {
                            names.remove(&bound);
                        }
                        for opt in continuation.left_optional.iter().chain(&continuation.right_optional) {
                            names.insert(opt.value.clone());
                        }
                    }
                    names.insert(call.callable.clone());
                    names.extend(call.argument_names().cloned());
                    names.insert(name::dynamic_vars());
                }
                Expression::Assignment(assignment) => {
                    assignment.value.collect_free_names(&mut names);
                    if assignment.local {
                        names.remove(&assignment.assignee);
                    } else {
                        names.insert(assignment.assignee.clone());
                    }
                }
                Expression::ObjectMutation(mutation) => {
                    names.insert(mutation.object.clone());
                    names.insert(mutation.value.clone());
                }
            }
        }
        names
    }

    /// Names defined by this expression in the current frame. Continuations
    /// share the frame they are created in; nested functions do not.
    pub fn collect_frame_names(&self, out: &mut BTreeSet<Name>) {
        for expression in self.spine() {
            match expression {
                Expression::Call(call) => {
                    if let Some(continuation) = &call.continuation {
                        out.extend(continuation.argument_names().cloned());
                    }
                }
                Expression::Assignment(assignment) if assignment.local => {
                    out.insert(assignment.assignee.clone());
                }
                Expression::Assignment(_) | Expression::ObjectMutation(_) => {}
            }
        }
    }

    /// Every callable nested anywhere below, functions and continuations,
    /// in pre-order.
    pub fn callables<'a>(&'a self, out: &mut Vec<&'a Callable>) {
        for expression in self.spine() {
            match expression {
                Expression::Call(call) => {
                    if let Some(continuation) = &call.continuation {
                        out.push(continuation);
                    }
                }
                Expression::Assignment(assignment) => {
                    if let Value::Callable(callable) = &assignment.value {
                        out.push(callable);
                        callable.callables(out);
                    }
                }
                Expression::ObjectMutation(_) => {}
            }
        }
    }

    /// Targets of nonlocal assignments anywhere below, including inside
    /// nested callables.
    pub fn collect_reassigned(&self, out: &mut BTreeSet<Name>) {
        for expression in self.spine() {
            if let Expression::Assignment(assignment) = expression {
                if !assignment.local {
                    out.insert(assignment.assignee.clone());
                }
                if let Value::Callable(callable) = &assignment.value {
                    callable.body.collect_reassigned(out);
                }
            }
        }
    }

    /// Visit every Name occurrence mutably.
    pub fn for_each_name_mut(&mut self, f: &mut impl FnMut(&mut Name)) {
        let mut current = Some(self);
        while let Some(expression) = current {
            current = match expression {
                Expression::Call(call) => {
                    f(&mut call.callable);
                    call.left_positional.iter_mut().for_each(&mut *f);
                    call.right_positional.iter_mut().for_each(&mut *f);
                    for opt in &mut call.right_optional {
                        f(&mut opt.name);
                        f(&mut opt.value);
                    }
                    call.left_arbitrary.iter_mut().for_each(&mut *f);
                    call.right_arbitrary.iter_mut().for_each(&mut *f);
                    call.right_keyword.iter_mut().for_each(&mut *f);
                    match &mut call.continuation {
                        Some(continuation) => {
                            continuation.for_each_argument_name_mut(f);
                            Some(&mut continuation.body)
                        }
                        None => None,
                    }
                }
                Expression::Assignment(assignment) => {
                    f(&mut assignment.assignee);
                    match &mut assignment.value {
                        Value::Field { object, field } => {
                            f(object);
                            f(field);
                        }
                        Value::Variable(name) => f(name),
                        Value::Callable(callable) => callable.for_each_name_mut(f),
                        Value::Integer(_) | Value::Float(_) | Value::String { .. } => {}
                    }
                    Some(&mut *assignment.next)
                }
                Expression::ObjectMutation(mutation) => {
                    f(&mut mutation.object);
                    f(&mut mutation.field);
                    f(&mut mutation.value);
                    Some(&mut *mutation.next)
                }
            };
        }
    }

    /// A call with nothing after it, used to stand in for a detached tail.
    fn leaf() -> Expression {
        Expression::Call(Call {
            callable: Name::compiler(String::new()),
            left_positional: Vec::new(),
            left_arbitrary: None,
            right_positional: Vec::new(),
            right_optional: Vec::new(),
            right_arbitrary: None,
            right_keyword: None,
            continuation: None,
        })
    }

    /// Take the expression that follows this one in its frame.
    fn detach_next(&mut self) -> Option<Expression> {
        match self {
            Expression::Call(call) => call
                .continuation
                .as_mut()
                .map(|continuation| std::mem::replace(&mut continuation.body, Expression::leaf())),
            Expression::Assignment(assignment) => Some(std::mem::replace(&mut *assignment.next, Expression::leaf())),
            Expression::ObjectMutation(mutation) => Some(std::mem::replace(&mut *mutation.next, Expression::leaf())),
        }
    }
}

impl Drop for Expression {
    // The derived drop would recurse once per statement.
    fn drop(&mut self) {
        let mut next = self.detach_next();
        while let Some(mut expression) = next {
            next = expression.detach_next();
        }
    }
}

impl Callable {
    pub fn for_each_name_mut(&mut self, f: &mut impl FnMut(&mut Name)) {
        self.for_each_argument_name_mut(f);
        self.body.for_each_name_mut(f);
    }

    fn for_each_argument_name_mut(&mut self, f: &mut impl FnMut(&mut Name)) {
        self.left_positional.iter_mut().for_each(&mut *f);
        self.right_positional.iter_mut().for_each(&mut *f);
        for opt in self.left_optional.iter_mut().chain(self.right_optional.iter_mut()) {
            f(&mut opt.name);
            f(&mut opt.value);
        }
        self.left_arbitrary.iter_mut().for_each(&mut *f);
        self.right_arbitrary.iter_mut().for_each(&mut *f);
        self.right_keyword.iter_mut().for_each(&mut *f);
    }
}
