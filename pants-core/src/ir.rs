//! Linear intermediate representation.
//!
//! Every intermediate result is bound to a Name, and every call records the
//! Name its result is assigned to. Nested scopes only appear as `Function`
//! values.

use crate::name::Name;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Assignment(Assignment),
    ObjectMutation(ObjectMutation),
    ReturnValue(ReturnValue),
}

/// `assignee = value`. A local assignment introduces the name in the current
/// scope; a nonlocal one rebinds wherever the name already lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub assignee: Name,
    pub value: Value,
    pub local: bool,
}

/// `object.field := value`
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMutation {
    pub object: Name,
    pub field: Name,
    pub value: Name,
}

/// `assignee = call(...)`
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnValue {
    pub assignee: Name,
    pub term: Call,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Field { object: Name, field: Name },
    Variable(Name),
    Integer(i64),
    Float(f64),
    CharString(String),
    ByteString(Vec<u8>),
    Function(Box<Function>),
}

/// A named argument: at a call site `key: value`, in a function header
/// `name: default`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    pub name: Name,
    pub value: Name,
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
}

impl Call {
    pub fn new(callable: Name) -> Self {
        Call {
            callable,
            left_positional: Vec::new(),
            left_arbitrary: None,
            right_positional: Vec::new(),
            right_optional: Vec::new(),
            right_arbitrary: None,
            right_keyword: None,
        }
    }

    pub fn with_right(callable: Name, right_positional: Vec<Name>) -> Self {
        Call {
            right_positional,
            ..Call::new(callable)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub left_positional: Vec<Name>,
    pub left_optional: Vec<NamedArgument>,
    pub left_arbitrary: Option<Name>,
    pub right_positional: Vec<Name>,
    pub right_optional: Vec<NamedArgument>,
    pub right_arbitrary: Option<Name>,
    pub right_keyword: Option<Name>,
    pub expressions: Vec<Expression>,
    /// The name holding the body's result.
    pub lastval: Name,
}

impl Function {
    pub fn nullary(expressions: Vec<Expression>, lastval: Name) -> Self {
        Function {
            left_positional: Vec::new(),
            left_optional: Vec::new(),
            left_arbitrary: None,
            right_positional: Vec::new(),
            right_optional: Vec::new(),
            right_arbitrary: None,
            right_keyword: None,
            expressions,
            lastval,
        }
    }
}

/// A lowered program: the top-level statements and the name of the value
/// they produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub expressions: Vec<Expression>,
    pub lastval: Name,
}
