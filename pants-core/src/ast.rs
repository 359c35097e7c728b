//! Surface syntax tree produced by the parser and consumed by lowering.

use std::fmt;

use crate::name::{Name, Provenance};

/// Source location span tracking (line, column) start and end positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Span {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a dummy/generated span (all zeros) for test code
    #[cfg(test)]
    pub fn dummy() -> Self {
        Span::new(0, 0, 0, 0)
    }

    /// Check if this is a generated/dummy span (all zeros)
    pub fn is_generated(&self) -> bool {
        self.start_line == 0 && self.start_col == 0 && self.end_line == 0 && self.end_col == 0
    }

    /// Merge two spans to create a span covering both
    pub fn merge(&self, other: &Span) -> Span {
        let (start_line, start_col) = if (self.start_line, self.start_col) <= (other.start_line, other.start_col) {
            (self.start_line, self.start_col)
        } else {
            (other.start_line, other.start_col)
        };
        let (end_line, end_col) = if (self.end_line, self.end_col) >= (other.end_line, other.end_col) {
            (self.end_line, self.end_col)
        } else {
            (other.end_line, other.end_col)
        };
        Span::new(start_line, start_col, end_line, end_col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}..{}", self.start_line, self.start_col, self.end_col)
        } else {
            write!(
                f,
                "{}:{}..{}:{}",
                self.start_line, self.start_col, self.end_line, self.end_col
            )
        }
    }
}

/// A whole source file: a sequence of expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Application(Application),
    /// `x = value` introduces a binding in the current scope.
    Definition(Assignment),
    /// `x := value` rebinds an existing variable, field or index.
    Mutation(Assignment),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Application(app) => app.span,
            Expression::Definition(a) | Expression::Mutation(a) => a.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub assignee: Term,
    pub value: Application,
    pub span: Span,
}

/// Juxtaposed terms. With more than one term, the term ending in an open
/// call is the callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub terms: Vec<Term>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub value: Value,
    pub trailers: Vec<Trailer>,
    pub span: Span,
}

/// An identifier as written, or synthesized by a desugaring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub user_provided: bool,
}

impl Variable {
    pub fn user(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            user_provided: true,
        }
    }
}

impl From<&Variable> for Name {
    fn from(var: &Variable) -> Self {
        let provenance = if var.user_provided { Provenance::User } else { Provenance::Compiler };
        Name::new(var.name.clone(), provenance)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(Variable),
    Integer(i64),
    Float(f64),
    CharString(String),
    ByteString(Vec<u8>),
    SubExpression(Vec<Expression>),
    Array(Vec<Application>),
    Dictionary(Vec<DictDefinition>),
    Function(Function),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictDefinition {
    pub key: Application,
    pub value: Application,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trailer {
    /// `f.` followed by whitespace: the enclosing application supplies arguments.
    OpenCall,
    ClosedCall(ClosedCall),
    Field(Variable),
    Index(Vec<Expression>),
}

/// An argument with a default (in a function header) or a named argument at
/// a call site.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalArgument {
    pub name: Variable,
    pub value: Application,
}

/// Arguments between the parentheses of `f(...)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClosedCall {
    pub left_required: Vec<Application>,
    pub left_arbitrary: Option<Application>,
    pub right_required: Vec<Application>,
    pub right_optional: Vec<OptionalArgument>,
    pub right_arbitrary: Option<Application>,
    pub right_keyword: Option<Application>,
}

/// A function literal `{|left; right| body}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub left_required: Vec<Variable>,
    pub left_optional: Vec<OptionalArgument>,
    pub left_arbitrary: Option<Variable>,
    pub right_required: Vec<Variable>,
    pub right_optional: Vec<OptionalArgument>,
    pub right_arbitrary: Option<Variable>,
    pub right_keyword: Option<Variable>,
    pub expressions: Vec<Expression>,
}

impl Function {
    /// A function without arguments wrapping the given body.
    pub fn nullary(expressions: Vec<Expression>) -> Self {
        Function {
            left_required: Vec::new(),
            left_optional: Vec::new(),
            left_arbitrary: None,
            right_required: Vec::new(),
            right_optional: Vec::new(),
            right_arbitrary: None,
            right_keyword: None,
            expressions,
        }
    }

    /// Every declared argument variable, left side first.
    pub fn argument_variables(&self) -> impl Iterator<Item = &Variable> {
        self.left_required
            .iter()
            .chain(self.left_optional.iter().map(|opt| &opt.name))
            .chain(self.left_arbitrary.iter())
            .chain(self.right_required.iter())
            .chain(self.right_optional.iter().map(|opt| &opt.name))
            .chain(self.right_arbitrary.iter())
            .chain(self.right_keyword.iter())
    }
}
