use crate::ast::Span;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompilerError>;

/// Every failure the compiler can report. Each variant carries a message and,
/// when the failing construct came from source text, the span it covers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompilerError {
    #[error("parse error{}: {0}", at(.1))]
    ParseError(String, Option<Span>),

    /// Structural problems found while lowering the AST.
    #[error("lowering error{}: {0}", at(.1))]
    LoweringError(String, Option<Span>),

    /// Duplicate or colliding argument names.
    #[error("naming error{}: {0}", at(.1))]
    NamingError(String, Option<Span>),

    #[error("unbound variable{}: {0}", at(.1))]
    UnboundVariable(String, Option<Span>),

    /// Limits of the calling convention, such as the per-side slot ceiling.
    #[error("capacity error{}: {0}", at(.1))]
    CapacityError(String, Option<Span>),
}

impl CompilerError {
    pub fn message(&self) -> &str {
        match self {
            CompilerError::ParseError(msg, _)
            | CompilerError::LoweringError(msg, _)
            | CompilerError::NamingError(msg, _)
            | CompilerError::UnboundVariable(msg, _)
            | CompilerError::CapacityError(msg, _) => msg,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CompilerError::ParseError(_, span)
            | CompilerError::LoweringError(_, span)
            | CompilerError::NamingError(_, span)
            | CompilerError::UnboundVariable(_, span)
            | CompilerError::CapacityError(_, span) => *span,
        }
    }
}

fn at(span: &Option<Span>) -> String {
    match span {
        Some(span) if !span.is_generated() => format!(" at {}", span),
        _ => String::new(),
    }
}

#[macro_export]
macro_rules! err_parse {
    ($($arg:tt)*) => {
        $crate::error::CompilerError::ParseError(format!($($arg)*), None)
    };
}

#[macro_export]
macro_rules! err_parse_at {
    ($span:expr, $($arg:tt)*) => {
        $crate::error::CompilerError::ParseError(format!($($arg)*), Some($span))
    };
}

#[macro_export]
macro_rules! bail_parse_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::err_parse_at!($span, $($arg)*))
    };
}

#[macro_export]
macro_rules! err_lower_at {
    ($span:expr, $($arg:tt)*) => {
        $crate::error::CompilerError::LoweringError(format!($($arg)*), Some($span))
    };
}

#[macro_export]
macro_rules! bail_lower_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::err_lower_at!($span, $($arg)*))
    };
}

#[macro_export]
macro_rules! err_naming {
    ($($arg:tt)*) => {
        $crate::error::CompilerError::NamingError(format!($($arg)*), None)
    };
}

#[macro_export]
macro_rules! bail_naming {
    ($($arg:tt)*) => {
        return Err($crate::err_naming!($($arg)*))
    };
}

#[macro_export]
macro_rules! bail_naming_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::CompilerError::NamingError(format!($($arg)*), Some($span)))
    };
}

#[macro_export]
macro_rules! err_unbound {
    ($($arg:tt)*) => {
        $crate::error::CompilerError::UnboundVariable(format!($($arg)*), None)
    };
}

#[macro_export]
macro_rules! err_capacity {
    ($($arg:tt)*) => {
        $crate::error::CompilerError::CapacityError(format!($($arg)*), None)
    };
}

#[macro_export]
macro_rules! bail_capacity {
    ($($arg:tt)*) => {
        return Err($crate::err_capacity!($($arg)*))
    };
}
