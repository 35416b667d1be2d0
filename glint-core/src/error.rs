use crate::ast::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("Lex error: {0}")]
    LexError(String, Option<Span>),

    #[error("Parse error: {0}")]
    ParseError(String, Option<Span>),

    #[error("Type error: {0}")]
    TypeError(String, Option<Span>),

    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String, Option<Span>),

    #[error("Code generation error: {0}")]
    CodegenError(String, Option<Span>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CompilerError {
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::LexError(_, span) => *span,
            Self::ParseError(_, span) => *span,
            Self::TypeError(_, span) => *span,
            Self::UndefinedVariable(_, span) => *span,
            Self::CodegenError(_, span) => *span,
            Self::InvalidRequest(_) => None,
        }
    }

    /// The compilation phase the error originated from, for caller-facing
    /// diagnostics.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::LexError(..) => "lex",
            Self::ParseError(..) => "parse",
            Self::TypeError(..) | Self::UndefinedVariable(..) => "type",
            Self::CodegenError(..) => "codegen",
            Self::InvalidRequest(..) => "request",
        }
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;

// Bail macros without span

#[macro_export]
macro_rules! bail_parse {
    ($($arg:tt)*) => {
        return Err($crate::error::CompilerError::ParseError(format!($($arg)*), None))
    };
}

#[macro_export]
macro_rules! bail_type {
    ($($arg:tt)*) => {
        return Err($crate::error::CompilerError::TypeError(format!($($arg)*), None))
    };
}

#[macro_export]
macro_rules! bail_codegen {
    ($($arg:tt)*) => {
        return Err($crate::error::CompilerError::CodegenError(format!($($arg)*), None))
    };
}

// Bail macros with span

#[macro_export]
macro_rules! bail_lex_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::CompilerError::LexError(format!($($arg)*), Some($span)))
    };
}

#[macro_export]
macro_rules! bail_parse_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::CompilerError::ParseError(format!($($arg)*), Some($span)))
    };
}

#[macro_export]
macro_rules! bail_type_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::CompilerError::TypeError(format!($($arg)*), Some($span)))
    };
}

#[macro_export]
macro_rules! bail_undef_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::CompilerError::UndefinedVariable(format!($($arg)*), Some($span)))
    };
}

#[macro_export]
macro_rules! bail_codegen_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::CompilerError::CodegenError(format!($($arg)*), Some($span)))
    };
}
