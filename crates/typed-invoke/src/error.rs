//! Error types for registration, parsing, and invocation.

use std::fmt;
use thiserror::Error;

use crate::tokenize::TokenizeError;

/// Boxed error carried as the cause of a failed parse.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while binding a handler to a command name.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The handler's shape was rejected by `check_and_pack`.
    #[error("invalid handler for command '{command}': {reason}")]
    InvalidHandler { command: String, reason: String },

    /// `register` was called for a name that is already bound.
    #[error("command '{0}' is already bound")]
    AlreadyBound(String),

    /// `update` was called for a name that is not bound.
    #[error("command '{0}' is not bound")]
    NotBound(String),
}

impl RegistrationError {
    pub(crate) fn invalid_handler(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHandler {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// The argument count a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No rest parameter: exactly this many arguments.
    Exactly(usize),
    /// A rest parameter follows this many fixed parameters.
    AtLeast(usize),
}

impl Arity {
    /// Returns true if `count` arguments satisfy this arity.
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// Errors raised by [`Invoker::invoke`](crate::Invoker::invoke) and
/// [`Invoker::invoke_line`](crate::Invoker::invoke_line).
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No handler is bound to the name and no fallback is installed.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The argument count does not satisfy the handler's shape.
    #[error("command '{command}' takes {expected} argument(s), got {actual}")]
    ArityMismatch {
        command: String,
        expected: Arity,
        actual: usize,
    },

    /// Neither the user layer nor the default layer can parse this type.
    #[error("do not know how to parse {type_name}")]
    NoParser { type_name: &'static str },

    /// A parser ran and rejected its input.
    #[error("argument {position} ('{input}') is not a valid {type_name}: {source}")]
    Parse {
        position: usize,
        type_name: &'static str,
        input: String,
        #[source]
        source: BoxError,
    },

    /// The handler itself failed. Surfaced without wrapping.
    #[error(transparent)]
    Handler(anyhow::Error),

    /// The line tokenizer rejected the input line.
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
}

impl InvokeError {
    /// Returns true if this is an arity mismatch.
    pub fn is_arity_mismatch(&self) -> bool {
        matches!(self, InvokeError::ArityMismatch { .. })
    }

    /// Returns true if a parser rejected an argument.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, InvokeError::Parse { .. })
    }

    /// Returns true if no parser could be resolved for a parameter type.
    pub fn is_no_parser(&self) -> bool {
        matches!(self, InvokeError::NoParser { .. })
    }

    /// Returns true if the command was unbound and no fallback was set.
    pub fn is_unknown_command(&self) -> bool {
        matches!(self, InvokeError::UnknownCommand(_))
    }

    /// Returns the handler's own error, if this is a handler failure.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            InvokeError::Handler(e) => Some(e),
            _ => None,
        }
    }
}

/// Error produced by the single-character parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected exactly one character, found {found}")]
pub struct CharError {
    /// Number of characters in the rejected input.
    pub found: usize,
}
