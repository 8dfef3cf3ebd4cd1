//! Splitting a raw input line into a command name and its arguments.
//!
//! The invoker only relies on a [`Tokenizer`] producing a finite, ordered,
//! deterministic list of tokens. [`ShellTokenizer`] is the default and
//! follows POSIX shell quoting; [`WhitespaceTokenizer`] does no quoting at
//! all. Any `Fn(&str) -> Result<Vec<String>, TokenizeError>` is a tokenizer
//! too.

use thiserror::Error;

/// Errors raised while tokenizing a line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    /// A quote was opened and never closed.
    #[error("unterminated quote in command line")]
    UnterminatedQuote,

    /// A custom tokenizer rejected the line.
    #[error("{0}")]
    Other(String),
}

/// Splits a line into tokens.
pub trait Tokenizer {
    /// Tokenizes `line`. An empty result means there is nothing to invoke.
    fn tokenize(&self, line: &str) -> Result<Vec<String>, TokenizeError>;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Result<Vec<String>, TokenizeError>,
{
    fn tokenize(&self, line: &str) -> Result<Vec<String>, TokenizeError> {
        self(line)
    }
}

/// POSIX-shell style word splitting.
///
/// Single quotes, double quotes and backslash escapes work as in `sh`, so
/// `say "hello world"` yields `["say", "hello world"]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellTokenizer;

impl Tokenizer for ShellTokenizer {
    fn tokenize(&self, line: &str) -> Result<Vec<String>, TokenizeError> {
        shell_words::split(line).map_err(|_| TokenizeError::UnterminatedQuote)
    }
}

/// Splits on runs of whitespace. Quotes have no special meaning.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, line: &str) -> Result<Vec<String>, TokenizeError> {
        Ok(line.split_whitespace().map(String::from).collect())
    }
}
