//! Error types for directive compilation and value operations.

use thiserror::Error;

/// A template could not be compiled.
///
/// Carries the 1-based line on which the offending directive starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// Line of the directive or echo that failed to parse.
    pub line: usize,
    /// Human readable description.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// Computes the line for a byte offset into `source`.
    pub(crate) fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::new(line_of(source, offset), message)
    }
}

pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

/// An operator was applied to values it cannot combine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("unsupported operand types for `{op}`: {lhs} and {rhs}")]
    Operand {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,
}
