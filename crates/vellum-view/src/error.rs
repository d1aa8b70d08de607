//! Error types for view resolution and rendering.
//!
//! [`ViewError`] is the single error type returned by every public operation.
//! The resolution, compilation and configuration families have their own
//! enums so callers can match on them precisely.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use vellum_directive::{ParseError, ValueError};

/// A template reference could not be turned into a file.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No candidate name, engine and search path produced an existing file.
    #[error("template not found: {template}")]
    NotFound { template: String },

    /// The reference contained a parent-directory token.
    #[error("template reference may not contain `..`: {template}")]
    Traversal { template: String },

    /// A matching file was found but could not be canonicalized.
    #[error("cannot canonicalize {}: {source}", path.display())]
    Canonicalize { path: PathBuf, source: io::Error },
}

/// Reading, compiling or caching a template failed.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read template {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write compiled template {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("syntax error in {}: {source}", path.display())]
    Syntax { path: PathBuf, source: ParseError },

    /// A cached artifact exists but does not decode as a compiled program.
    #[error("corrupt compiled template {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Loading a [`ViewConfig`](crate::ViewConfig) failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid view config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Error type for all view operations.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// A macro was invoked by a name nobody registered.
    #[error("macro `{0}` is not defined")]
    MacroUndefined(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A template read a variable that is not bound (strict mode only).
    #[error("undefined variable `${0}`")]
    UndefinedVariable(String),

    /// An operator was applied to incompatible values.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Any other failure raised while a template body runs.
    #[error("{0}")]
    Execution(String),

    /// Layouts extended each other deeper than the configured limit.
    #[error("layout nesting exceeded {depth} levels at `{template}`")]
    LayoutDepth { template: String, depth: usize },

    /// View data did not serialize to a map.
    #[error("invalid view data: {0}")]
    Data(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ViewError {
    /// Creates an [`ViewError::Execution`] error, typically from inside a macro.
    pub fn execution(message: impl Into<String>) -> Self {
        ViewError::Execution(message.into())
    }

    /// Whether this is a resolution failure (not found or traversal).
    pub fn is_resolution(&self) -> bool {
        matches!(self, ViewError::Resolution(_))
    }
}
