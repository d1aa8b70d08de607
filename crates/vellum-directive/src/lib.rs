//! Directive template compiler.
//!
//! This crate turns directive-style templates into a closed intermediate
//! representation ([`Program`]) that a host interprets. Compilation is a pure
//! function of the source text: no files, no registry, no macros are
//! consulted.
//!
//! # Example
//!
//! ```rust
//! use vellum_directive::{compile, Node};
//!
//! let program = compile("@if($user)Hello, {{ $user->name }}!@endif").unwrap();
//! assert!(matches!(program.nodes[0], Node::If { .. }));
//! ```
//!
//! # Directives
//!
//! | Source | Node |
//! |--------|------|
//! | `@extends(expr)` | [`Node::Extends`] |
//! | `@if(expr)` `@elseif(expr)` `@else` `@endif` | [`Node::If`] |
//! | `@foreach($xs as $x)` / `@foreach($xs as $k => $x)` `@endforeach` | [`Node::Foreach`] |
//! | `@name(args)` (any other identifier) | [`Node::Macro`] |
//! | `{{ expr }}` | [`Node::Escaped`] |
//! | `{!! expr !!}` | [`Node::Raw`] |
//! | `{{-- text --}}` | dropped |
//! | `@@` | a literal `@` |
//!
//! Reserved directive names are matched before the generic `@name(...)` form,
//! so `@if(...)` is never dispatched as a macro.
//!
//! # Value semantics
//!
//! The [`value`] module defines truthiness, output formatting, indexing,
//! comparison and arithmetic over [`serde_json::Value`], so every host
//! evaluates compiled programs the same way.

mod ast;
mod compiler;
mod error;
pub mod expr;
mod lexer;
pub mod value;

pub use ast::{BinaryOp, Branch, Expr, Node, Program, UnaryOp, FORMAT_VERSION};
pub use compiler::MAX_BLOCK_DEPTH;
pub use error::{ParseError, ValueError};

/// Compiles template source into a [`Program`].
///
/// # Errors
///
/// Returns a [`ParseError`] with the line of the offending directive when a
/// marker is unterminated, an expression is malformed, or blocks are not
/// balanced.
pub fn compile(source: &str) -> Result<Program, ParseError> {
    compiler::Compiler::new(source).compile()
}
