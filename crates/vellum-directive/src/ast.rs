//! The compiled form of a template.
//!
//! A [`Program`] is a closed tree of [`Node`]s. It is what the compiler
//! produces, what the view layer writes to its compiled-artifact cache (as
//! JSON), and what the interpreter walks at render time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bumped whenever the serialized shape of [`Program`] changes, so stale
/// artifacts written by an older build are recompiled instead of misread.
pub const FORMAT_VERSION: u32 = 1;

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub version: u32,
    pub nodes: Vec<Node>,
}

impl Program {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            version: FORMAT_VERSION,
            nodes,
        }
    }

    /// Whether this program was produced by the current compiler.
    pub fn is_current(&self) -> bool {
        self.version == FORMAT_VERSION
    }
}

/// One element of a compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Literal text, emitted as is.
    Text(String),

    /// `{{ expr }}`: the value goes through the `escape` macro.
    Escaped(Expr),

    /// `{!! expr !!}`: the value is emitted unescaped.
    Raw(Expr),

    /// `@extends(expr)`: registers the layout of the current render.
    Extends(Expr),

    /// `@if` / `@elseif` / `@else` / `@endif`.
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },

    /// `@foreach($subject as $key => $value)`.
    Foreach {
        subject: Expr,
        key: Option<String>,
        value: String,
        body: Vec<Node>,
    },

    /// `@name(args)`: any directive that is not built in.
    Macro { name: String, args: Vec<Expr> },
}

/// A guarded body of an `@if` chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

/// An expression inside a directive or echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),

    /// `$name`
    Variable(String),

    /// `$a->b`, `$a['b']`, `$a[0]`
    Access { target: Box<Expr>, key: Box<Expr> },

    /// `name(args)`, dispatched to the macro table.
    Call { name: String, args: Vec<Expr> },

    Unary { op: UnaryOp, operand: Box<Expr> },

    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Coalesce,
    Or,
    And,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// Source spelling, used in error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Coalesce => "??",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Concat => ".",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    /// Binding power; higher binds tighter.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinaryOp::Coalesce => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Identical | BinaryOp::NotIdentical => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Concat => 6,
            BinaryOp::Add | BinaryOp::Sub => 7,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 8,
        }
    }

    /// `??` groups to the right: `$a ?? $b ?? 'x'` is `$a ?? ($b ?? 'x')`.
    pub(crate) fn is_right_assoc(self) -> bool {
        matches!(self, BinaryOp::Coalesce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_serde_shape_is_stable() {
        let program = Program::new(vec![
            Node::Text("hi ".into()),
            Node::Escaped(Expr::Variable("name".into())),
        ]);
        let encoded = serde_json::to_string(&program).unwrap();
        let decoded: Program = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, program);
        assert!(encoded.contains("\"escaped\""));
    }

    #[test]
    fn test_old_version_is_not_current() {
        let mut program = Program::new(vec![]);
        program.version = 0;
        assert!(!program.is_current());
    }
}
