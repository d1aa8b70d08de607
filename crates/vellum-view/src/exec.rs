//! Interpreter for compiled programs.
//!
//! A [`Frame`] holds everything one render of a [`Program`] needs: the
//! manager for macro calls, the bound data, loop variables, and the layout
//! slot set by `@extends`. Output is accumulated in a buffer that is only
//! returned when the whole program ran; any error discards it.

use serde_json::Value;
use tracing::trace;
use vellum_directive::value;
use vellum_directive::{BinaryOp, Branch, Expr, Node, Program, UnaryOp};

use crate::error::ViewError;
use crate::manager::{Manager, ESCAPE_MACRO};
use crate::view::Data;

/// Result of running a program.
#[derive(Debug, Default, PartialEq)]
pub struct Output {
    /// Captured text.
    pub text: String,
    /// Layout registered by the last `@extends` that ran.
    pub layout: Option<String>,
}

pub struct Frame<'a> {
    manager: &'a Manager,
    data: &'a Data,
    locals: Vec<(String, Value)>,
    strict: bool,
    layout: Option<String>,
}

impl<'a> Frame<'a> {
    pub fn new(manager: &'a Manager, data: &'a Data) -> Self {
        Self {
            manager,
            data,
            locals: Vec::new(),
            strict: false,
            layout: None,
        }
    }

    /// Reading an unbound variable fails with [`ViewError::UndefinedVariable`].
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn run(mut self, program: &Program) -> Result<Output, ViewError> {
        let mut text = String::new();
        self.nodes(&program.nodes, &mut text)?;
        Ok(Output {
            text,
            layout: self.layout,
        })
    }

    fn nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), ViewError> {
        for node in nodes {
            self.node(node, out)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node, out: &mut String) -> Result<(), ViewError> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Escaped(expr) => {
                let raw = self.eval(expr)?;
                let escaped = self.manager.use_macro(ESCAPE_MACRO, &[raw])?;
                out.push_str(&value::display(&escaped));
            }
            Node::Raw(expr) => out.push_str(&value::display(&self.eval(expr)?)),
            Node::Extends(expr) => {
                let layout = value::display(&self.eval(expr)?);
                trace!(layout = %layout, "layout registered");
                self.layout = Some(layout);
            }
            Node::If {
                branches,
                otherwise,
            } => {
                if let Some(body) = self.select(branches)? {
                    self.nodes(body, out)?;
                } else if let Some(body) = otherwise {
                    self.nodes(body, out)?;
                }
            }
            Node::Foreach {
                subject,
                key,
                value: binding,
                body,
            } => {
                let subject = self.eval(subject)?;
                let entries = value::entries(&subject).ok_or_else(|| {
                    ViewError::execution(format!(
                        "@foreach expects an array or object, got {}",
                        value::type_name(&subject)
                    ))
                })?;

                let mark = self.locals.len();
                for (k, v) in entries {
                    self.locals.truncate(mark);
                    if let Some(key) = key {
                        self.locals.push((key.clone(), k));
                    }
                    self.locals.push((binding.clone(), v));
                    let result = self.nodes(body, out);
                    if result.is_err() {
                        self.locals.truncate(mark);
                        return result;
                    }
                }
                self.locals.truncate(mark);
            }
            Node::Macro { name, args } => {
                let args = self.eval_all(args)?;
                let result = self.manager.use_macro(name, &args)?;
                out.push_str(&value::display(&result));
            }
        }
        Ok(())
    }

    fn select<'n>(&mut self, branches: &'n [Branch]) -> Result<Option<&'n [Node]>, ViewError> {
        for branch in branches {
            if value::truthy(&self.eval(&branch.condition)?) {
                return Ok(Some(&branch.body));
            }
        }
        Ok(None)
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, ViewError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn lookup(&self, name: &str) -> Result<Value, ViewError> {
        let found = self
            .locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.data.get(name));
        match found {
            Some(v) => Ok(v.clone()),
            None if self.strict => Err(ViewError::UndefinedVariable(name.to_string())),
            None => Ok(Value::Null),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ViewError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Variable(name) => self.lookup(name),
            Expr::Access { target, key } => {
                let target = self.eval(target)?;
                let key = self.eval(key)?;
                Ok(value::index(&target, &key))
            }
            Expr::Call { name, args } => {
                let args = self.eval_all(args)?;
                self.manager.use_macro(name, &args)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value::truthy(&operand))),
                    UnaryOp::Neg => Ok(value::negate(&operand)?),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, ViewError> {
        match op {
            BinaryOp::Coalesce => match self.eval(lhs) {
                Ok(Value::Null) | Err(ViewError::UndefinedVariable(_)) => self.eval(rhs),
                other => other,
            },
            BinaryOp::And => {
                let result = value::truthy(&self.eval(lhs)?) && value::truthy(&self.eval(rhs)?);
                Ok(Value::Bool(result))
            }
            BinaryOp::Or => {
                let result = value::truthy(&self.eval(lhs)?) || value::truthy(&self.eval(rhs)?);
                Ok(Value::Bool(result))
            }
            _ => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                let result = match op {
                    BinaryOp::Eq => Value::Bool(value::loose_eq(&l, &r)),
                    BinaryOp::NotEq => Value::Bool(!value::loose_eq(&l, &r)),
                    BinaryOp::Identical => Value::Bool(l == r),
                    BinaryOp::NotIdentical => Value::Bool(l != r),
                    BinaryOp::Lt => Value::Bool(value::compare(&l, &r).is_some_and(|o| o.is_lt())),
                    BinaryOp::Le => Value::Bool(value::compare(&l, &r).is_some_and(|o| o.is_le())),
                    BinaryOp::Gt => Value::Bool(value::compare(&l, &r).is_some_and(|o| o.is_gt())),
                    BinaryOp::Ge => Value::Bool(value::compare(&l, &r).is_some_and(|o| o.is_ge())),
                    _ => value::arithmetic(op, &l, &r)?,
                };
                Ok(result)
            }
        }
    }
}
