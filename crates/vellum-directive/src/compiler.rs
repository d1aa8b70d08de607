//! Token stream to [`Program`].
//!
//! Reserved directives (`extends`, `if`, `elseif`, `else`, `endif`,
//! `foreach`, `endforeach`) are matched before anything else; every other
//! `@name(...)` becomes a [`Node::Macro`].

use crate::ast::{Branch, Expr, Node, Program};
use crate::error::ParseError;
use crate::expr::{self, ForeachHeader};
use crate::lexer::{Lexer, Token};

/// A directive that ended a nested block.
struct Closer<'a> {
    name: &'a str,
    args: Option<&'a str>,
    offset: usize,
}

/// Deepest `@if`/`@foreach` nesting a template may use.
pub const MAX_BLOCK_DEPTH: usize = 32;

pub(crate) struct Compiler<'a> {
    source: &'a str,
    tokens: Lexer<'a>,
    depth: usize,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Lexer::new(source),
            depth: 0,
        }
    }

    pub(crate) fn compile(mut self) -> Result<Program, ParseError> {
        let (nodes, _) = self.parse_block(&[], None)?;
        Ok(Program::new(merge_text(nodes)))
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(self.source, offset, message)
    }

    /// Parses nodes until one of `closers` (or end of input when empty).
    ///
    /// `opened` names the block being parsed and where it started, for the
    /// "unclosed" error.
    fn parse_block(
        &mut self,
        closers: &[&str],
        opened: Option<(&str, usize)>,
    ) -> Result<(Vec<Node>, Option<Closer<'a>>), ParseError> {
        let Some((block, offset)) = opened else {
            return self.parse_nodes(closers, None);
        };
        if self.depth >= MAX_BLOCK_DEPTH {
            return Err(self.error(offset, format!("@{} blocks nested too deeply", block)));
        }
        self.depth += 1;
        let result = self.parse_nodes(closers, opened);
        self.depth -= 1;
        result
    }

    fn parse_nodes(
        &mut self,
        closers: &[&str],
        opened: Option<(&str, usize)>,
    ) -> Result<(Vec<Node>, Option<Closer<'a>>), ParseError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.next() {
            match token? {
                Token::Text(text) => nodes.push(Node::Text(text.to_string())),
                Token::Echo { expr, offset } => {
                    nodes.push(Node::Escaped(self.expression(expr, offset)?));
                }
                Token::Raw { expr, offset } => {
                    nodes.push(Node::Raw(self.expression(expr, offset)?));
                }
                Token::Directive { name, args, offset } => {
                    if closers.contains(&name) {
                        return Ok((merge_text(nodes), Some(Closer { name, args, offset })));
                    }
                    nodes.push(self.directive(name, args, offset)?);
                }
            }
        }

        match opened {
            Some((block, offset)) => Err(self.error(
                offset,
                format!("unclosed @{} (expected @{})", block, closers.join(" or @")),
            )),
            None => Ok((nodes, None)),
        }
    }

    fn directive(
        &mut self,
        name: &'a str,
        args: Option<&'a str>,
        offset: usize,
    ) -> Result<Node, ParseError> {
        match (name, args) {
            ("extends", Some(args)) => Ok(Node::Extends(self.expression(args, offset)?)),
            ("if", Some(args)) => {
                let condition = self.expression(args, offset)?;
                self.parse_if(condition, offset)
            }
            ("foreach", Some(args)) => {
                let ForeachHeader {
                    subject,
                    key,
                    value,
                } = expr::parse_foreach(args).map_err(|msg| self.error(offset, msg))?;
                let (body, _) = self.parse_block(&["endforeach"], Some(("foreach", offset)))?;
                Ok(Node::Foreach {
                    subject,
                    key,
                    value,
                    body,
                })
            }
            ("elseif" | "else" | "endif" | "endforeach", _) => {
                Err(self.error(offset, format!("unexpected @{}", name)))
            }
            ("extends" | "if" | "foreach", None) => {
                Err(self.error(offset, format!("@{} requires an argument", name)))
            }
            (_, Some(args)) => {
                let args = expr::parse_args(args)
                    .map_err(|msg| self.error(offset, format!("in @{}: {}", name, msg)))?;
                Ok(Node::Macro {
                    name: name.to_string(),
                    args,
                })
            }
            (_, None) => Err(self.error(offset, format!("@{} requires an argument list", name))),
        }
    }

    fn parse_if(
        &mut self,
        condition: Expr,
        offset: usize,
    ) -> Result<Node, ParseError> {
        let mut branches = Vec::new();
        let mut condition = condition;

        loop {
            let (body, closer) =
                self.parse_block(&["elseif", "else", "endif"], Some(("if", offset)))?;
            branches.push(Branch { condition, body });

            // parse_block only returns without a closer at top level.
            let Some(closer) = closer else {
                return Err(self.error(offset, "unclosed @if"));
            };

            match closer.name {
                "elseif" => {
                    let args = closer
                        .args
                        .ok_or_else(|| self.error(closer.offset, "@elseif requires an argument"))?;
                    condition = self.expression(args, closer.offset)?;
                }
                "else" => {
                    let (otherwise, _) = self.parse_block(&["endif"], Some(("else", closer.offset)))?;
                    return Ok(Node::If {
                        branches,
                        otherwise: Some(otherwise),
                    });
                }
                _ => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                    })
                }
            }
        }
    }

    fn expression(&self, src: &str, offset: usize) -> Result<Expr, ParseError> {
        expr::parse_expr(src).map_err(|msg| self.error(offset, msg))
    }
}

/// Joins adjacent text nodes, which the lexer splits around `@@` escapes.
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Node::Text(next) = &node {
            if let Some(Node::Text(prev)) = merged.last_mut() {
                prev.push_str(next);
                continue;
            }
        }
        merged.push(node);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;
    use serde_json::json;

    fn compile(src: &str) -> Result<Program, ParseError> {
        Compiler::new(src).compile()
    }

    #[test]
    fn text_only() {
        let program = compile("just text").unwrap();
        assert_eq!(program.nodes, vec![Node::Text("just text".into())]);
    }

    #[test]
    fn if_elseif_else() {
        let program = compile("@if($a)A@elseif($b)B@else C@endif").unwrap();
        let Node::If {
            branches,
            otherwise,
        } = &program.nodes[0]
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].condition, Expr::Variable("a".into()));
        assert_eq!(branches[1].body, vec![Node::Text("B".into())]);
        assert_eq!(otherwise.as_deref(), Some(&[Node::Text(" C".into())][..]));
    }

    #[test]
    fn foreach_body() {
        let program = compile("@foreach($xs as $x){{ $x }},@endforeach").unwrap();
        assert_eq!(
            program.nodes,
            vec![Node::Foreach {
                subject: Expr::Variable("xs".into()),
                key: None,
                value: "x".into(),
                body: vec![
                    Node::Escaped(Expr::Variable("x".into())),
                    Node::Text(",".into())
                ],
            }]
        );
    }

    #[test]
    fn generic_macro() {
        let program = compile("@route('home', $id)").unwrap();
        assert_eq!(
            program.nodes,
            vec![Node::Macro {
                name: "route".into(),
                args: vec![Expr::Literal(json!("home")), Expr::Variable("id".into())],
            }]
        );
    }

    #[test]
    fn reserved_words_win_over_macros() {
        let program = compile("@extends('layout')").unwrap();
        assert_eq!(
            program.nodes,
            vec![Node::Extends(Expr::Literal(json!("layout")))]
        );
    }

    #[test]
    fn raw_and_escaped_are_distinct() {
        let program = compile("{{ $a }}{!! $a !!}").unwrap();
        assert!(matches!(program.nodes[0], Node::Escaped(_)));
        assert!(matches!(program.nodes[1], Node::Raw(_)));
    }

    #[test]
    fn escaped_at_merges_into_text() {
        let program = compile("a @@if(x) b").unwrap();
        assert_eq!(program.nodes, vec![Node::Text("a @if(x) b".into())]);
    }

    #[test]
    fn nested_blocks() {
        let program =
            compile("@foreach($rows as $r)@if($r->on && $r->n > 1)y@endif@endforeach").unwrap();
        let Node::Foreach { body, .. } = &program.nodes[0] else {
            panic!("expected foreach");
        };
        let Node::If { branches, .. } = &body[0] else {
            panic!("expected if");
        };
        assert!(matches!(
            branches[0].condition,
            Expr::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn unclosed_if_reports_opening_line() {
        let err = compile("line1\n@if($a)\nbody").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unclosed @if"));
    }

    #[test]
    fn stray_endif_is_an_error() {
        let err = compile("x@endif").unwrap_err();
        assert!(err.message.contains("unexpected @endif"));
    }

    #[test]
    fn endforeach_cannot_close_if() {
        assert!(compile("@if($a)x@endforeach").is_err());
    }

    #[test]
    fn bad_expression_reports_line() {
        let err = compile("a\nb\n{{ $x + }}").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn deep_block_nesting_is_rejected() {
        let depth = 200;
        let src = format!("{}x{}", "@if($a)".repeat(depth), "@endif".repeat(depth));
        let err = compile(&src).unwrap_err();
        assert!(err.message.contains("nested too deeply"), "{}", err.message);
    }

    #[test]
    fn nesting_up_to_limit_compiles() {
        let src = format!(
            "{}x{}",
            "@foreach($xs as $x)".repeat(MAX_BLOCK_DEPTH),
            "@endforeach".repeat(MAX_BLOCK_DEPTH)
        );
        assert!(compile(&src).is_ok());
    }

    #[test]
    fn sibling_blocks_do_not_accumulate_depth() {
        let src = "@if($a)x@endif".repeat(MAX_BLOCK_DEPTH * 2);
        assert!(compile(&src).is_ok());
    }
}
