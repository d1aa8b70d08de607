//! Expression tokenizer and parser.
//!
//! Expressions are a small PHP-flavoured language:
//!
//! ```text
//! $user->name ?? 'guest'
//! count($items) > 0 && !$hidden
//! $first . ' ' . $last
//! $rows[0]['title']
//! ```
//!
//! Parsing uses precedence climbing over [`BinaryOp::precedence`].

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, Expr, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Var(String),
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Op(&'static str),
}

/// Longest spellings first so `===` wins over `==`.
const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "=>", "->", "<", ">", "!", "+", "-",
    "*", "/", "%", ".", "(", ")", "[", "]", ",",
];

fn tokenize(src: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;

    while i < src.len() {
        let c = bytes[i] as char;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c == '$' {
            let len = crate::lexer::identifier_len(&src[i + 1..]);
            if len == 0 {
                return Err("expected a variable name after `$`".to_string());
            }
            tokens.push(Tok::Var(src[i + 1..i + 1 + len].to_string()));
            i += 1 + len;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let len = crate::lexer::identifier_len(&src[i..]);
            tokens.push(Tok::Ident(src[i..i + len].to_string()));
            i += len;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < src.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let is_float = i + 1 < src.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < src.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text = &src[start..i];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number `{}`", text))?;
                tokens.push(Tok::Float(value));
            } else {
                let text = &src[start..i];
                let value = text
                    .parse::<i64>()
                    .map_err(|_| format!("integer out of range `{}`", text))?;
                tokens.push(Tok::Int(value));
            }
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, consumed) = read_string(&src[i..])?;
            tokens.push(Tok::Str(text));
            i += consumed;
            continue;
        }

        match OPERATORS.iter().find(|op| src[i..].starts_with(**op)) {
            Some(op) => {
                tokens.push(Tok::Op(*op));
                i += op.len();
            }
            None => {
                let ch = src[i..].chars().next().unwrap_or(c);
                return Err(format!("unexpected character `{}`", ch));
            }
        }
    }

    Ok(tokens)
}

/// Reads a quoted string at the start of `s`; returns the unescaped text and
/// the number of bytes consumed including both quotes.
fn read_string(s: &str) -> Result<(String, usize), String> {
    let mut chars = s.char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err("expected a string".to_string()),
    };

    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok((out, i + c.len_utf8()));
        }
        if c == '\\' {
            match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, e)) if e == '\\' || e == quote => out.push(e),
                Some((_, e)) => {
                    out.push('\\');
                    out.push(e);
                }
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    Err("unterminated string literal".to_string())
}

/// Deepest expression the parser accepts, counting both tree depth and
/// parenthesis nesting.
pub const MAX_EXPR_DEPTH: usize = 128;

const TOO_DEEP: &str = "expression nested too deeply";

/// An expression and the depth of its tree.
type Parsed = (Expr, usize);

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, String> {
        Ok(Self {
            tokens: tokenize(src)?,
            pos: 0,
            nesting: 0,
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), String> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(format!("expected `{}`{}", op, self.found()))
        }
    }

    fn found(&self) -> String {
        match self.peek() {
            None => ", found end of expression".to_string(),
            Some(tok) => format!(", found {}", describe(tok)),
        }
    }

    fn expect_end(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(format!("unexpected {}", describe(tok))),
        }
    }

    fn peek_binary(&self) -> Option<BinaryOp> {
        let op = match self.peek()? {
            Tok::Op(op) => match *op {
                "??" => BinaryOp::Coalesce,
                "||" => BinaryOp::Or,
                "&&" => BinaryOp::And,
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::NotEq,
                "===" => BinaryOp::Identical,
                "!==" => BinaryOp::NotIdentical,
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::Le,
                ">" => BinaryOp::Gt,
                ">=" => BinaryOp::Ge,
                "." => BinaryOp::Concat,
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Sub,
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                "%" => BinaryOp::Rem,
                _ => return None,
            },
            Tok::Ident(word) => match word.to_ascii_lowercase().as_str() {
                "and" => BinaryOp::And,
                "or" => BinaryOp::Or,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    /// Enters one level of parser recursion.
    fn enter(&mut self) -> Result<(), String> {
        self.nesting += 1;
        if self.nesting > MAX_EXPR_DEPTH {
            return Err(TOO_DEEP.to_string());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    fn parse_expr(&mut self, min_prec: u8) -> Result<Parsed, String> {
        self.enter()?;
        let result = self.parse_binary(min_prec);
        self.leave();
        result
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Parsed, String> {
        let (mut lhs, mut depth) = self.parse_unary()?;

        while let Some(op) = self.peek_binary() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let next_min = if op.is_right_assoc() { prec } else { prec + 1 };
            let (rhs, rhs_depth) = self.parse_expr(next_min)?;
            depth = nested(depth.max(rhs_depth))?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok((lhs, depth))
    }

    fn parse_unary(&mut self) -> Result<Parsed, String> {
        let op = if self.eat_op("!") {
            UnaryOp::Not
        } else if self.eat_op("-") {
            UnaryOp::Neg
        } else {
            return self.parse_postfix();
        };

        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        let (operand, depth) = operand?;
        Ok((
            Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            nested(depth)?,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Parsed, String> {
        let (mut expr, mut depth) = self.parse_primary()?;

        loop {
            if self.eat_op("->") {
                match self.advance() {
                    Some(Tok::Ident(name)) => {
                        depth = nested(depth)?;
                        expr = Expr::Access {
                            target: Box::new(expr),
                            key: Box::new(Expr::Literal(Value::String(name))),
                        };
                    }
                    other => {
                        return Err(format!(
                            "expected a property name after `->`, found {}",
                            other.as_ref().map(describe).unwrap_or_else(|| "end".into())
                        ))
                    }
                }
            } else if self.eat_op("[") {
                let (key, key_depth) = self.parse_expr(0)?;
                self.expect_op("]")?;
                depth = nested(depth.max(key_depth))?;
                expr = Expr::Access {
                    target: Box::new(expr),
                    key: Box::new(key),
                };
            } else {
                return Ok((expr, depth));
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Parsed, String> {
        match self.advance() {
            Some(Tok::Var(name)) => leaf(Expr::Variable(name)),
            Some(Tok::Str(text)) => leaf(Expr::Literal(Value::String(text))),
            Some(Tok::Int(n)) => leaf(Expr::Literal(Value::from(n))),
            Some(Tok::Float(f)) => match Number::from_f64(f) {
                Some(n) => leaf(Expr::Literal(Value::Number(n))),
                None => Err(format!("invalid number `{}`", f)),
            },
            Some(Tok::Ident(name)) => {
                if self.eat_op("(") {
                    let (args, depth) = self.parse_arg_list(")")?;
                    return Ok((Expr::Call { name, args }, nested(depth)?));
                }
                match name.to_ascii_lowercase().as_str() {
                    "true" => leaf(Expr::Literal(Value::Bool(true))),
                    "false" => leaf(Expr::Literal(Value::Bool(false))),
                    "null" => leaf(Expr::Literal(Value::Null)),
                    _ => Err(format!("unknown identifier `{}`", name)),
                }
            }
            Some(Tok::Op("(")) => {
                let inner = self.parse_expr(0)?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Some(tok) => Err(format!("unexpected {}", describe(&tok))),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    /// Parses `a, b, c` up to (and consuming) `close`. Returns the deepest argument's depth.
    fn parse_arg_list(&mut self, close: &str) -> Result<(Vec<Expr>, usize), String> {
        let mut args = Vec::new();
        let mut depth = 0;
        if self.eat_op(close) {
            return Ok((args, depth));
        }
        loop {
            let (arg, arg_depth) = self.parse_expr(0)?;
            args.push(arg);
            depth = depth.max(arg_depth);
            if self.eat_op(close) {
                return Ok((args, depth));
            }
            self.expect_op(",")?;
        }
    }
}

fn leaf(expr: Expr) -> Result<Parsed, String> {
    Ok((expr, 1))
}

/// Depth of a node whose deepest child is `child` levels deep.
fn nested(child: usize) -> Result<usize, String> {
    let depth = child + 1;
    if depth > MAX_EXPR_DEPTH {
        return Err(TOO_DEEP.to_string());
    }
    Ok(depth)
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Var(name) => format!("`${}`", name),
        Tok::Ident(name) => format!("`{}`", name),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Int(n) => format!("`{}`", n),
        Tok::Float(f) => format!("`{}`", f),
        Tok::Op(op) => format!("`{}`", op),
    }
}

/// Parses a single expression.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(src)?;
    let (expr, _) = parser.parse_expr(0)?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses a comma separated argument list (possibly empty).
pub fn parse_args(src: &str) -> Result<Vec<Expr>, String> {
    let mut parser = Parser::new(src)?;
    let mut args = Vec::new();
    if parser.peek().is_none() {
        return Ok(args);
    }
    loop {
        args.push(parser.parse_expr(0)?.0);
        if parser.peek().is_none() {
            return Ok(args);
        }
        parser.expect_op(",")?;
    }
}

/// The pieces of a `@foreach` header.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeachHeader {
    pub subject: Expr,
    pub key: Option<String>,
    pub value: String,
}

/// Parses `$items as $item` or `$items as $key => $item`.
pub fn parse_foreach(src: &str) -> Result<ForeachHeader, String> {
    let mut parser = Parser::new(src)?;
    let (subject, _) = parser.parse_expr(0)?;

    match parser.advance() {
        Some(Tok::Ident(word)) if word.eq_ignore_ascii_case("as") => {}
        other => {
            return Err(format!(
                "expected `as` in @foreach, found {}",
                other.as_ref().map(describe).unwrap_or_else(|| "end".into())
            ))
        }
    }

    let first = match parser.advance() {
        Some(Tok::Var(name)) => name,
        _ => return Err("expected a loop variable after `as`".to_string()),
    };

    let header = if parser.eat_op("=>") {
        match parser.advance() {
            Some(Tok::Var(value)) => ForeachHeader {
                subject,
                key: Some(first),
                value,
            },
            _ => return Err("expected a value variable after `=>`".to_string()),
        }
    } else {
        ForeachHeader {
            subject,
            key: None,
            value: first,
        }
    };

    parser.expect_end()?;
    Ok(header)
}
