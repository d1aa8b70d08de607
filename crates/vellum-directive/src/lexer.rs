//! Template-level tokenizer.
//!
//! Splits template source into literal text and directive markers. Expression
//! text inside markers is left unparsed; [`crate::expr`] handles it.
//!
//! Recognized markers:
//!
//! - `{{-- comment --}}` (dropped)
//! - `{{ expr }}`
//! - `{!! expr !!}`
//! - `@name(args)` for any identifier
//! - `@else`, `@endif`, `@endforeach` without arguments
//! - `@@` for a literal `@`
//!
//! An `@word` that matches none of these is plain text, so addresses like
//! `someone@example.com` pass through untouched.

use crate::error::ParseError;

/// Directives that are valid without an argument list.
const BARE_DIRECTIVES: &[&str] = &["else", "endif", "endforeach"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Echo {
        expr: &'a str,
        offset: usize,
    },
    Raw {
        expr: &'a str,
        offset: usize,
    },
    Directive {
        name: &'a str,
        args: Option<&'a str>,
        offset: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Comment,
    Echo,
    Raw,
    At,
    Escape,
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Reads the marker at the current position.
    ///
    /// Returns `Ok(None)` for markers that produce no token (comments).
    fn lex_marker(&mut self, marker: Marker) -> Result<Option<Token<'a>>, ParseError> {
        let start = self.pos;
        let remaining = &self.input[start..];

        match marker {
            Marker::Comment => {
                let end = remaining[4..]
                    .find("--}}")
                    .ok_or_else(|| ParseError::at(self.input, start, "unterminated comment"))?;
                self.pos = start + 4 + end + 4;
                Ok(None)
            }
            Marker::Echo => {
                let end = find_closing(&remaining[2..], "}}")
                    .ok_or_else(|| ParseError::at(self.input, start, "unterminated `{{`"))?;
                let expr = remaining[2..2 + end].trim();
                if expr.is_empty() {
                    return Err(ParseError::at(self.input, start, "empty `{{ }}`"));
                }
                self.pos = start + 2 + end + 2;
                Ok(Some(Token::Echo {
                    expr,
                    offset: start,
                }))
            }
            Marker::Raw => {
                let end = find_closing(&remaining[3..], "!!}")
                    .ok_or_else(|| ParseError::at(self.input, start, "unterminated `{!!`"))?;
                let expr = remaining[3..3 + end].trim();
                if expr.is_empty() {
                    return Err(ParseError::at(self.input, start, "empty `{!! !!}`"));
                }
                self.pos = start + 3 + end + 3;
                Ok(Some(Token::Raw {
                    expr,
                    offset: start,
                }))
            }
            Marker::Escape => {
                self.pos = start + 2;
                Ok(Some(Token::Text(&remaining[..1])))
            }
            Marker::At => {
                let name_len = identifier_len(&remaining[1..]);
                let name = &remaining[1..1 + name_len];
                let after = 1 + name_len;

                if remaining[after..].starts_with('(') {
                    let close = find_paren_close(&remaining[after + 1..]).ok_or_else(|| {
                        ParseError::at(self.input, start, format!("unclosed `(` after @{}", name))
                    })?;
                    let args = &remaining[after + 1..after + 1 + close];
                    self.pos = start + after + 1 + close + 1;
                    Ok(Some(Token::Directive {
                        name,
                        args: Some(args),
                        offset: start,
                    }))
                } else {
                    self.pos = start + after;
                    Ok(Some(Token::Directive {
                        name,
                        args: None,
                        offset: start,
                    }))
                }
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.input.len() {
                return None;
            }

            let remaining = &self.input[self.pos..];

            match next_marker(remaining) {
                None => {
                    self.pos = self.input.len();
                    return Some(Ok(Token::Text(remaining)));
                }
                Some((idx, _)) if idx > 0 => {
                    self.pos += idx;
                    return Some(Ok(Token::Text(&remaining[..idx])));
                }
                Some((_, marker)) => match self.lex_marker(marker) {
                    Ok(Some(token)) => return Some(Ok(token)),
                    Ok(None) => continue,
                    Err(err) => {
                        // Stop after the first error.
                        self.pos = self.input.len();
                        return Some(Err(err));
                    }
                },
            }
        }
    }
}

/// Finds the first real marker in `s`.
fn next_marker(s: &str) -> Option<(usize, Marker)> {
    for (idx, ch) in s.char_indices() {
        let rest = &s[idx..];
        match ch {
            '{' if rest.starts_with("{{--") => return Some((idx, Marker::Comment)),
            '{' if rest.starts_with("{!!") => return Some((idx, Marker::Raw)),
            '{' if rest.starts_with("{{") => return Some((idx, Marker::Echo)),
            '@' if rest.starts_with("@@") => return Some((idx, Marker::Escape)),
            '@' => {
                let name_len = identifier_len(&rest[1..]);
                if name_len == 0 {
                    continue;
                }
                let name = &rest[1..1 + name_len];
                if rest[1 + name_len..].starts_with('(') || BARE_DIRECTIVES.contains(&name) {
                    return Some((idx, Marker::At));
                }
            }
            _ => {}
        }
    }
    None
}

/// Length in bytes of the identifier at the start of `s` (`[A-Za-z_][A-Za-z0-9_]*`).
pub(crate) fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    for (i, c) in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return i;
        }
    }
    s.len()
}

/// Finds `close` in `s`, skipping over quoted strings.
fn find_closing(s: &str, close: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
        } else if s[i..].starts_with(close) {
            return Some(i);
        }
    }
    None
}

/// Finds the `)` balancing an already consumed `(`, skipping quoted strings.
fn find_paren_close(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
