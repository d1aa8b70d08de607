//! Format-string style substitution.
//!
//! [`SubstitutionEngine`] replaces `{key}` placeholders with the string
//! variable of the same name. It has no logic, no escaping and no layouts.
//!
//! # Rules
//!
//! - `{name}` is replaced when `name` is bound to a string
//! - Placeholders naming numbers, arrays, null or unknown keys are left as written
//! - Substituted text is never scanned again, so a value containing `{other}`
//!   comes out verbatim
//! - A `{` without a matching `}` is plain text

use super::{read_source, Engine};
use crate::context::Context;
use crate::error::ViewError;
use crate::view::{Data, View};

use serde_json::Value;

/// A lightweight engine for `{key}` substitution.
///
/// # Example
///
/// ```rust
/// use vellum_view::SubstitutionEngine;
/// use serde_json::json;
///
/// let data = json!({"name": "World", "count": 3});
/// let out = SubstitutionEngine::substitute(
///     "Hello, {name}! {count}",
///     data.as_object().unwrap(),
/// );
/// assert_eq!(out, "Hello, World! {count}");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstitutionEngine;

impl SubstitutionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Applies the substitution to a template string.
    pub fn substitute(template: &str, data: &Data) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            // The placeholder ends at the next `}` unless another `{` comes first.
            match after.find(['{', '}']) {
                Some(close) if after.as_bytes()[close] == b'}' => {
                    let key = &after[..close];
                    match data.get(key) {
                        Some(Value::String(s)) => result.push_str(s),
                        _ => {
                            result.push('{');
                            result.push_str(key);
                            result.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                Some(next) => {
                    result.push('{');
                    result.push_str(&after[..next]);
                    rest = &after[next..];
                }
                None => {
                    result.push('{');
                    rest = after;
                }
            }
        }

        result.push_str(rest);
        result
    }
}

impl Engine for SubstitutionEngine {
    fn render(&self, view: &View, _cx: &Context<'_>) -> Result<String, ViewError> {
        let template = read_source(view.path())?;
        Ok(Self::substitute(&template, view.data()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Data {
        match value {
            Value::Object(map) => map,
            _ => panic!("test data must be an object"),
        }
    }

    #[test]
    fn test_simple_substitution() {
        let out = SubstitutionEngine::substitute("Hello, {name}!", &data(json!({"name": "World"})));
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn test_multiple_variables() {
        let out = SubstitutionEngine::substitute(
            "{greeting}, {name}!",
            &data(json!({"greeting": "Hi", "name": "Ada"})),
        );
        assert_eq!(out, "Hi, Ada!");
    }

    #[test]
    fn test_non_string_values_left_alone() {
        let out = SubstitutionEngine::substitute(
            "{n} {flag} {list} {nothing}",
            &data(json!({"n": 1, "flag": true, "list": [1], "nothing": null})),
        );
        assert_eq!(out, "{n} {flag} {list} {nothing}");
    }

    #[test]
    fn test_missing_variable() {
        let out = SubstitutionEngine::substitute("Hi {who}", &Data::new());
        assert_eq!(out, "Hi {who}");
    }

    #[test]
    fn test_single_pass() {
        let out = SubstitutionEngine::substitute(
            "{a}",
            &data(json!({"a": "{b}", "b": "nope"})),
        );
        assert_eq!(out, "{b}");
    }

    #[test]
    fn test_no_escaping() {
        let out = SubstitutionEngine::substitute("{html}", &data(json!({"html": "<b>x</b>"})));
        assert_eq!(out, "<b>x</b>");
    }

    #[test]
    fn test_unclosed_brace_is_text() {
        let out = SubstitutionEngine::substitute("a { b {name}", &data(json!({"name": "N"})));
        assert_eq!(out, "a { b N");

        let out = SubstitutionEngine::substitute("tail {", &Data::new());
        assert_eq!(out, "tail {");
    }

    #[test]
    fn test_whitespace_is_part_of_key() {
        let out = SubstitutionEngine::substitute("{ name }", &data(json!({"name": "N"})));
        assert_eq!(out, "{ name }");
    }

    #[test]
    fn test_stray_closing_brace() {
        let out = SubstitutionEngine::substitute("} {x} }", &data(json!({"x": "y"})));
        assert_eq!(out, "} y }");
    }

    #[test]
    fn test_plain_text() {
        let out = SubstitutionEngine::substitute("no placeholders here", &Data::new());
        assert_eq!(out, "no placeholders here");
    }
}
