//! Value semantics of the directive language.
//!
//! Templates operate on [`serde_json::Value`]. These helpers define how values
//! are tested for truth, printed, indexed, compared and combined. The rules
//! are loosely PHP-like: empty strings, `"0"`, zero, null and empty
//! collections are falsy, and numeric strings take part in arithmetic.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::ast::BinaryOp;
use crate::error::ValueError;

/// Truthiness used by `@if`, `!`, `&&` and `||`.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Formats a value for output.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For arrays and objects, use JSON representation
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Short type name, used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Looks up `key` in `target`. Missing keys and non-container targets yield null.
pub fn index(target: &Value, key: &Value) -> Value {
    match (target, key) {
        (Value::Object(map), Value::String(k)) => map.get(k).cloned().unwrap_or(Value::Null),
        (Value::Object(map), Value::Number(n)) => {
            map.get(&n.to_string()).cloned().unwrap_or(Value::Null)
        }
        (Value::Array(items), key) => as_index(key)
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn as_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Numeric view of a value, if it has one.
fn as_number(value: &Value) -> Option<Num> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Num::Int(i)),
            None => n.as_f64().map(Num::Float),
        },
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Null => Some(Num::Int(0)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Num::Int(i))
            } else {
                s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Num::Float)
            }
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::from(i),
            Num::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

/// Loose equality (`==`): numeric when both sides are numeric, otherwise by
/// printed form for scalars and structurally for collections.
pub fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    let is_numeric = |v: &Value| match v {
        Value::Number(_) => true,
        Value::String(_) => as_number(v).is_some(),
        _ => false,
    };
    if is_numeric(lhs) && is_numeric(rhs) {
        if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
            return a.as_f64() == b.as_f64();
        }
    }
    match (lhs, rhs) {
        (Value::Null, other) | (other, Value::Null) => !truthy(other),
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == truthy(other),
        (Value::Array(_), _) | (Value::Object(_), _) => lhs == rhs,
        _ => display(lhs) == display(rhs),
    }
}

/// Ordering used by `<`, `<=`, `>`, `>=`. `None` when the values don't compare.
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => match (as_number(lhs), as_number(rhs)) {
            (Some(x), Some(y)) => x.as_f64().partial_cmp(&y.as_f64()),
            _ => Some(a.cmp(b)),
        },
        _ => {
            let a = as_number(lhs)?;
            let b = as_number(rhs)?;
            a.as_f64().partial_cmp(&b.as_f64())
        }
    }
}

/// Applies an arithmetic or concatenation operator.
///
/// Logical and comparison operators are evaluated by the interpreter, which
/// needs short-circuiting; passing one here is reported as an operand error.
pub fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    if op == BinaryOp::Concat {
        return Ok(Value::String(format!("{}{}", display(lhs), display(rhs))));
    }

    let operand_error = || ValueError::Operand {
        op: op.symbol(),
        lhs: type_name(lhs),
        rhs: type_name(rhs),
    };

    let (a, b) = match (as_number(lhs), as_number(rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(operand_error()),
    };

    let result = match (op, a, b) {
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => x.checked_add(y).map(Num::Int),
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => x.checked_sub(y).map(Num::Int),
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => x.checked_mul(y).map(Num::Int),
        (BinaryOp::Div, _, _) | (BinaryOp::Rem, _, _) if b.as_f64() == 0.0 => {
            return Err(ValueError::DivisionByZero)
        }
        (BinaryOp::Div, Num::Int(x), Num::Int(y)) if x.checked_rem(y) == Some(0) => {
            x.checked_div(y).map(Num::Int)
        }
        (BinaryOp::Rem, Num::Int(x), Num::Int(y)) => x.checked_rem(y).map(Num::Int),
        (BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem, _, _) => {
            None
        }
        _ => return Err(operand_error()),
    };

    let result = match result {
        Some(n) => n,
        None => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Num::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                _ => x % y,
            })
        }
    };

    Ok(result.into_value())
}

/// Negation for unary `-`.
pub fn negate(value: &Value) -> Result<Value, ValueError> {
    match as_number(value) {
        Some(Num::Int(i)) => Ok(i
            .checked_neg()
            .map(Num::Int)
            .unwrap_or(Num::Float(-(i as f64)))
            .into_value()),
        Some(Num::Float(f)) => Ok(Num::Float(-f).into_value()),
        None => Err(ValueError::Operand {
            op: "-",
            lhs: "nothing",
            rhs: type_name(value),
        }),
    }
}

/// Entries a `@foreach` walks: `(key, value)` pairs in source order.
///
/// Returns `None` when the value is not iterable. Null iterates as empty.
pub fn entries(value: &Value) -> Option<Vec<(Value, Value)>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
        ),
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!("0")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!([])));
        assert!(!truthy(&json!({})));
        assert!(truthy(&json!("false")));
        assert!(truthy(&json!([0])));
        assert!(truthy(&json!(-1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(display(&json!("x")), "x");
        assert_eq!(display(&json!(42)), "42");
        assert_eq!(display(&json!(null)), "");
        assert_eq!(display(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_index() {
        let data = json!({"a": {"b": [10, 20]}, "1": "one"});
        assert_eq!(index(&data, &json!("a")), json!({"b": [10, 20]}));
        assert_eq!(index(&index(&data["a"], &json!("b")), &json!(1)), json!(20));
        assert_eq!(index(&data, &json!(1)), json!("one"));
        assert_eq!(index(&data, &json!("missing")), json!(null));
        assert_eq!(index(&json!("str"), &json!(0)), json!(null));
    }

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!(1), &json!("1")));
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(loose_eq(&json!(null), &json!("")));
        assert!(loose_eq(&json!(true), &json!("yes")));
        assert!(!loose_eq(&json!("a"), &json!("b")));
        assert!(loose_eq(&json!([1]), &json!([1])));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare(&json!("2"), &json!("10")), Some(Ordering::Less));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare(&json!([1]), &json!(1)), None);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(arithmetic(BinaryOp::Add, &json!(2), &json!(3)).unwrap(), json!(5));
        assert_eq!(arithmetic(BinaryOp::Add, &json!("2"), &json!(0.5)).unwrap(), json!(2.5));
        assert_eq!(arithmetic(BinaryOp::Div, &json!(6), &json!(3)).unwrap(), json!(2));
        assert_eq!(arithmetic(BinaryOp::Div, &json!(7), &json!(2)).unwrap(), json!(3.5));
        assert_eq!(arithmetic(BinaryOp::Rem, &json!(7), &json!(4)).unwrap(), json!(3));
        assert_eq!(
            arithmetic(BinaryOp::Concat, &json!("a"), &json!(1)).unwrap(),
            json!("a1")
        );
        assert_eq!(
            arithmetic(BinaryOp::Div, &json!(1), &json!(0)),
            Err(ValueError::DivisionByZero)
        );
        assert!(arithmetic(BinaryOp::Mul, &json!([1]), &json!(2)).is_err());
    }

    #[test]
    fn test_negate() {
        assert_eq!(negate(&json!(3)).unwrap(), json!(-3));
        assert_eq!(negate(&json!("1.5")).unwrap(), json!(-1.5));
        assert!(negate(&json!({})).is_err());
    }

    #[test]
    fn test_entries() {
        assert_eq!(entries(&json!(null)).unwrap().len(), 0);
        let pairs = entries(&json!({"b": 1, "a": 2})).unwrap();
        assert_eq!(pairs[0].0, json!("b"));
        assert_eq!(pairs[1].1, json!(2));
        assert!(entries(&json!(5)).is_none());
    }
}
