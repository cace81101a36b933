//! Value coercion and path helpers over `serde_json::Value`.
//!
//! Two distinct truthiness rules exist on purpose: [`is_truthy`] follows the
//! expression language (false, 0, NaN, "", null are falsy), while
//! [`coerce_condition`] adds the conditional-gate string rules where
//! `"false"`, `"0"`, `"null"` and `"undefined"` are also falsy.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Expression-level truthiness.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Conditional-gate truthiness used by `w-if` / `w-elseif`.
pub fn coerce_condition(v: &Value) -> bool {
    match v {
        Value::String(s) => {
            let t = s.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "false" || t == "0" || t == "null" || t == "undefined")
        }
        other => is_truthy(other),
    }
}

/// Numeric view of a value, when one exists.
pub fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                Some(0.0)
            } else {
                t.parse::<f64>().ok()
            }
        }
        Value::Null => Some(0.0),
        _ => None,
    }
}

/// Strict equality: same type, same value. NaN is never equal to itself.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Loose equality: null matches only null, numbers and numeric strings
/// compare numerically, booleans coerce to numbers.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if strict_eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Object(_), _) | (_, Value::Object(_)) => false,
        (Value::Array(_), _) | (_, Value::Array(_)) => false,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Ordering for relational operators; `None` when the operands do not admit
/// a meaningful comparison.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => None,
    }
}

/// Plain-text rendering of a value (the default `text` filter).
pub fn to_display(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Render a float without a trailing `.0` for integral values.
pub fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

pub fn number_value(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Read a nested path; `None` when any segment is missing.
pub fn get_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Write a nested path, materializing intermediate objects the way a hole
/// resolution does: any missing or non-container segment becomes a fresh
/// object.
pub fn set_path(root: &mut Value, path: &[String], value: Value) {
    if path.is_empty() {
        *root = value;
        return;
    }
    if !root.is_object() && !root.is_array() {
        *root = Value::Object(Map::new());
    }
    let mut cur = root;
    for seg in &path[..path.len() - 1] {
        let slot = match cur {
            Value::Object(map) => map.entry(seg.clone()).or_insert(Value::Null),
            Value::Array(items) => {
                let Ok(i) = seg.parse::<usize>() else {
                    return;
                };
                while items.len() <= i {
                    items.push(Value::Null);
                }
                &mut items[i]
            }
            _ => return,
        };
        if !slot.is_object() && !slot.is_array() {
            *slot = Value::Object(Map::new());
        }
        cur = slot;
    }
    let last = &path[path.len() - 1];
    match cur {
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        Value::Array(items) => {
            if let Ok(i) = last.parse::<usize>() {
                while items.len() <= i {
                    items.push(Value::Null);
                }
                items[i] = value;
            }
        }
        _ => {}
    }
}

/// Coerce an arbitrary value into an object map, used for host data roots.
pub fn ensure_object(v: Value) -> Value {
    match v {
        obj @ Value::Object(_) => obj,
        _ => Value::Object(Map::new()),
    }
}
