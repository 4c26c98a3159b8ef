//! Tagged argument values decoded from example JSON, and their Go literals.

use serde_json::Value;
use std::fmt::Write;

use crate::errors::FormatError;

/// A JSON value the harness knows how to pass to a Go function.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Array(Vec<ArgValue>),
}

impl ArgValue {
    /// Decodes a JSON value. Numbers without a fractional part that fit in
    /// an `i64` become `Int`, so `2.0` and `2` render the same.
    pub fn decode(value: &Value) -> Result<Self, FormatError> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(ArgValue::Int(i));
                }
                let f = n
                    .as_f64()
                    .ok_or_else(|| FormatError::UnsupportedType(format!("number {}", n)))?;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Ok(ArgValue::Int(f as i64))
                } else {
                    Ok(ArgValue::Float(f))
                }
            }
            Value::String(s) => Ok(ArgValue::Str(s.clone())),
            Value::Bool(b) => Ok(ArgValue::Bool(*b)),
            Value::Array(items) => items
                .iter()
                .map(ArgValue::decode)
                .collect::<Result<Vec<_>, _>>()
                .map(ArgValue::Array),
            Value::Object(_) => Err(FormatError::UnsupportedType("object".to_string())),
            Value::Null => Err(FormatError::UnsupportedType("null".to_string())),
        }
    }

    /// Go type of this value. Arrays infer their element type.
    pub fn go_type(&self) -> Result<String, FormatError> {
        Ok(GoType::of(self)?.to_string())
    }

    /// Go literal for this value.
    pub fn to_go_literal(&self) -> Result<String, FormatError> {
        match self {
            ArgValue::Int(i) => Ok(i.to_string()),
            ArgValue::Float(f) => Ok(format_float(*f)),
            ArgValue::Str(s) => Ok(quote_go_string(s)),
            ArgValue::Bool(b) => Ok(b.to_string()),
            ArgValue::Array(items) => {
                let elem_type = element_type(items)?;
                let elements = items
                    .iter()
                    .map(|item| item.to_element_literal())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("[]{}{{{}}}", elem_type, elements.join(", ")))
            }
        }
    }

    // Inside a composite literal Go allows eliding nested element types, so
    // [][]int{{1, 2}, {3}} is emitted instead of repeating []int per row.
    fn to_element_literal(&self) -> Result<String, FormatError> {
        match self {
            ArgValue::Array(items) => {
                element_type(items)?;
                let elements = items
                    .iter()
                    .map(|item| item.to_element_literal())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{{{}}}", elements.join(", ")))
            }
            other => other.to_go_literal(),
        }
    }
}

/// Inferred Go type. `Unknown` is the element type of an empty array; it
/// takes the type of its siblings and renders as `int` when none constrain it.
#[derive(Debug, Clone, PartialEq)]
enum GoType {
    Int,
    Float64,
    Str,
    Bool,
    Slice(Box<GoType>),
    Unknown,
}

impl GoType {
    fn of(value: &ArgValue) -> Result<Self, FormatError> {
        match value {
            ArgValue::Int(_) => Ok(GoType::Int),
            ArgValue::Float(_) => Ok(GoType::Float64),
            ArgValue::Str(_) => Ok(GoType::Str),
            ArgValue::Bool(_) => Ok(GoType::Bool),
            ArgValue::Array(items) => Ok(GoType::Slice(Box::new(element_of(items)?))),
        }
    }

    /// Common type of two siblings. Ints widen to float64 at any depth.
    fn unify(self, other: GoType) -> Result<Self, FormatError> {
        match (self, other) {
            (GoType::Unknown, t) | (t, GoType::Unknown) => Ok(t),
            (GoType::Int, GoType::Float64) | (GoType::Float64, GoType::Int) => Ok(GoType::Float64),
            (GoType::Slice(a), GoType::Slice(b)) => Ok(GoType::Slice(Box::new(a.unify(*b)?))),
            (a, b) if a == b => Ok(a),
            (a, b) => Err(FormatError::UnsupportedType(format!(
                "array mixing {} and {}",
                a, b
            ))),
        }
    }
}

impl std::fmt::Display for GoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoType::Int | GoType::Unknown => f.write_str("int"),
            GoType::Float64 => f.write_str("float64"),
            GoType::Str => f.write_str("string"),
            GoType::Bool => f.write_str("bool"),
            GoType::Slice(inner) => write!(f, "[]{}", inner),
        }
    }
}

fn element_of(items: &[ArgValue]) -> Result<GoType, FormatError> {
    items
        .iter()
        .try_fold(GoType::Unknown, |acc, item| acc.unify(GoType::of(item)?))
}

fn element_type(items: &[ArgValue]) -> Result<String, FormatError> {
    Ok(element_of(items)?.to_string())
}

fn format_float(f: f64) -> String {
    if f.is_finite() {
        // Display gives the shortest representation that round-trips.
        let s = f.to_string();
        if s.contains('.') || s.contains('e') {
            s
        } else {
            format!("{}.0", s)
        }
    } else {
        // JSON cannot carry these, but keep the output valid Go anyway.
        "0.0".to_string()
    }
}

/// Go interpreted string literal with the escapes `%q` would produce for
/// control characters. Printable Unicode passes through unchanged.
pub fn quote_go_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn literal(value: Value) -> Result<String, FormatError> {
        ArgValue::decode(&value)?.to_go_literal()
    }

    #[test]
    fn test_integral_numbers_decode_as_int() {
        assert_eq!(ArgValue::decode(&json!(7)).unwrap(), ArgValue::Int(7));
        assert_eq!(ArgValue::decode(&json!(2.0)).unwrap(), ArgValue::Int(2));
        assert_eq!(ArgValue::decode(&json!(-3)).unwrap(), ArgValue::Int(-3));
        assert_eq!(ArgValue::decode(&json!(42.5)).unwrap(), ArgValue::Float(42.5));
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(literal(json!(42.5)).unwrap(), "42.5");
        assert_eq!(literal(json!("hello")).unwrap(), "\"hello\"");
        assert_eq!(literal(json!(true)).unwrap(), "true");
        assert_eq!(literal(json!(30)).unwrap(), "30");
    }

    #[test]
    fn test_unsupported_types() {
        assert!(matches!(
            literal(json!({"nested": "value"})),
            Err(FormatError::UnsupportedType(_))
        ));
        assert!(matches!(literal(json!(null)), Err(FormatError::UnsupportedType(_))));
        assert!(matches!(
            literal(json!([1, "two"])),
            Err(FormatError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_array_element_type_inference() {
        assert_eq!(literal(json!([1, 2, 3])).unwrap(), "[]int{1, 2, 3}");
        assert_eq!(literal(json!([1, 2.5])).unwrap(), "[]float64{1, 2.5}");
        assert_eq!(literal(json!([])).unwrap(), "[]int{}");
        assert_eq!(literal(json!(["a", "b"])).unwrap(), "[]string{\"a\", \"b\"}");
        assert_eq!(literal(json!([true, false])).unwrap(), "[]bool{true, false}");
    }

    #[test]
    fn test_nested_arrays() {
        assert_eq!(literal(json!([[1, 2], [3]])).unwrap(), "[][]int{{1, 2}, {3}}");
        assert_eq!(
            literal(json!([[1, 2], [3.5]])).unwrap(),
            "[][]float64{{1, 2}, {3.5}}"
        );
        assert!(literal(json!([[1], ["x"]])).is_err());
    }

    #[test]
    fn test_empty_rows_take_their_siblings_type() {
        assert_eq!(literal(json!([["a"], []])).unwrap(), "[][]string{{\"a\"}, {}}");
        assert_eq!(literal(json!([[], [true]])).unwrap(), "[][]bool{{}, {true}}");
        assert_eq!(literal(json!([[], []])).unwrap(), "[][]int{{}, {}}");
        assert_eq!(
            literal(json!([[[]], [["x"]]])).unwrap(),
            "[][][]string{{{}}, {{\"x\"}}}"
        );
        assert_eq!(
            ArgValue::decode(&json!([[], [1.5]])).unwrap().go_type().unwrap(),
            "[][]float64"
        );
        assert!(matches!(
            literal(json!([["a"], [], [1]])),
            Err(FormatError::UnsupportedType(msg)) if msg == "array mixing string and int"
        ));
    }

    #[test]
    fn test_go_string_escaping() {
        assert_eq!(quote_go_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_go_string("line\nnext"), "\"line\\nnext\"");
        assert_eq!(quote_go_string("back\\slash"), "\"back\\\\slash\"");
        assert_eq!(quote_go_string("\u{1}"), "\"\\x01\"");
        assert_eq!(quote_go_string("héllo"), "\"héllo\"");
    }

    #[test]
    fn test_large_float_keeps_decimal_point() {
        assert_eq!(format_float(1e300), format!("{}.0", 1e300f64));
        assert_eq!(format_float(0.1), "0.1");
    }
}
