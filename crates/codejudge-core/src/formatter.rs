//! Argument Formatter
//!
//! Turns one example's JSON input plus its key order into the literal argument
//! list of a positional Go call, and its single-key expected output object into
//! a Go literal. Everything here is pure; every failure is a returned
//! [`FormatError`].

use codejudge_types::ProblemExample;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::errors::FormatError;
use crate::value::ArgValue;

/// One example ready to be rendered into a harness check.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub example_id: i64,
    /// Raw JSON input, echoed back in failure details.
    pub input: String,
    /// Comma separated Go literals, in key order.
    pub args: String,
    /// Go literal of the expected value.
    pub expected: String,
}

/// Decodes an example's `input_order` JSON array.
pub fn parse_key_order(input_order: &str) -> Result<Vec<String>, FormatError> {
    serde_json::from_str(input_order).map_err(|e| FormatError::invalid_json("input_order", e))
}

/// Formats `input` (a JSON object) as positional arguments following `key_order`.
///
/// `key_order` must be exactly a permutation of the input's field names: a key
/// absent from the input, a key listed twice, or an input field left out of
/// the order all yield [`FormatError::MissingKey`].
pub fn format_args(input: &str, key_order: &[String]) -> Result<String, FormatError> {
    let args: Map<String, Value> =
        serde_json::from_str(input).map_err(|e| FormatError::invalid_json("input", e))?;

    let mut unconsumed: BTreeSet<&str> = args.keys().map(String::as_str).collect();
    let mut formatted = Vec::with_capacity(key_order.len());
    for key in key_order {
        let value = args
            .get(key)
            .filter(|_| unconsumed.remove(key.as_str()))
            .ok_or_else(|| FormatError::MissingKey(key.clone()))?;
        let literal = ArgValue::decode(value)
            .and_then(|v| v.to_go_literal())
            .map_err(|e| match e {
                FormatError::UnsupportedType(what) => {
                    FormatError::UnsupportedType(format!("{} (key {})", what, key))
                }
                other => other,
            })?;
        formatted.push(literal);
    }

    if let Some(unlisted) = unconsumed.into_iter().next() {
        return Err(FormatError::MissingKey(unlisted.to_string()));
    }

    Ok(formatted.join(", "))
}

/// Formats the single value of an expected-output object.
pub fn format_expected_output(output: &str) -> Result<String, FormatError> {
    let result: Map<String, Value> = serde_json::from_str(output)
        .map_err(|e| FormatError::invalid_json("expected_output", e))?;

    let mut values = result.iter();
    match (values.next(), values.next()) {
        (None, _) => Err(FormatError::EmptyExpectedOutput),
        (Some((_, value)), None) => ArgValue::decode(value)?.to_go_literal(),
        (Some(_), Some(_)) => Err(FormatError::AmbiguousExpectedOutput(
            result.keys().cloned().collect(),
        )),
    }
}

/// Formats both sides of one example.
pub fn prepare_call(example: &ProblemExample) -> Result<PreparedCall, FormatError> {
    let key_order = parse_key_order(&example.input_order)?;
    let args = format_args(&example.input, &key_order)?;
    let expected = format_expected_output(&example.expected_output)?;
    Ok(PreparedCall {
        example_id: example.id,
        input: example.input.clone(),
        args,
        expected,
    })
}
