//! Custom Tera filters for emitting JSON query bodies.

use std::collections::HashMap;

use tera::{Result, Value};

/// Escape a string for embedding inside a JSON string literal.
pub(crate) fn json_escape(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("json_escape filter expects a string"))?;
    let quoted = serde_json::to_string(s).map_err(tera::Error::json)?;
    Ok(Value::String(quoted[1..quoted.len() - 1].to_string()))
}

/// Render any value as a JSON literal; strings come out quoted.
pub(crate) fn json_literal(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let literal = serde_json::to_string(value).map_err(tera::Error::json)?;
    Ok(Value::String(literal))
}
