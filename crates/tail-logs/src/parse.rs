//! Parsing of raw input lines into log objects.

use serde_json::Value;

use crate::error::{LogError, Result};
use crate::types::JsonObject;

/// Parses one input line as a JSON object.
///
/// Trailing line terminators are ignored. Lines that are not JSON, or JSON
/// that is not an object, are rejected; the caller passes those through
/// untouched.
///
/// # Errors
///
/// Returns [`LogError::Serialization`] for invalid JSON and
/// [`LogError::NotAnObject`] for non-object JSON values.
pub fn parse_line(line: &str) -> Result<JsonObject> {
    let line = line.trim_end_matches(['\r', '\n']);
    match serde_json::from_str::<Value>(line)? {
        Value::Object(object) => Ok(object),
        other => Err(LogError::NotAnObject(kind(&other))),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn parse_object_line() {
        let object = parse_line("{\"level\":\"INFO\",\"n\":1}\r\n").unwrap();
        assert_eq!(object["level"], "INFO");
        assert_eq!(object["n"], 1);
    }

    #[test_case("[1,2]", "array" ; "array")]
    #[test_case("\"hello\"", "string" ; "string")]
    #[test_case("12", "number" ; "number")]
    #[test_case("null", "null" ; "null")]
    fn parse_rejects_non_objects(line: &str, expected_kind: &str) {
        match parse_line(line) {
            Err(LogError::NotAnObject(kind)) => assert_eq!(kind, expected_kind),
            other => panic!("expected NotAnObject, got {other:?}"),
        }
    }

    #[test_case("" ; "empty")]
    #[test_case("plain text line" ; "plain text")]
    #[test_case("{\"unterminated\": " ; "truncated object")]
    fn parse_rejects_invalid_json(line: &str) {
        assert!(matches!(parse_line(line), Err(LogError::Serialization(_))));
    }
}
