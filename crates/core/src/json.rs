//! Deterministic JSON rendering.
//!
//! Object keys are emitted in ascending lexical order at every depth, no
//! matter how the underlying map orders them, so identical content always
//! renders to identical bytes. Arrays keep their order.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::model::Report;

const INDENT: &str = "  ";

pub fn serialize_report(report: &Report, pretty: bool) -> Result<String> {
    to_stable_json(report, pretty)
}

pub fn to_stable_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(to_stable_string(&value, pretty))
}

pub fn to_stable_string(value: &Value, pretty: bool) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0, pretty);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize, pretty: bool) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(text) => write_string(out, text),
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                newline_indent(out, depth + 1, pretty);
                write_value(out, item, depth + 1, pretty);
            }
            newline_indent(out, depth, pretty);
            out.push(']');
        }
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                newline_indent(out, depth + 1, pretty);
                write_string(out, key);
                out.push_str(if pretty { ": " } else { ":" });
                write_value(out, item, depth + 1, pretty);
            }
            newline_indent(out, depth, pretty);
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, text: &str) {
    // Serializing a str through serde_json cannot fail.
    match serde_json::to_string(text) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}

fn newline_indent(out: &mut String, depth: usize, pretty: bool) {
    if pretty {
        out.push('\n');
        for _ in 0..depth {
            out.push_str(INDENT);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{to_stable_json, to_stable_string};

    #[test]
    fn sorts_keys_at_every_depth() {
        let value = json!({ "z": 1, "a": { "y": 2, "b": 3 }, "m": 4 });
        assert_eq!(
            to_stable_string(&value, false),
            r#"{"a":{"b":3,"y":2},"m":4,"z":1}"#
        );
    }

    #[test]
    fn arrays_keep_caller_order() {
        let value = json!({ "list": [3, 1, { "b": 1, "a": 2 }] });
        assert_eq!(
            to_stable_string(&value, false),
            r#"{"list":[3,1,{"a":2,"b":1}]}"#
        );
    }

    #[test]
    fn pretty_output_uses_two_space_indent() {
        let value = json!({ "b": [1, 2], "a": {}, "c": [] });
        let expected = "{\n  \"a\": {},\n  \"b\": [\n    1,\n    2\n  ],\n  \"c\": []\n}";
        assert_eq!(to_stable_string(&value, true), expected);
    }

    #[test]
    fn non_finite_floats_render_as_null() {
        let out = to_stable_json(&vec![f64::NAN, f64::INFINITY, 0.5], false)
            .expect("floats serialize");
        assert_eq!(out, "[null,null,0.5]");
    }

    #[test]
    fn compact_and_pretty_parse_to_same_value_and_are_stable() {
        let value = json!({ "k": "line\nbreak \"quoted\"", "n": [1.5, -2, null], "t": true });
        let compact = to_stable_string(&value, false);
        let pretty = to_stable_string(&value, true);

        let from_compact: Value = serde_json::from_str(&compact).expect("compact parses");
        let from_pretty: Value = serde_json::from_str(&pretty).expect("pretty parses");
        assert_eq!(from_compact, from_pretty);
        assert_eq!(to_stable_string(&from_compact, false), compact);
        assert_eq!(to_stable_string(&from_pretty, true), pretty);
    }
}
