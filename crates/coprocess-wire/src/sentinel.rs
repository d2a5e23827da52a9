//! The cooperative stop convention
//!
//! A compliant child exits when it receives `STOP` in whatever encoding the
//! stream uses. The host never depends on this; it only tolerates the end of
//! stream that follows.

use serde_json::{Value, json};

/// The stop payload.
pub const STOP: &str = "STOP";

/// True when a text line asks the child to stop.
///
/// Accepts the bare word, the JSON string `"STOP"` and a JSON object whose
/// `cmd` field is `"STOP"`.
pub fn is_stop_line(line: &str) -> bool {
    let line = line.trim();
    if line == STOP {
        return true;
    }
    match serde_json::from_str::<Value>(line) {
        Ok(value) => is_stop_value(&value),
        Err(_) => false,
    }
}

/// True when a decoded value asks the child to stop.
pub fn is_stop_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s == STOP,
        Value::Object(map) => map.get("cmd").and_then(Value::as_str) == Some(STOP),
        _ => false,
    }
}

/// `{"cmd":"STOP"}`
pub fn stop_object() -> Value {
    json!({ "cmd": STOP })
}
