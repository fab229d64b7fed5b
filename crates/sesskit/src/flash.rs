//! One-time flash messages rendered as dismissible alert boxes.

use crate::types::{FlashMessage, SessionValue};

/// Entry name `message` uses when none is given.
pub const DEFAULT_FLASH: &str = "success";

/// Whether a pulled value counts as "no message".
///
/// Null, `false`, `""`, `"0"`, numeric zero and empty arrays/objects are empty.
pub fn is_empty_value(value: &SessionValue) -> bool {
    match value {
        SessionValue::Null => true,
        SessionValue::Bool(b) => !b,
        SessionValue::Number(n) => n.as_f64() == Some(0.0),
        SessionValue::String(s) => s.is_empty() || s == "0",
        SessionValue::Array(items) => items.is_empty(),
        SessionValue::Object(map) => map.is_empty(),
    }
}

/// Interpret a stored flash value. Returns `None` for empty values.
///
/// A mapping supplies its own `type` and `text`; anything else is text whose
/// alert type is the entry `name`.
pub fn decode(name: &str, value: &SessionValue) -> Option<FlashMessage> {
    if is_empty_value(value) {
        return None;
    }

    let msg = match value {
        SessionValue::Object(map) => FlashMessage {
            kind: map.get("type").map(value_text).unwrap_or_default(),
            text: map.get("text").map(value_text).unwrap_or_default(),
        },
        SessionValue::Array(_) => FlashMessage::new("", ""),
        scalar => FlashMessage::new(name, value_text(scalar)),
    };
    Some(msg)
}

/// Render an alert box. `kind` and `text` are inserted verbatim.
pub fn render(kind: &str, text: &str) -> String {
    format!(
        "<div class='alert alert-{kind} alert-dismissable'>
                    <button type='button' class='close' data-dismiss='alert' aria-hidden='true'>×</button>
                    <h4><i class='fa fa-check'></i> {text}</h4>
                </div>"
    )
}

/// Text form of a scalar as a template would print it.
fn value_text(value: &SessionValue) -> String {
    match value {
        SessionValue::Null => String::new(),
        SessionValue::Bool(true) => "1".to_string(),
        SessionValue::Bool(false) => String::new(),
        SessionValue::String(s) => s.clone(),
        SessionValue::Number(n) => number_text(n),
        SessionValue::Array(_) => "Array".to_string(),
        SessionValue::Object(_) => "Array".to_string(),
    }
}

/// Whole floats print without a fraction (`1.0` -> `1`).
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
        _ => n.to_string(),
    }
}
