//! Lenient readers for loosely typed JSON payload fields.
//!
//! Spreadsheet exports and hand-written clients send numbers as strings
//! ("12", "4.5") and booleans as 0/1. These helpers accept those forms and
//! reject anything else with `None`, so the caller decides how to report it.

use serde_json::Value;

/// True when a field is absent, `null` or an empty/whitespace string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Reads an integral number. `5`, `5.0` and `"5"` are accepted; `5.5` is not.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Reads a finite decimal number from a JSON number or numeric string.
pub fn as_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Coerces a loosely typed flag to a boolean. Unknown shapes read as `false`.
pub fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "on"
        ),
        _ => false,
    }
}

/// Reads a non-empty, trimmed piece of text. Numbers are rendered as text
/// so that numeric roll numbers survive a CSV-to-JSON conversion.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
