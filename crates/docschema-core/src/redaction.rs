use serde_json::{Map, Value};

use crate::items::Kind;

/// Placeholder shown in place of a sensitive value.
///
/// Text is masked character for character; every other kind collapses to its
/// empty form.
pub fn redact_value(kind: &Kind, value: &Value) -> Value {
    match kind {
        Kind::Text(_) | Kind::Html(_) => Value::String(mask_text(value.as_str().unwrap_or(""))),
        Kind::Number(_) | Kind::Date(_) => Value::from(0),
        Kind::Bool(_) => Value::Bool(false),
        Kind::Json(_) => Value::Object(Map::new()),
        Kind::Id(_) | Kind::ForeignKey(_) => Value::Null,
        Kind::IdArray(_) | Kind::NumArray(_) | Kind::TextArray(_) => Value::Array(Vec::new()),
    }
}

/// Replace every character with `*`.
pub fn mask_text(text: &str) -> String {
    "*".repeat(text.chars().count())
}
