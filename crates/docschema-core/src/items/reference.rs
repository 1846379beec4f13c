use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::ObjectId;

/// Coerce a loosely typed id into its store-native form.
///
/// Empty or whitespace-only strings become null.
pub(crate) fn coerce_id(name: &str, value: &Value) -> Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(text) if text.trim().is_empty() => Ok(Value::Null),
        other => ObjectId::from_loose_value(other)
            .map(|id| id.to_value())
            .ok_or_else(|| format!("Please use a valid ID for '{name}'")),
    }
}

/// Nullable document id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Id {}

impl Id {
    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        *value = coerce_id(name, value)?;
        Ok(())
    }
}

/// Reference to a document in another collection.
///
/// Existence of the target is checked by the model layer, which also keeps
/// the dependency records on the target document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub target_collection: String,
    /// When false the reference must point at an existing document.
    #[serde(default)]
    pub optional_key: bool,
}

impl ForeignKey {
    pub fn new(target_collection: impl Into<String>, optional_key: bool) -> Self {
        Self {
            target_collection: target_collection.into(),
            optional_key,
        }
    }

    /// Only the id shape is checked here; whether the target exists is
    /// decided when the owning document is written.
    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        *value = coerce_id(name, value)?;
        Ok(())
    }
}
