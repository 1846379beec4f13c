use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// True or false; null reads as false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Bool {}

impl Bool {
    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        match value {
            Value::Bool(_) => Ok(()),
            Value::Null => {
                *value = Value::Bool(false);
                Ok(())
            }
            _ => Err(format!("'{name}' is not a valid boolean")),
        }
    }
}

/// Milliseconds since the unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Date {
    /// Overwrite the value with the current time on every validation.
    #[serde(default)]
    pub use_now: bool,
}

impl Date {
    pub fn now() -> Self {
        Self { use_now: true }
    }

    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        if self.use_now {
            *value = Value::from(Utc::now().timestamp_millis());
            return Ok(());
        }

        let millis = match value {
            Value::Null => Some(0),
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|float| float.trunc() as i64)),
            Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|parsed| parsed.timestamp_millis()),
            _ => None,
        };

        let millis = millis.ok_or_else(|| format!("'{name}' is not a valid date"))?;
        *value = Value::from(millis);
        Ok(())
    }
}

/// Opaque JSON payload; null becomes an empty object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Json {}

impl Json {
    pub(crate) fn validate(&self, _name: &str, value: &mut Value) -> Result<(), String> {
        if value.is_null() {
            *value = Value::Object(Map::new());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn date_parses_rfc3339_strings() {
        let mut value = json!("1970-01-01T00:00:01Z");
        Date::default().validate("created", &mut value).unwrap();
        assert_eq!(value, json!(1000));
    }

    #[test]
    fn date_use_now_overwrites() {
        let mut value = json!(5);
        Date::now().validate("modified", &mut value).unwrap();
        assert!(value.as_i64().unwrap() > 5);
    }

    #[test]
    fn bool_rejects_strings() {
        let mut value = json!("yes");
        let err = Bool::default().validate("public", &mut value).unwrap_err();
        assert_eq!(err, "'public' is not a valid boolean");
    }
}
