use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Number as JsonNumber, Value};

/// Integer values round to the nearest whole number, floats to `decimal_places`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NumberType {
    Integer,
    #[default]
    Float,
}

fn default_min() -> f64 {
    f64::MIN
}

fn default_max() -> f64 {
    f64::MAX
}

fn default_decimal_places() -> u32 {
    2
}

/// Bounded numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Number {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default)]
    pub number_type: NumberType,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

impl Number {
    pub fn new(min: f64, max: f64, number_type: NumberType, decimal_places: u32) -> Self {
        Self {
            min,
            max,
            number_type,
            decimal_places,
        }
    }

    pub fn integer(min: f64, max: f64) -> Self {
        Self::new(min, max, NumberType::Integer, 0)
    }

    pub fn float(min: f64, max: f64, decimal_places: u32) -> Self {
        Self::new(min, max, NumberType::Float, decimal_places)
    }

    /// Validate a lone numeric value, writing back its normalized form.
    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        let parsed = parse_number(value).ok_or_else(|| format!("'{name}' is not a valid number"))?;
        let normalized = self.normalize(parsed);
        if normalized < self.min || normalized > self.max {
            return Err(format!(
                "The value of '{name}' is not within the range of {} and {}",
                self.min, self.max
            ));
        }
        *value = self.to_value(normalized);
        Ok(())
    }

    pub(crate) fn normalize(&self, raw: f64) -> f64 {
        match self.number_type {
            NumberType::Integer => raw.round(),
            NumberType::Float => round_to(raw, self.decimal_places),
        }
    }

    pub(crate) fn to_value(&self, normalized: f64) -> Value {
        if self.number_type == NumberType::Integer
            && normalized >= i64::MIN as f64
            && normalized <= i64::MAX as f64
        {
            return Value::Number(JsonNumber::from(normalized as i64));
        }
        JsonNumber::from_f64(normalized).map_or(Value::Null, Value::Number)
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::new(
            default_min(),
            default_max(),
            NumberType::default(),
            default_decimal_places(),
        )
    }
}

/// Numbers and numeric strings; null reads as zero.
pub(crate) fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Round half away from zero at `places` decimal places.
fn round_to(raw: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places.min(15) as i32);
    let scaled = raw * factor;
    if !scaled.is_finite() {
        return raw;
    }
    scaled.round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn float_rounds_to_decimal_places() {
        let mut value = json!(1.23456);
        Number::float(0.0, 10.0, 2).validate("price", &mut value).unwrap();
        assert_eq!(value, json!(1.23));

        let mut value = json!(1.235);
        Number::float(0.0, 10.0, 1).validate("price", &mut value).unwrap();
        assert_eq!(value, json!(1.2));
    }

    #[test]
    fn integer_rounds_to_nearest() {
        let mut value = json!(4.6);
        Number::integer(0.0, 10.0).validate("count", &mut value).unwrap();
        assert_eq!(value, json!(5));

        let mut value = json!("2.4");
        Number::integer(0.0, 10.0).validate("count", &mut value).unwrap();
        assert_eq!(value, json!(2));
    }

    #[test]
    fn out_of_range_names_field_and_bounds() {
        let mut value = json!(11);
        let err = Number::integer(0.0, 10.0)
            .validate("count", &mut value)
            .unwrap_err();
        assert_eq!(err, "The value of 'count' is not within the range of 0 and 10");
    }

    #[test]
    fn rejects_non_numeric_input() {
        let mut value = json!("abc");
        let err = Number::default().validate("count", &mut value).unwrap_err();
        assert_eq!(err, "'count' is not a valid number");
    }
}
