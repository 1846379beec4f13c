use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::number::{Number, parse_number};
use super::reference::coerce_id;
use super::text::check_length;
use crate::html;

fn default_max_items() -> usize {
    10_000
}

fn default_max_characters() -> usize {
    10_000
}

fn check_item_count(name: &str, count: usize, min_items: usize, max_items: usize) -> Result<(), String> {
    if count < min_items {
        let plural = if min_items == 1 { "" } else { "s" };
        return Err(format!(
            "You must select at least {min_items} item{plural} for '{name}'"
        ));
    }
    if count > max_items {
        return Err(format!(
            "You have selected too many items for '{name}', please only use up to {max_items}"
        ));
    }
    Ok(())
}

fn array_input(name: &str, value: &Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.clone()),
        _ => Err(format!("'{name}' must be a list")),
    }
}

/// List of document ids, optionally pointing into another collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IdArray {
    #[serde(default)]
    pub min_items: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Ids are pruned to documents that exist in this collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_collection: Option<String>,
}

impl IdArray {
    pub fn new(min_items: usize, max_items: usize) -> Self {
        Self {
            min_items,
            max_items,
            target_collection: None,
        }
    }

    pub fn targeting(mut self, collection: impl Into<String>) -> Self {
        self.target_collection = Some(collection.into());
        self
    }

    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        let items = array_input(name, value)?;
        check_item_count(name, items.len(), self.min_items, self.max_items)?;
        let mut coerced = Vec::with_capacity(items.len());
        for item in &items {
            let id = coerce_id(name, item)?;
            if id.is_null() {
                return Err(format!("Please use a valid ID for '{name}'"));
            }
            coerced.push(id);
        }
        *value = Value::Array(coerced);
        Ok(())
    }
}

impl Default for IdArray {
    fn default() -> Self {
        Self::new(0, default_max_items())
    }
}

/// List of bounded numbers sharing one numeric rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NumArray {
    #[serde(default)]
    pub min_items: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(flatten)]
    pub number: Number,
}

impl NumArray {
    pub fn new(min_items: usize, max_items: usize, number: Number) -> Self {
        Self {
            min_items,
            max_items,
            number,
        }
    }

    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        let items = array_input(name, value)?;
        check_item_count(name, items.len(), self.min_items, self.max_items)?;
        let mut normalized = Vec::with_capacity(items.len());
        for item in &items {
            if item.is_null() {
                return Err(format!("'{name}' contains a value that is not a number"));
            }
            let parsed = parse_number(item)
                .ok_or_else(|| format!("'{name}' contains a value that is not a number"))?;
            let rounded = self.number.normalize(parsed);
            if rounded < self.number.min || rounded > self.number.max {
                return Err(format!(
                    "The value of '{name}' is not within the range of {} and {}",
                    self.number.min, self.number.max
                ));
            }
            normalized.push(self.number.to_value(rounded));
        }
        *value = Value::Array(normalized);
        Ok(())
    }
}

impl Default for NumArray {
    fn default() -> Self {
        Self::new(0, default_max_items(), Number::default())
    }
}

/// List of plain text entries, each trimmed and stripped of markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TextArray {
    #[serde(default)]
    pub min_items: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default)]
    pub min_characters: usize,
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,
}

impl TextArray {
    pub fn new(min_items: usize, max_items: usize) -> Self {
        Self {
            min_items,
            max_items,
            ..Self::default()
        }
    }

    pub fn with_characters(mut self, min_characters: usize, max_characters: usize) -> Self {
        self.min_characters = min_characters;
        self.max_characters = max_characters;
        self
    }

    pub(crate) fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        let items = array_input(name, value)?;
        check_item_count(name, items.len(), self.min_items, self.max_items)?;
        let mut cleaned = Vec::with_capacity(items.len());
        for item in &items {
            let Some(text) = item.as_str() else {
                return Err(format!("'{name}' must only contain text"));
            };
            let text = html::strip_tags(text.trim()).trim().to_string();
            check_length(name, &text, self.min_characters, self.max_characters)?;
            cleaned.push(Value::String(text));
        }
        *value = Value::Array(cleaned);
        Ok(())
    }
}

impl Default for TextArray {
    fn default() -> Self {
        Self {
            min_items: 0,
            max_items: default_max_items(),
            min_characters: 0,
            max_characters: default_max_characters(),
        }
    }
}
