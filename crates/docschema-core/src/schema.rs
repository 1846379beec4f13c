use serde_json::Value;

use crate::document::{Document, ID_FIELD, check_field_name};
use crate::error::{Error, Result};
use crate::id::ObjectId;
use crate::items::SchemaItem;
use crate::options::JsonOptions;

/// Ordered set of uniquely named fields describing one entity kind.
///
/// `Clone` is deep: a cloned schema shares no mutable state with its source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    items: Vec<SchemaItem>,
    error: Option<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from items, rejecting duplicate names.
    pub fn from_items(items: impl IntoIterator<Item = SchemaItem>) -> Result<Self> {
        let mut schema = Self::new();
        for item in items {
            schema.add(item)?;
        }
        Ok(schema)
    }

    /// Append a field. Fails if the name is reserved or already taken.
    pub fn add(&mut self, item: SchemaItem) -> Result<&mut SchemaItem> {
        check_field_name(item.name()).map_err(Error::InvalidSchema)?;
        if self.get(item.name()).is_some() {
            return Err(Error::InvalidSchema(format!(
                "an item with the name '{}' already exists",
                item.name()
            )));
        }
        self.items.push(item);
        let last = self.items.len() - 1;
        Ok(&mut self.items[last])
    }

    /// Remove a field by name. Unknown names are ignored.
    pub fn remove(&mut self, name: &str) -> Option<SchemaItem> {
        let position = self.items.iter().position(|item| item.name() == name)?;
        Some(self.items.remove(position))
    }

    pub fn get(&self, name: &str) -> Option<&SchemaItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SchemaItem> {
        self.items.iter_mut().find(|item| item.name() == name)
    }

    pub fn items(&self) -> &[SchemaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Assign a value by name. Returns false when no such field exists.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.get_mut(name) {
            Some(item) => {
                item.set_value(value);
                true
            }
            None => false,
        }
    }

    /// Map a data object onto the fields, ignoring unknown keys.
    ///
    /// Read-only fields are skipped unless `allow_read_only` is set.
    pub fn set_values(&mut self, data: &Document, allow_read_only: bool) {
        for item in &mut self.items {
            if item.flags().read_only && !allow_read_only {
                continue;
            }
            if let Some(value) = data.get(item.name()) {
                item.set_value(value.clone());
            }
        }
    }

    /// Load raw values from a stored row without validation.
    pub fn deserialize(&mut self, row: &Document) {
        for item in &mut self.items {
            if let Some(value) = row.get(item.name()) {
                item.set_value(value.clone());
            }
        }
    }

    /// The exact document written to the store.
    pub fn serialize(&self) -> Document {
        self.items
            .iter()
            .map(|item| (item.name().to_string(), item.db_value().clone()))
            .collect()
    }

    /// Outward facing rendering, redaction aware, without reference expansion.
    pub fn to_json(&self, id: Option<ObjectId>, options: &JsonOptions) -> Document {
        let mut output = Document::new();
        if let Some(id) = id {
            output.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
        }
        for item in &self.items {
            output.insert(item.name().to_string(), item.value(options));
        }
        output
    }

    /// Validate every field in declaration order.
    ///
    /// All fields run, so every value is normalized, but only the first
    /// failure is recorded in [`Schema::error`].
    pub fn validate(&mut self) -> bool {
        self.error = None;
        for item in &mut self.items {
            if let Err(message) = item.validate() {
                if self.error.is_none() {
                    self.error = Some(message);
                }
            }
        }
        self.error.is_none()
    }

    /// Message of the last failed validation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Like [`Schema::validate`] but returns the failure as an error.
    pub fn validated(&mut self) -> Result<()> {
        if self.validate() {
            Ok(())
        } else {
            Err(Error::Validation(self.error.clone().unwrap_or_default()))
        }
    }

    pub fn unique_items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.iter().filter(|item| item.flags().unique)
    }

    pub fn indexer_items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.iter().filter(|item| item.flags().unique_indexer)
    }

    /// Fields holding references into other collections.
    pub fn reference_items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items
            .iter()
            .filter(|item| item.target_collection().is_some())
    }
}
