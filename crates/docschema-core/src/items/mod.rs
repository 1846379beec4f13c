//! Typed schema fields.
//!
//! A [`SchemaItem`] pairs a name and a current value with a [`Kind`], which
//! carries the per-type constraints and the validation rule. Validation may
//! rewrite the value (trimming, rounding, sanitizing, id coercion), so callers
//! validate before reading [`SchemaItem::db_value`].

mod array;
mod number;
mod reference;
mod scalar;
mod text;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::ObjectId;
use crate::options::JsonOptions;
use crate::redaction::redact_value;

pub use array::{IdArray, NumArray, TextArray};
pub use number::{Number, NumberType};
pub use reference::{ForeignKey, Id};
pub use scalar::{Bool, Date, Json};
pub use text::{Html, Text};

/// Field type together with its constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Kind {
    Text(Text),
    Number(Number),
    Bool(Bool),
    Date(Date),
    Json(Json),
    Id(Id),
    IdArray(IdArray),
    NumArray(NumArray),
    TextArray(TextArray),
    Html(Html),
    ForeignKey(ForeignKey),
}

impl Kind {
    /// Value a freshly built item holds.
    pub fn default_value(&self) -> Value {
        match self {
            Kind::Text(_) | Kind::Html(_) => Value::String(String::new()),
            Kind::Number(_) | Kind::Date(_) => Value::from(0),
            Kind::Bool(_) => Value::Bool(false),
            Kind::Json(_) => Value::Object(Map::new()),
            Kind::Id(_) | Kind::ForeignKey(_) => Value::Null,
            Kind::IdArray(_) | Kind::NumArray(_) | Kind::TextArray(_) => Value::Array(Vec::new()),
        }
    }

    fn validate(&self, name: &str, value: &mut Value) -> Result<(), String> {
        match self {
            Kind::Text(rule) => rule.validate(name, value),
            Kind::Number(rule) => rule.validate(name, value),
            Kind::Bool(rule) => rule.validate(name, value),
            Kind::Date(rule) => rule.validate(name, value),
            Kind::Json(rule) => rule.validate(name, value),
            Kind::Id(rule) => rule.validate(name, value),
            Kind::IdArray(rule) => rule.validate(name, value),
            Kind::NumArray(rule) => rule.validate(name, value),
            Kind::TextArray(rule) => rule.validate(name, value),
            Kind::Html(rule) => rule.validate(name, value),
            Kind::ForeignKey(rule) => rule.validate(name, value),
        }
    }
}

macro_rules! kind_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Kind {
                fn from(rule: $variant) -> Self {
                    Kind::$variant(rule)
                }
            }
        )*
    };
}

kind_from!(
    Text, Number, Bool, Date, Json, Id, IdArray, NumArray, TextArray, Html, ForeignKey,
);

/// Behavioural flags shared by every field kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ItemFlags {
    /// Redacted in non-verbose output.
    #[serde(default)]
    pub sensitive: bool,
    /// Must be present in the data used to create an instance.
    #[serde(default)]
    pub required: bool,
    /// Never overwritten by updates.
    #[serde(default)]
    pub read_only: bool,
    /// No two documents may share this value.
    #[serde(default)]
    pub unique: bool,
    /// Scopes uniqueness checks of the unique fields.
    #[serde(default)]
    pub unique_indexer: bool,
    /// Backed by a store index.
    #[serde(default)]
    pub indexable: bool,
}

/// A named, typed, self-validating field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaItem {
    name: String,
    kind: Kind,
    value: Value,
    flags: ItemFlags,
}

impl SchemaItem {
    pub fn new(name: impl Into<String>, kind: impl Into<Kind>) -> Self {
        let kind = kind.into();
        Self {
            name: name.into(),
            value: kind.default_value(),
            kind,
            flags: ItemFlags::default(),
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_flags(mut self, flags: ItemFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.flags.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.flags.read_only = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.flags.unique = true;
        self
    }

    pub fn unique_indexer(mut self) -> Self {
        self.flags.unique_indexer = true;
        self
    }

    pub fn indexable(mut self) -> Self {
        self.flags.indexable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    /// Copy flags and the current value onto `target`, keeping its name and kind.
    pub fn copy_into(&self, target: &mut SchemaItem) {
        target.flags = self.flags;
        target.value = self.value.clone();
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// Check the value against the kind's rules, normalizing it in place.
    pub fn validate(&mut self) -> Result<(), String> {
        self.kind.validate(&self.name, &mut self.value)
    }

    /// Value as written to the store; never redacted.
    pub fn db_value(&self) -> &Value {
        &self.value
    }

    /// Value for outward facing payloads.
    ///
    /// Sensitive fields are redacted unless `options.verbose` is set, and ids
    /// are rendered as plain hex strings.
    pub fn value(&self, options: &JsonOptions) -> Value {
        if self.flags.sensitive && !options.verbose {
            return redact_value(&self.kind, &self.value);
        }
        public_value(&self.value)
    }

    /// The stored value read as a single id.
    pub fn object_id(&self) -> Option<ObjectId> {
        ObjectId::from_loose_value(&self.value)
    }

    /// The stored value read as a list of ids, skipping anything malformed.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.value
            .as_array()
            .map(|items| items.iter().filter_map(ObjectId::from_loose_value).collect())
            .unwrap_or_default()
    }

    /// Collection referenced by this field, if any.
    pub fn target_collection(&self) -> Option<&str> {
        match &self.kind {
            Kind::ForeignKey(rule) => Some(rule.target_collection.as_str()),
            Kind::IdArray(rule) => rule.target_collection.as_deref(),
            _ => None,
        }
    }
}

fn public_value(value: &Value) -> Value {
    if let Some(id) = ObjectId::from_value(value) {
        return Value::String(id.to_hex());
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(public_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_items_hold_the_kind_default() {
        assert_eq!(SchemaItem::new("title", Text::default()).db_value(), &json!(""));
        assert_eq!(SchemaItem::new("tags", TextArray::default()).db_value(), &json!([]));
        assert_eq!(SchemaItem::new("author", Id::default()).db_value(), &Value::Null);
    }

    #[test]
    fn sensitive_values_are_redacted_unless_verbose() {
        let item = SchemaItem::new("password", Text::default())
            .with_value("secret")
            .sensitive();
        assert_eq!(item.value(&JsonOptions::default()), json!("******"));
        assert_eq!(item.value(&JsonOptions::verbose()), json!("secret"));
        assert_eq!(item.db_value(), &json!("secret"));
    }

    #[test]
    fn public_values_render_ids_as_hex() {
        let mut item = SchemaItem::new("author", Id::default()).with_value("123456789012345678901234");
        item.validate().unwrap();
        assert_eq!(item.db_value(), &json!({"$oid": "123456789012345678901234"}));
        assert_eq!(item.value(&JsonOptions::default()), json!("123456789012345678901234"));
        assert_eq!(
            item.object_id().map(|id| id.to_hex()).as_deref(),
            Some("123456789012345678901234")
        );
    }

    #[test]
    fn copy_into_keeps_target_identity() {
        let source = SchemaItem::new("title", Text::default()).with_value("a").unique();
        let mut target = SchemaItem::new("other", Text::default());
        source.copy_into(&mut target);
        assert_eq!(target.name(), "other");
        assert!(target.flags().unique);
        assert_eq!(target.db_value(), &json!("a"));
    }

    #[test]
    fn kind_deserializes_from_tagged_definition() {
        let kind: Kind = serde_json::from_value(json!({
            "kind": "text",
            "min_characters": 1
        }))
        .unwrap();
        assert_eq!(kind, Kind::Text(Text::new(1, 10_000)));
    }
}
