use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::items::{ItemFlags, Kind, SchemaItem};
use crate::schema::Schema;

/// Declarative set of collections, as loaded from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Definitions {
    #[serde(default)]
    pub collections: Vec<CollectionDefinition>,
}

/// One collection and the shape of its documents.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CollectionDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// One field: name, flags and kind-specific constraints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(flatten)]
    pub flags: ItemFlags,
    #[serde(flatten)]
    pub kind: Kind,
}

impl FieldDefinition {
    pub fn to_item(&self) -> SchemaItem {
        SchemaItem::new(self.name.clone(), self.kind.clone()).with_flags(self.flags)
    }
}

impl CollectionDefinition {
    /// Build the default schema for this collection.
    pub fn to_schema(&self) -> Result<Schema> {
        Schema::from_items(self.fields.iter().map(FieldDefinition::to_item))
    }

    /// Collections referenced by foreign keys or targeted id lists.
    pub fn referenced_collections(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|field| match &field.kind {
            Kind::ForeignKey(rule) => Some(rule.target_collection.as_str()),
            Kind::IdArray(rule) => rule.target_collection.as_deref(),
            _ => None,
        })
    }
}

impl Definitions {
    pub fn get(&self, name: &str) -> Option<&CollectionDefinition> {
        self.collections
            .iter()
            .find(|collection| collection.name == name)
    }
}
