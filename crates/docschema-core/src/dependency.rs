use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::id::ObjectId;

/// How a referencing document depends on the document that carries the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    /// Non-optional foreign key: the dependent cannot outlive its target.
    Required,
    /// Optional foreign key: nullified when the target goes away.
    Optional,
    /// Id list entry: spliced out when the target goes away.
    Array,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [
        DependencyKind::Required,
        DependencyKind::Optional,
        DependencyKind::Array,
    ];

    /// Document field holding records of this kind.
    pub fn field(self) -> &'static str {
        match self {
            DependencyKind::Required => "_requiredDependencies",
            DependencyKind::Optional => "_optionalDependencies",
            DependencyKind::Array => "_arrayDependencies",
        }
    }
}

/// A reference held by `collection`/`id` on the document carrying this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub collection: String,
    #[serde(
        rename = "propertyName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub property_name: Option<String>,
    #[serde(rename = "_id")]
    pub id: ObjectId,
}

impl DependencyRecord {
    pub fn new(collection: impl Into<String>, property_name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            collection: collection.into(),
            property_name: Some(property_name.into()),
            id,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Records of `kind` stored on `document`; malformed entries are skipped.
pub fn read_dependencies(document: &Document, kind: DependencyKind) -> Vec<DependencyRecord> {
    document
        .get(kind.field())
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
