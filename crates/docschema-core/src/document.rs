use serde_json::{Map, Value};

use crate::dependency::DependencyKind;
use crate::id::ObjectId;

/// A stored document: a flat map of field names to JSON values.
pub type Document = Map<String, Value>;

/// Field holding a document's id.
pub const ID_FIELD: &str = "_id";

/// Reject names a schema field cannot take: empty, `_id`, the dependency
/// record fields, operator-like `$` prefixes and dotted paths.
pub fn check_field_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("field name cannot be empty".to_string());
    }
    let reserved = name == ID_FIELD
        || DependencyKind::ALL.iter().any(|kind| kind.field() == name)
        || name.starts_with('$');
    if reserved {
        return Err(format!("reserved field name: {name}"));
    }
    if name.contains('.') {
        return Err(format!("field name cannot contain '.': {name}"));
    }
    Ok(())
}

/// Id of `document`, if it carries one in store-native form.
pub fn document_id(document: &Document) -> Option<ObjectId> {
    document.get(ID_FIELD).and_then(ObjectId::from_value)
}

/// Selector matching exactly one document by id.
pub fn id_selector(id: ObjectId) -> Document {
    let mut selector = Document::new();
    selector.insert(ID_FIELD.to_string(), id.to_value());
    selector
}

/// Convert a JSON value into a document, rejecting non-objects.
pub fn into_document(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
