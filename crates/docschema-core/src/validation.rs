use std::collections::BTreeSet;

use crate::definition::{CollectionDefinition, Definitions, FieldDefinition};
use crate::document::check_field_name;
use crate::error::{Error, Result};
use crate::items::Kind;

/// Validate internal consistency of collection definitions.
///
/// This checks:
/// - duplicate collections/fields
/// - references point at declared collections
/// - min/max bounds are not inverted
pub fn validate_definitions(definitions: &Definitions) -> Result<()> {
    let mut collections = BTreeSet::new();
    for collection in &definitions.collections {
        if collection.name.trim().is_empty() {
            return Err(Error::InvalidSchema(
                "collection name cannot be empty".to_string(),
            ));
        }
        if !collections.insert(collection.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate collection name: {}",
                collection.name
            )));
        }
    }

    for collection in &definitions.collections {
        validate_collection(collection, &collections)?;
    }

    Ok(())
}

fn validate_collection(collection: &CollectionDefinition, known: &BTreeSet<&str>) -> Result<()> {
    let mut fields = BTreeSet::new();
    for field in &collection.fields {
        check_field_name(&field.name)
            .map_err(|message| Error::InvalidSchema(format!("{message} in {}", collection.name)))?;
        if !fields.insert(field.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate field name: {}.{}",
                collection.name, field.name
            )));
        }
        validate_field(collection, field, known)?;
    }

    let has_indexer = collection.fields.iter().any(|field| field.flags.unique_indexer);
    let has_unique = collection.fields.iter().any(|field| field.flags.unique);
    if has_indexer && !has_unique {
        return Err(Error::InvalidSchema(format!(
            "unique indexer without unique fields in {}",
            collection.name
        )));
    }

    Ok(())
}

fn validate_field(
    collection: &CollectionDefinition,
    field: &FieldDefinition,
    known: &BTreeSet<&str>,
) -> Result<()> {
    let path = format!("{}.{}", collection.name, field.name);
    let inverted = |what: &str| Error::InvalidSchema(format!("{what} bounds are inverted: {path}"));

    match &field.kind {
        Kind::Text(rule) if rule.min_characters > rule.max_characters => {
            return Err(inverted("character"));
        }
        Kind::Html(rule) if rule.min_characters > rule.max_characters => {
            return Err(inverted("character"));
        }
        Kind::Number(rule) if rule.min > rule.max => return Err(inverted("value")),
        Kind::IdArray(rule) if rule.min_items > rule.max_items => return Err(inverted("item")),
        Kind::NumArray(rule) if rule.min_items > rule.max_items => return Err(inverted("item")),
        Kind::NumArray(rule) if rule.number.min > rule.number.max => {
            return Err(inverted("value"));
        }
        Kind::TextArray(rule) if rule.min_items > rule.max_items => return Err(inverted("item")),
        Kind::TextArray(rule) if rule.min_characters > rule.max_characters => {
            return Err(inverted("character"));
        }
        _ => {}
    }

    let target = match &field.kind {
        Kind::ForeignKey(rule) => Some(rule.target_collection.as_str()),
        Kind::IdArray(rule) => rule.target_collection.as_deref(),
        _ => None,
    };
    if let Some(target) = target {
        if !known.contains(target) {
            return Err(Error::InvalidSchema(format!(
                "referenced collection not found: {target} (from {path})"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definitions(value: serde_json::Value) -> Definitions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_consistent_definitions() {
        let defs = definitions(json!({
            "collections": [
                {"name": "users", "fields": [{"name": "username", "kind": "text", "unique": true}]},
                {"name": "posts", "fields": [
                    {"name": "author", "kind": "foreign_key", "target_collection": "users"}
                ]}
            ]
        }));
        validate_definitions(&defs).unwrap();
    }

    #[test]
    fn rejects_unknown_reference_target() {
        let defs = definitions(json!({
            "collections": [
                {"name": "posts", "fields": [
                    {"name": "author", "kind": "foreign_key", "target_collection": "users"}
                ]}
            ]
        }));
        let err = validate_definitions(&defs).unwrap_err();
        assert!(err.to_string().contains("referenced collection not found: users"));
    }

    #[test]
    fn rejects_duplicate_fields() {
        let defs = definitions(json!({
            "collections": [
                {"name": "posts", "fields": [
                    {"name": "title", "kind": "text"},
                    {"name": "title", "kind": "html"}
                ]}
            ]
        }));
        let err = validate_definitions(&defs).unwrap_err();
        assert!(err.to_string().contains("duplicate field name: posts.title"));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let defs = definitions(json!({
            "collections": [
                {"name": "posts", "fields": [
                    {"name": "title", "kind": "text", "min_characters": 10, "max_characters": 2}
                ]}
            ]
        }));
        let err = validate_definitions(&defs).unwrap_err();
        assert!(err.to_string().contains("character bounds are inverted: posts.title"));
    }

    #[test]
    fn rejects_dotted_field_names() {
        let defs = definitions(json!({
            "collections": [
                {"name": "posts", "fields": [{"name": "author.name", "kind": "text"}]}
            ]
        }));
        let err = validate_definitions(&defs).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid schema: field name cannot contain '.': author.name in posts"
        );
    }
}
