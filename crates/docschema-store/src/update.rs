//! Update operators: `$set`, `$unset`, `$inc`, `$push` and `$pull`.

use serde_json::{Map, Value};

use docschema_core::{Document, ID_FIELD, StoreError, StoreResult};

use crate::selector::{is_operator_object, lookup, loose_eq, matches};

/// Apply an operator update to `document`. Returns true if anything changed.
pub fn apply_update(document: &mut Document, update: &Document) -> StoreResult<bool> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdate("update document is empty".to_string()));
    }

    let before = document.clone();
    for (operator, fields) in update {
        let fields = fields.as_object().ok_or_else(|| {
            StoreError::InvalidUpdate(format!("{operator} expects an object of fields"))
        })?;
        for (path, argument) in fields {
            if path == ID_FIELD && operator != "$set" {
                return Err(StoreError::InvalidUpdate(format!(
                    "{operator} cannot modify {ID_FIELD}"
                )));
            }
            match operator.as_str() {
                "$set" => {
                    if path == ID_FIELD && document.get(ID_FIELD) != Some(argument) {
                        return Err(StoreError::InvalidUpdate(format!(
                            "{ID_FIELD} is immutable"
                        )));
                    }
                    *slot(document, path)? = argument.clone();
                }
                "$unset" => unset(document, path),
                "$inc" => increment(document, path, argument)?,
                "$push" => push(document, path, argument)?,
                "$pull" => pull(document, path, argument)?,
                other => {
                    return Err(StoreError::InvalidUpdate(format!(
                        "unknown update operator {other}"
                    )));
                }
            }
        }
    }
    Ok(*document != before)
}

/// Mutable slot for a dotted path, creating intermediate objects.
fn slot<'a>(document: &'a mut Document, path: &str) -> StoreResult<&'a mut Value> {
    let mut segments = path.split('.');
    let first = segments
        .next()
        .ok_or_else(|| StoreError::InvalidUpdate("empty field path".to_string()))?;
    let mut current = document.entry(first.to_string()).or_insert(Value::Null);
    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => {
                return Err(StoreError::InvalidUpdate(format!(
                    "cannot create field '{segment}' in {path}"
                )));
            }
        };
    }
    Ok(current)
}

fn unset(document: &mut Document, path: &str) {
    match path.rsplit_once('.') {
        None => {
            document.remove(path);
        }
        Some((parent, leaf)) => {
            let mut current = document.get_mut(parent.split('.').next().unwrap_or(parent));
            for segment in parent.split('.').skip(1) {
                current = current
                    .and_then(Value::as_object_mut)
                    .and_then(|map| map.get_mut(segment));
            }
            if let Some(Value::Object(map)) = current {
                map.remove(leaf);
            }
        }
    }
}

fn increment(document: &mut Document, path: &str, argument: &Value) -> StoreResult<()> {
    let step = argument
        .as_f64()
        .ok_or_else(|| StoreError::InvalidUpdate(format!("$inc on {path} expects a number")))?;
    let target = slot(document, path)?;
    let next = match target {
        Value::Null => argument.clone(),
        Value::Number(current) => match (current.as_i64(), argument.as_i64()) {
            (Some(a), Some(b)) => Value::from(a.saturating_add(b)),
            _ => Value::from(current.as_f64().unwrap_or(0.0) + step),
        },
        _ => {
            return Err(StoreError::InvalidUpdate(format!(
                "$inc on {path} requires a numeric field"
            )));
        }
    };
    *target = next;
    Ok(())
}

fn push(document: &mut Document, path: &str, argument: &Value) -> StoreResult<()> {
    let target = slot(document, path)?;
    match target {
        Value::Null => *target = Value::Array(vec![argument.clone()]),
        Value::Array(items) => items.push(argument.clone()),
        _ => {
            return Err(StoreError::InvalidUpdate(format!(
                "$push on {path} requires an array field"
            )));
        }
    }
    Ok(())
}

/// Remove array elements equal to `argument`, or, for object elements,
/// matching it as a selector.
fn pull(document: &mut Document, path: &str, argument: &Value) -> StoreResult<()> {
    if lookup(document, path).is_none() {
        return Ok(());
    }
    let target = slot(document, path)?;
    let Value::Array(items) = target else {
        return Err(StoreError::InvalidUpdate(format!(
            "$pull on {path} requires an array field"
        )));
    };

    let selector = match argument {
        Value::Object(map) if !is_operator_object(argument) && !is_plain_value(argument) => Some(map),
        _ => None,
    };

    let mut kept = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        let remove = match (&item, selector) {
            (Value::Object(element), Some(selector)) => matches(element, selector)?,
            _ => loose_eq(&item, argument),
        };
        if !remove {
            kept.push(item);
        }
    }
    *items = kept;
    Ok(())
}

/// Objects that are values in their own right, such as ids.
fn is_plain_value(value: &Value) -> bool {
    docschema_core::ObjectId::from_value(value).is_some()
}
