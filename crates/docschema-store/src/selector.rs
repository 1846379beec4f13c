//! Selector matching, ordering and projection over JSON documents.

use std::cmp::Ordering;

use serde_json::Value;

use docschema_core::{Document, ID_FIELD, ObjectId, StoreError, StoreResult};

use crate::options::SortDirection;

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// True when `document` satisfies `selector`.
pub fn matches(document: &Document, selector: &Document) -> StoreResult<bool> {
    for (key, condition) in selector {
        let satisfied = match key.as_str() {
            "$or" => any_clause(document, key, condition)?,
            "$and" => all_clauses(document, key, condition)?,
            "$nor" => !any_clause(document, key, condition)?,
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidSelector(format!(
                    "unknown top level operator {op}"
                )));
            }
            field => match_field(lookup(document, field), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(operator: &str, condition: &'a Value) -> StoreResult<Vec<&'a Document>> {
    let items = condition.as_array().ok_or_else(|| {
        StoreError::InvalidSelector(format!("{operator} expects an array of selectors"))
    })?;
    items
        .iter()
        .map(|item| {
            item.as_object().ok_or_else(|| {
                StoreError::InvalidSelector(format!("{operator} entries must be objects"))
            })
        })
        .collect()
}

fn any_clause(document: &Document, operator: &str, condition: &Value) -> StoreResult<bool> {
    for clause in clauses(operator, condition)? {
        if matches(document, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn all_clauses(document: &Document, operator: &str, condition: &Value) -> StoreResult<bool> {
    for clause in clauses(operator, condition)? {
        if !matches(document, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Operator objects have only `$`-prefixed keys and are not ids.
pub(crate) fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            !map.is_empty()
                && map.keys().all(|key| key.starts_with('$'))
                && ObjectId::from_value(value).is_none()
        }
        _ => false,
    }
}

fn match_field(value: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    let Value::Object(operators) = condition else {
        return Ok(field_equals(value, condition));
    };
    if !is_operator_object(condition) {
        return Ok(field_equals(value, condition));
    }

    for (operator, argument) in operators {
        let satisfied = match operator.as_str() {
            "$eq" => field_equals(value, argument),
            "$ne" => !field_equals(value, argument),
            "$in" => in_list(value, operator, argument)?,
            "$nin" => !in_list(value, operator, argument)?,
            "$gt" => compare_field(value, argument, |ord| ord == Ordering::Greater),
            "$gte" => compare_field(value, argument, |ord| ord != Ordering::Less),
            "$lt" => compare_field(value, argument, |ord| ord == Ordering::Less),
            "$lte" => compare_field(value, argument, |ord| ord != Ordering::Greater),
            "$exists" => value.is_some() == argument.as_bool().unwrap_or(true),
            "$size" => {
                let expected = argument.as_u64().ok_or_else(|| {
                    StoreError::InvalidSelector("$size expects a non-negative integer".to_string())
                })?;
                value
                    .and_then(Value::as_array)
                    .is_some_and(|items| items.len() as u64 == expected)
            }
            other => {
                return Err(StoreError::InvalidSelector(format!(
                    "unknown field operator {other}"
                )));
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(value: Option<&Value>, operator: &str, argument: &Value) -> StoreResult<bool> {
    let candidates = argument
        .as_array()
        .ok_or_else(|| StoreError::InvalidSelector(format!("{operator} expects an array")))?;
    Ok(candidates
        .iter()
        .any(|candidate| field_equals(value, candidate)))
}

/// Equality with array membership: an array field equals a scalar it contains.
fn field_equals(value: Option<&Value>, target: &Value) -> bool {
    match value {
        None => target.is_null(),
        Some(Value::Array(items)) if !target.is_array() => {
            items.iter().any(|item| loose_eq(item, target))
        }
        Some(value) => loose_eq(value, target),
    }
}

fn compare_field(value: Option<&Value>, target: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    if type_rank(value) != type_rank(target) {
        return false;
    }
    accept(compare_values(value, target))
}

/// Structural equality that treats `1` and `1.0` as equal.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| loose_eq(x, y)))
        }
        _ => left == right,
    }
}

fn type_rank(value: &Value) -> u8 {
    if ObjectId::from_value(value).is_some() {
        return 4;
    }
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 5,
        Value::Bool(_) => 6,
    }
}

/// Total order used for sorting: type bracket first, then value.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }
    if let (Some(a), Some(b)) = (ObjectId::from_value(left), ObjectId::from_value(right)) {
        return a.cmp(&b);
    }
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_values(x, y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Value::Object(a), Value::Object(b)) => a
            .iter()
            .zip(b)
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(va, vb)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => Ordering::Equal,
    }
}

/// Stable sort by the given keys; missing fields sort as null.
pub fn sort_documents(documents: &mut [Document], sort: &[(String, SortDirection)]) {
    if sort.is_empty() {
        return;
    }
    documents.sort_by(|left, right| {
        sort.iter()
            .map(|(field, direction)| {
                let a = lookup(left, field).unwrap_or(&Value::Null);
                let b = lookup(right, field).unwrap_or(&Value::Null);
                let ord = compare_values(a, b);
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => true,
    }
}

/// Apply an inclusion or exclusion projection to top level fields.
pub fn project(document: &Document, projection: &Document) -> StoreResult<Document> {
    let include_id = projection.get(ID_FIELD).is_none_or(is_truthy);
    let fields: Vec<(&String, bool)> = projection
        .iter()
        .filter(|(key, _)| key.as_str() != ID_FIELD)
        .map(|(key, value)| (key, is_truthy(value)))
        .collect();

    let inclusive = fields.iter().any(|(_, include)| *include);
    if inclusive && fields.iter().any(|(_, include)| !*include) {
        return Err(StoreError::InvalidSelector(
            "projection cannot mix inclusion and exclusion".to_string(),
        ));
    }

    let mut output = Document::new();
    for (key, value) in document {
        let listed = fields.iter().any(|(field, _)| *field == key);
        let keep = if key == ID_FIELD {
            include_id
        } else if inclusive {
            listed
        } else {
            !listed
        };
        if keep {
            output.insert(key.clone(), value.clone());
        }
    }
    Ok(output)
}
