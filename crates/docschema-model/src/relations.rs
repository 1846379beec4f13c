//! Reference resolution and dependency bookkeeping between collections.
//!
//! Every stored reference `source.property -> target` is mirrored by a
//! [`DependencyRecord`] pushed onto the target document, in the field named
//! by its [`DependencyKind`]. Removal walks those records instead of
//! scanning every collection.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use docschema_core::{
    DependencyKind, DependencyRecord, Document, Error, ID_FIELD, Kind, ObjectId, Result, Schema,
    id_selector,
};

use crate::instance::ModelInstance;
use crate::model::Model;

/// One outgoing reference held by a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Reference {
    property: String,
    target: String,
    kind: DependencyKind,
    id: ObjectId,
}

fn references(schema: &Schema) -> BTreeSet<Reference> {
    let mut found = BTreeSet::new();
    for item in schema.reference_items() {
        let Some(target) = item.target_collection() else {
            continue;
        };
        let (kind, ids) = match item.kind() {
            Kind::ForeignKey(rule) if rule.optional_key => {
                (DependencyKind::Optional, item.object_id().into_iter().collect())
            }
            Kind::ForeignKey(_) => (DependencyKind::Required, item.object_id().into_iter().collect()),
            _ => (DependencyKind::Array, item.object_ids()),
        };
        for id in ids {
            found.insert(Reference {
                property: item.name().to_string(),
                target: target.to_string(),
                kind,
                id,
            });
        }
    }
    found
}

/// Model of `collection` in the registry `owner` belongs to.
pub(crate) fn registered(owner: &Model, collection: &str) -> Result<Arc<Model>> {
    owner.sibling(collection)?.ok_or_else(|| {
        Error::NotFound(format!(
            "'{}' depends on '{collection}' which is not registered",
            owner.collection_name()
        ))
    })
}

/// Fail unless every collection the instances reference, or are referenced
/// from, is reachable through `owner`'s registry.
pub(crate) fn ensure_reachable(owner: &Model, instances: &[ModelInstance]) -> Result<()> {
    let mut collections = BTreeSet::new();
    for instance in instances {
        collections.extend(references(instance.schema()).into_iter().map(|r| r.target));
        for kind in DependencyKind::ALL {
            collections.extend(instance.dependencies(kind).into_iter().map(|r| r.collection));
        }
    }
    for collection in collections {
        registered(owner, &collection)?;
    }
    Ok(())
}

/// Check that every reference in `schema` points at an existing document.
///
/// Missing targets of optional keys are nulled and missing ids are dropped
/// from id lists; an unset or missing target of a required key is an error.
pub(crate) async fn resolve_references(owner: &Model, schema: &mut Schema) -> Result<()> {
    let pending: Vec<(String, String, Kind)> = schema
        .reference_items()
        .filter_map(|item| {
            item.target_collection()
                .map(|target| (item.name().to_string(), target.to_string(), item.kind().clone()))
        })
        .collect();

    for (name, target, kind) in pending {
        let Some(item) = schema.get(&name) else {
            continue;
        };
        let unset = match &kind {
            Kind::ForeignKey(rule) => rule.optional_key && item.object_id().is_none(),
            _ => item.object_ids().is_empty(),
        };
        if unset {
            continue;
        }
        let Some(model) = owner.sibling(&target)? else {
            return Err(Error::Validation(format!(
                "'{name}' references a foreign key '{target}' which doesn't seem to exist"
            )));
        };

        match kind {
            Kind::ForeignKey(rule) => {
                let exists = match item.object_id() {
                    Some(id) => model.count(&id_selector(id)).await? > 0,
                    None => false,
                };
                if exists {
                    continue;
                }
                if !rule.optional_key {
                    return Err(Error::Validation(format!("'{name}' does not exist")));
                }
                debug!(event = "reference_nulled", property = %name, target = %target);
                schema.set(&name, Value::Null);
            }
            _ => {
                let ids = item.object_ids();
                let wanted: Vec<Value> = ids.iter().map(ObjectId::to_value).collect();
                let mut selector = Document::new();
                selector.insert(ID_FIELD.to_string(), json!({ "$in": wanted }));
                let existing: BTreeSet<ObjectId> = model
                    .find_instances(&selector, &Default::default())
                    .await?
                    .iter()
                    .filter_map(ModelInstance::id)
                    .collect();
                if existing.len() == ids.len() {
                    continue;
                }
                let kept: Vec<Value> = ids
                    .iter()
                    .filter(|id| existing.contains(id))
                    .map(ObjectId::to_value)
                    .collect();
                debug!(
                    event = "reference_ids_pruned",
                    property = %name,
                    target = %target,
                    pruned = ids.len() - kept.len()
                );
                schema.set(&name, Value::Array(kept));
            }
        }
    }
    Ok(())
}

fn record_for(source: &str, source_id: ObjectId, reference: &Reference) -> Value {
    DependencyRecord::new(source, reference.property.clone(), source_id).to_value()
}

async fn apply_to_target(owner: &Model, reference: &Reference, operator: &str, record: Value) -> Result<()> {
    let model = registered(owner, &reference.target)?;
    let field = reference.kind.field();
    let mut update = Document::new();
    update.insert(operator.to_string(), json!({ field: record }));
    model
        .collection()?
        .update_one(&id_selector(reference.id), &update)
        .await?;
    Ok(())
}

async fn push_records<'a>(
    owner: &Model,
    source_id: ObjectId,
    references: impl IntoIterator<Item = &'a Reference>,
) -> Result<()> {
    for reference in references {
        let record = record_for(owner.collection_name(), source_id, reference);
        apply_to_target(owner, reference, "$push", record).await?;
    }
    Ok(())
}

async fn pull_records<'a>(
    owner: &Model,
    source_id: ObjectId,
    references: impl IntoIterator<Item = &'a Reference>,
) -> Result<()> {
    for reference in references {
        let record = record_for(owner.collection_name(), source_id, reference);
        apply_to_target(owner, reference, "$pull", record).await?;
    }
    Ok(())
}

/// Push dependency records for every reference of a newly stored document.
pub(crate) async fn link(owner: &Model, source_id: ObjectId, schema: &Schema) -> Result<()> {
    push_records(owner, source_id, &references(schema)).await
}

/// Pull the dependency records a document left on its targets.
pub(crate) async fn unlink(owner: &Model, source_id: ObjectId, schema: &Schema) -> Result<()> {
    pull_records(owner, source_id, &references(schema)).await
}

/// Move dependency records after an update changed some references.
pub(crate) async fn relink(
    owner: &Model,
    source_id: ObjectId,
    previous: &Schema,
    current: &Schema,
) -> Result<()> {
    let before = references(previous);
    let after = references(current);
    pull_records(owner, source_id, before.difference(&after)).await?;
    push_records(owner, source_id, after.difference(&before)).await
}

/// Detach a removed document from its non-required dependents: optional
/// references to it become null and id lists drop it.
pub(crate) async fn release(owner: &Model, removed: &ModelInstance) -> Result<()> {
    let Some(removed_id) = removed.id() else {
        return Ok(());
    };
    for kind in [DependencyKind::Optional, DependencyKind::Array] {
        for record in removed.dependencies(kind) {
            let Some(property) = record.property_name.as_deref() else {
                continue;
            };
            let model = registered(owner, &record.collection)?;
            let change = match kind {
                DependencyKind::Array => json!({ "$pull": { property: removed_id.to_value() } }),
                _ => json!({ "$set": { property: Value::Null } }),
            };
            let Value::Object(update) = change else {
                continue;
            };
            model
                .collection()?
                .update_one(&id_selector(record.id), &update)
                .await?;
        }
    }
    Ok(())
}
