//! Rendering with references replaced by the documents they point at.

use std::sync::Arc;

use serde_json::Value;

use docschema_core::{Document, JsonOptions, Kind, ObjectId, Result};

use crate::instance::ModelInstance;
use crate::model::Model;

/// Documents already being rendered on the current path.
type Path = Vec<(String, ObjectId)>;

pub(crate) async fn render(instance: &ModelInstance, options: &JsonOptions) -> Result<Document> {
    render_within(instance, options, options.expand_max_depth, Path::new()).await
}

/// Expansion stops after `depth` hops, at blacklisted collections and at any
/// document already on the path, so reference cycles terminate.
///
/// Foreign keys become the target document, or null once it is gone. Id
/// lists bound to a collection become the list of documents still present.
async fn render_within(
    instance: &ModelInstance,
    options: &JsonOptions,
    depth: u32,
    mut path: Path,
) -> Result<Document> {
    let mut output = instance.schema().to_json(instance.id(), options);
    if !options.expand_foreign_keys || depth == 0 {
        return Ok(output);
    }
    if let Some(id) = instance.id() {
        path.push((instance.model().collection_name().to_string(), id));
    }

    for item in instance.schema().reference_items() {
        if item.flags().sensitive && !options.verbose {
            continue;
        }
        let Some(target) = item.target_collection() else {
            continue;
        };
        if options.is_blacklisted(target) {
            continue;
        }
        let Some(model) = instance.model().sibling(target)? else {
            continue;
        };
        let on_path = |id: &ObjectId| path.iter().any(|(c, i)| c == target && i == id);

        let expanded = match item.kind() {
            Kind::ForeignKey(_) => {
                let Some(id) = item.object_id().filter(|id| !on_path(id)) else {
                    continue;
                };
                expand_one(&model, id, options, depth, &path)
                    .await?
                    .map_or(Value::Null, Value::Object)
            }
            _ => {
                let ids = item.object_ids();
                if ids.iter().any(|id| on_path(id)) {
                    continue;
                }
                let mut documents = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(document) = expand_one(&model, id, options, depth, &path).await? {
                        documents.push(Value::Object(document));
                    }
                }
                Value::Array(documents)
            }
        };
        output.insert(item.name().to_string(), expanded);
    }
    Ok(output)
}

async fn expand_one(
    model: &Arc<Model>,
    id: ObjectId,
    options: &JsonOptions,
    depth: u32,
    path: &Path,
) -> Result<Option<Document>> {
    match model.find_by_id(id).await? {
        Some(found) => Ok(Some(
            Box::pin(render_within(&found, options, depth - 1, path.clone())).await?,
        )),
        None => Ok(None),
    }
}
