use std::fmt;
use std::sync::Arc;

use docschema_core::{
    DependencyKind, DependencyRecord, Document, ID_FIELD, JsonOptions, ObjectId, Result, Schema,
    document_id, read_dependencies,
};

use crate::expand;
use crate::model::Model;

/// A live record: a schema clone bound to a stored document.
///
/// The id is unset until the first successful insert and never changes
/// afterwards.
#[derive(Clone)]
pub struct ModelInstance {
    model: Arc<Model>,
    schema: Schema,
    id: Option<ObjectId>,
    db_entry: Option<Document>,
}

impl ModelInstance {
    pub(crate) fn new(model: Arc<Model>) -> Self {
        let schema = model.default_schema().clone();
        Self {
            model,
            schema,
            id: None,
            db_entry: None,
        }
    }

    pub(crate) fn from_row(model: Arc<Model>, row: Document) -> Self {
        let mut instance = Self::new(model);
        instance.schema.deserialize(&row);
        instance.id = document_id(&row);
        instance.db_entry = Some(row);
        instance
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    /// Dependency records of `kind` held on the stored document.
    pub fn dependencies(&self, kind: DependencyKind) -> Vec<DependencyRecord> {
        self.db_entry
            .as_ref()
            .map(|entry| read_dependencies(entry, kind))
            .unwrap_or_default()
    }

    /// Outward facing rendering, expanding foreign keys when asked to.
    pub async fn to_json(&self, options: &JsonOptions) -> Result<Document> {
        expand::render(self, options).await
    }

    /// Bind the store-generated id; ignored once an id is set.
    pub(crate) fn assign_id(&mut self, id: ObjectId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    /// Record `written` as the stored state, keeping fields the schema does not own.
    pub(crate) fn remember(&mut self, written: Document) {
        let entry = self.db_entry.get_or_insert_with(Document::new);
        entry.extend(written);
        if let Some(id) = self.id {
            entry.insert(ID_FIELD.to_string(), id.to_value());
        }
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("collection", &self.model.collection_name())
            .field("id", &self.id)
            .field("schema", &self.schema)
            .finish()
    }
}
