use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use docschema_core::{
    DependencyKind, Document, Error, ID_FIELD, ObjectId, Result, Schema, SchemaItem, StoreError,
    id_selector,
};
use docschema_store::{Collection, FindOptions, IndexSpec, Store};

use crate::instance::ModelInstance;
use crate::registry::{ModelRegistry, RegistryInner};
use crate::relations;
use crate::update::UpdateRequest;

/// Lifecycle of a model's binding to its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Uninitialized,
    Initializing,
    Ready,
}

/// What happens to documents holding a required reference to a removed one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse to remove anything while required dependents exist.
    #[default]
    Restrict,
    /// Remove required dependents too.
    Cascade,
}

enum ModelState {
    Uninitialized,
    Initializing,
    Ready(Arc<dyn Collection>),
}

/// Repository for one collection.
///
/// Every data operation fails with [`Error::NotInitialized`] until
/// [`Model::initialize`] has bound the model to a store.
pub struct Model {
    collection_name: String,
    default_schema: Schema,
    state: Mutex<ModelState>,
    init_lock: tokio::sync::Mutex<()>,
    registry: OnceLock<Weak<RegistryInner>>,
}

impl Model {
    pub fn new(collection_name: impl Into<String>, default_schema: Schema) -> Self {
        Self {
            collection_name: collection_name.into(),
            default_schema,
            state: Mutex::new(ModelState::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
            registry: OnceLock::new(),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Template cloned into every new instance.
    pub fn default_schema(&self) -> &Schema {
        &self.default_schema
    }

    pub fn status(&self) -> ModelStatus {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            ModelState::Uninitialized => ModelStatus::Uninitialized,
            ModelState::Initializing => ModelStatus::Initializing,
            ModelState::Ready(_) => ModelStatus::Ready,
        }
    }

    /// Registry this model belongs to.
    ///
    /// `Ok(None)` for a model that was never registered. Once the registry
    /// it was registered with is dropped this fails with [`Error::Detached`].
    pub fn registry(&self) -> Result<Option<ModelRegistry>> {
        let Some(weak) = self.registry.get() else {
            return Ok(None);
        };
        weak.upgrade()
            .map(|inner| Some(ModelRegistry::from_inner(inner)))
            .ok_or_else(|| Error::Detached(self.collection_name.clone()))
    }

    /// Registered model for `collection`, looked up through this model's registry.
    pub(crate) fn sibling(&self, collection: &str) -> Result<Option<Arc<Model>>> {
        Ok(self
            .registry()?
            .and_then(|registry| registry.get_by_name(collection)))
    }

    pub(crate) fn attach(&self, registry: Weak<RegistryInner>) {
        let _ = self.registry.set(registry);
    }

    /// Bind the model to `store`: obtain the collection, drop its indexes
    /// and rebuild them from the schema.
    ///
    /// Concurrent callers wait for the first one; calling again once ready
    /// is a no-op. A failed attempt leaves the model uninitialized.
    pub async fn initialize(&self, store: &dyn Store) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        if self.status() == ModelStatus::Ready {
            return Ok(());
        }
        self.set_state(ModelState::Initializing);

        match self.open(store).await {
            Ok(collection) => {
                self.set_state(ModelState::Ready(collection));
                info!(
                    event = "model_initialized",
                    collection = %self.collection_name,
                    engine = store.engine()
                );
                Ok(())
            }
            Err(err) => {
                self.set_state(ModelState::Uninitialized);
                warn!(
                    event = "model_initialize_failed",
                    collection = %self.collection_name,
                    error = %err
                );
                Err(err)
            }
        }
    }

    async fn open(&self, store: &dyn Store) -> Result<Arc<dyn Collection>> {
        let collection = store.create_collection(&self.collection_name).await?;
        collection.drop_indexes().await?;

        let indexers: Vec<String> = self
            .default_schema
            .indexer_items()
            .map(|item| item.name().to_string())
            .collect();
        for item in self.default_schema.items() {
            let flags = item.flags();
            if flags.indexable {
                collection.create_index(IndexSpec::single(item.name())).await?;
            }
            if flags.unique {
                let mut fields = indexers.clone();
                if !fields.iter().any(|field| field == item.name()) {
                    fields.push(item.name().to_string());
                }
                let name = collection.create_index(IndexSpec::unique(fields)).await?;
                debug!(event = "unique_index_created", collection = %self.collection_name, index = %name);
            }
        }
        Ok(collection)
    }

    fn set_state(&self, state: ModelState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub(crate) fn collection(&self) -> Result<Arc<dyn Collection>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            ModelState::Ready(collection) => Ok(Arc::clone(collection)),
            _ => Err(Error::NotInitialized(self.collection_name.clone())),
        }
    }

    /// A fresh, unsaved instance holding the schema defaults.
    pub fn new_instance(self: &Arc<Self>) -> ModelInstance {
        ModelInstance::new(Arc::clone(self))
    }

    /// An unsaved instance with `data` applied, read-only fields included.
    pub fn instance_from(self: &Arc<Self>, data: &Document) -> ModelInstance {
        let mut instance = self.new_instance();
        instance.schema_mut().set_values(data, true);
        instance
    }

    pub async fn count(&self, selector: &Document) -> Result<u64> {
        Ok(self.collection()?.count(selector).await?)
    }

    pub async fn find_instances(
        self: &Arc<Self>,
        selector: &Document,
        options: &FindOptions,
    ) -> Result<Vec<ModelInstance>> {
        let rows = self.collection()?.find(selector, options).await?;
        Ok(rows
            .into_iter()
            .map(|row| ModelInstance::from_row(Arc::clone(self), row))
            .collect())
    }

    pub async fn find_one(
        self: &Arc<Self>,
        selector: &Document,
        projection: Option<&Document>,
    ) -> Result<Option<ModelInstance>> {
        let row = self.collection()?.find_one(selector, projection).await?;
        Ok(row.map(|row| ModelInstance::from_row(Arc::clone(self), row)))
    }

    pub async fn find_by_id(self: &Arc<Self>, id: ObjectId) -> Result<Option<ModelInstance>> {
        self.find_one(&id_selector(id), None).await
    }

    /// True when no other document shares any of the instance's unique values.
    ///
    /// Null unique values are ignored. Unique indexer fields scope the check
    /// and an instance that already has an id never collides with itself.
    pub async fn check_uniqueness(&self, instance: &ModelInstance) -> Result<bool> {
        let schema = instance.schema();
        let clauses: Vec<Value> = populated_unique(schema)
            .map(|item| json!({ item.name(): item.db_value() }))
            .collect();
        if clauses.is_empty() {
            return Ok(true);
        }

        let mut selector = uniqueness_scope(schema, instance.id());
        selector.insert("$or".to_string(), Value::Array(clauses));
        Ok(self.count(&selector).await? == 0)
    }

    /// Names of the unique fields that collide, in declaration order.
    async fn unique_violations(&self, instance: &ModelInstance) -> Result<Vec<String>> {
        let schema = instance.schema();
        let mut violations = Vec::new();
        for item in populated_unique(schema) {
            let mut selector = uniqueness_scope(schema, instance.id());
            selector.insert(item.name().to_string(), item.db_value().clone());
            if self.count(&selector).await? > 0 {
                violations.push(item.name().to_string());
            }
        }
        Ok(violations)
    }

    async fn ensure_unique(&self, instance: &ModelInstance) -> Result<()> {
        if self.check_uniqueness(instance).await? {
            return Ok(());
        }
        let mut fields = self.unique_violations(instance).await?;
        if fields.is_empty() {
            fields = populated_unique(instance.schema())
                .map(|item| item.name().to_string())
                .collect();
        }
        Err(Error::NotUnique { fields })
    }

    /// Validate `data`, confirm its unique fields are free and insert it.
    ///
    /// Read-only fields may be set here. Fields flagged as required must be
    /// present as keys in `data`.
    pub async fn create_instance(self: &Arc<Self>, data: &Document) -> Result<ModelInstance> {
        self.collection()?;
        if let Some(missing) = self
            .default_schema
            .items()
            .iter()
            .find(|item| item.flags().required && !data.contains_key(item.name()))
        {
            return Err(Error::Validation(format!("'{}' is required", missing.name())));
        }

        let mut instance = self.instance_from(data);
        instance.schema_mut().validated()?;
        self.ensure_unique(&instance).await?;

        let mut inserted = self.insert(vec![instance]).await?;
        inserted
            .pop()
            .ok_or_else(|| Error::NotFound(format!("insert into '{}' returned nothing", self.collection_name)))
    }

    /// Validate every instance, then store them as one batch.
    ///
    /// The first invalid instance aborts the call before anything is written.
    /// Inserted instances come back in input order with their ids bound.
    pub async fn insert(&self, instances: Vec<ModelInstance>) -> Result<Vec<ModelInstance>> {
        let collection = self.collection()?;
        if instances.is_empty() {
            return Ok(instances);
        }

        let mut instances = instances;
        for instance in &mut instances {
            if instance.model().collection_name() != self.collection_name {
                return Err(Error::InvalidSchema(format!(
                    "instance of '{}' cannot be inserted into '{}'",
                    instance.model().collection_name(),
                    self.collection_name
                )));
            }
            if let Some(id) = instance.id() {
                return Err(Error::InvalidSchema(format!(
                    "instance {id} is already stored in '{}'",
                    self.collection_name
                )));
            }
            instance.schema_mut().validated()?;
        }

        for instance in &mut instances {
            relations::resolve_references(self, instance.schema_mut()).await?;
        }

        let documents: Vec<Document> = instances
            .iter()
            .map(|instance| instance.schema().serialize())
            .collect();
        let ids = collection.insert_many(documents.clone()).await?;

        for ((instance, id), document) in instances.iter_mut().zip(ids.iter().copied()).zip(documents) {
            instance.assign_id(id);
            instance.remember(document);
        }
        for (position, instance) in instances.iter().enumerate() {
            let Some(id) = instance.id() else {
                continue;
            };
            if let Err(err) = relations::link(self, id, instance.schema()).await {
                self.roll_back_insert(collection.as_ref(), &instances[..=position], &ids)
                    .await;
                return Err(err);
            }
        }
        info!(
            event = "instances_inserted",
            collection = %self.collection_name,
            count = instances.len()
        );
        Ok(instances)
    }

    /// Undo a batch whose dependency records could not all be written: pull
    /// the records already pushed by `linked` and delete every inserted row.
    async fn roll_back_insert(&self, collection: &dyn Collection, linked: &[ModelInstance], ids: &[ObjectId]) {
        for instance in linked {
            if let Some(id) = instance.id() {
                if let Err(err) = relations::unlink(self, id, instance.schema()).await {
                    warn!(event = "insert_rollback_failed", collection = %self.collection_name, id = %id, error = %err);
                }
            }
        }
        let wanted: Vec<Value> = ids.iter().map(ObjectId::to_value).collect();
        let mut selector = Document::new();
        selector.insert(ID_FIELD.to_string(), json!({ "$in": wanted }));
        match collection.delete_many(&selector).await {
            Ok(deleted) => warn!(event = "insert_rolled_back", collection = %self.collection_name, deleted),
            Err(err) => warn!(event = "insert_rollback_failed", collection = %self.collection_name, error = %err),
        }
    }

    /// Apply `data` to every document matching `selector`.
    ///
    /// Rows are handled one at a time and independently: a row failing
    /// validation or uniqueness is reported in its token while the others are
    /// still written. Read-only fields in `data` are ignored. Store failures
    /// abort the whole call.
    pub async fn update(self: &Arc<Self>, selector: &Document, data: &Document) -> Result<UpdateRequest> {
        let collection = self.collection()?;
        let instances = self.find_instances(selector, &FindOptions::default()).await?;

        let mut request = UpdateRequest::default();
        for mut instance in instances {
            let Some(id) = instance.id() else {
                continue;
            };
            let previous = instance.schema().clone();
            instance.schema_mut().set_values(data, false);

            match self
                .update_instance(collection.as_ref(), &previous, id, &mut instance)
                .await
            {
                Ok(()) => request.succeeded(id, instance),
                Err(err) if is_row_failure(&err) => {
                    debug!(
                        event = "instance_update_failed",
                        collection = %self.collection_name,
                        id = %id,
                        error = %err
                    );
                    request.failed(id, instance, err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            event = "instances_updated",
            collection = %self.collection_name,
            matched = request.tokens.len(),
            failed = request.failures().count()
        );
        Ok(request)
    }

    async fn update_instance(
        &self,
        collection: &dyn Collection,
        previous: &Schema,
        id: ObjectId,
        instance: &mut ModelInstance,
    ) -> Result<()> {
        instance.schema_mut().validated()?;
        relations::resolve_references(self, instance.schema_mut()).await?;
        self.ensure_unique(instance).await?;

        let document = instance.schema().serialize();
        let mut update = Document::new();
        update.insert("$set".to_string(), Value::Object(document.clone()));
        collection.update_one(&id_selector(id), &update).await?;

        relations::relink(self, id, previous, instance.schema()).await?;
        instance.remember(document);
        Ok(())
    }

    /// Update one document by id, failing when it is missing or rejected.
    pub async fn update_by_id(self: &Arc<Self>, id: ObjectId, data: &Document) -> Result<ModelInstance> {
        let request = self.update(&id_selector(id), data).await?;
        let token = request.tokens.into_iter().next().ok_or_else(|| {
            Error::NotFound(format!("{} {id} does not exist", self.collection_name))
        })?;
        match token.message {
            Some(message) if token.error => Err(Error::Validation(message)),
            _ => Ok(token.instance),
        }
    }

    /// Raw delete of every matching document. Dependency records are not
    /// touched; see [`Model::remove_instances`] for that.
    pub async fn delete_instances(&self, selector: &Document) -> Result<u64> {
        let deleted = self.collection()?.delete_many(selector).await?;
        info!(event = "instances_deleted", collection = %self.collection_name, deleted);
        Ok(deleted)
    }

    /// Remove matching documents while keeping references consistent.
    ///
    /// Optional references to a removed document are nulled, id lists drop
    /// it, and required dependents are removed too under
    /// [`DeletePolicy::Cascade`]. Under [`DeletePolicy::Restrict`] nothing is
    /// removed if any matched document still has required dependents.
    /// Returns the number of documents removed, dependents included.
    pub async fn remove_instances(self: &Arc<Self>, selector: &Document, policy: DeletePolicy) -> Result<u64> {
        let collection = self.collection()?;
        let instances = self.find_instances(selector, &FindOptions::default()).await?;

        if policy == DeletePolicy::Restrict {
            for instance in &instances {
                let dependents = instance.dependencies(DependencyKind::Required);
                if let (Some(id), Some(first)) = (instance.id(), dependents.first()) {
                    return Err(Error::Validation(format!(
                        "{} {id} is still referenced by '{}' in {}",
                        self.collection_name,
                        first.property_name.as_deref().unwrap_or(ID_FIELD),
                        first.collection
                    )));
                }
            }
        }

        relations::ensure_reachable(self, &instances)?;

        let mut removed = 0;
        for instance in instances {
            let Some(id) = instance.id() else {
                continue;
            };
            let deleted = collection.delete_many(&id_selector(id)).await?;
            if deleted == 0 {
                continue;
            }
            removed += deleted;

            relations::unlink(self, id, instance.schema()).await?;
            for record in instance.dependencies(DependencyKind::Required) {
                let dependent = relations::registered(self, &record.collection)?;
                removed += Box::pin(dependent.remove_instances(&id_selector(record.id), DeletePolicy::Cascade)).await?;
            }
            relations::release(self, &instance).await?;
        }

        info!(
            event = "instances_removed",
            collection = %self.collection_name,
            removed,
            cascade = policy == DeletePolicy::Cascade
        );
        Ok(removed)
    }
}

/// Unique fields holding a value; null never collides.
fn populated_unique(schema: &Schema) -> impl Iterator<Item = &SchemaItem> {
    schema
        .unique_items()
        .filter(|item| !item.db_value().is_null())
}

/// Base selector for uniqueness queries: indexer equalities plus self exclusion.
fn uniqueness_scope(schema: &Schema, id: Option<ObjectId>) -> Document {
    let mut selector = Document::new();
    for item in schema.indexer_items() {
        selector.insert(item.name().to_string(), item.db_value().clone());
    }
    if let Some(id) = id {
        selector.insert(ID_FIELD.to_string(), json!({ "$ne": id.to_value() }));
    }
    selector
}

fn is_row_failure(err: &Error) -> bool {
    err.is_validation() || matches!(err, Error::Store(StoreError::DuplicateKey { .. }))
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("collection_name", &self.collection_name)
            .field("status", &self.status())
            .field("fields", &self.default_schema.len())
            .finish()
    }
}
