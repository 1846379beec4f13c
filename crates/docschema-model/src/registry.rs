use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use docschema_core::{Definitions, Result, Schema, validate_definitions};
use docschema_store::Store;

use crate::model::Model;

/// A model declared in code.
///
/// ```ignore
/// struct Users;
///
/// impl ModelDefinition for Users {
///     const COLLECTION: &'static str = "users";
///
///     fn schema() -> Result<Schema> {
///         Schema::from_items([SchemaItem::new("email", Text::new(3, 254)).unique()])
///     }
/// }
/// ```
pub trait ModelDefinition {
    const COLLECTION: &'static str;

    fn schema() -> Result<Schema>;
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    models: RwLock<BTreeMap<String, Arc<Model>>>,
}

/// Process-wide lookup of models by collection name.
///
/// Registering the same collection twice returns the first model. Cloning a
/// registry shares it.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    inner: Arc<RegistryInner>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    /// Build one model per collection after checking the definitions.
    pub fn from_definitions(definitions: &Definitions) -> Result<Self> {
        validate_definitions(definitions)?;
        let registry = Self::new();
        for collection in &definitions.collections {
            registry.register(Model::new(collection.name.clone(), collection.to_schema()?));
        }
        Ok(registry)
    }

    /// Add `model` unless its collection is already registered.
    pub fn register(&self, model: Model) -> Arc<Model> {
        let mut models = self
            .inner
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = models.get(model.collection_name()) {
            return Arc::clone(existing);
        }
        model.attach(Arc::downgrade(&self.inner));
        let model = Arc::new(model);
        models.insert(model.collection_name().to_string(), Arc::clone(&model));
        model
    }

    /// Register a model declared through [`ModelDefinition`].
    ///
    /// The schema is only built the first time the collection is registered.
    pub fn register_model<D: ModelDefinition>(&self) -> Result<Arc<Model>> {
        if let Some(existing) = self.get_by_name(D::COLLECTION) {
            return Ok(existing);
        }
        Ok(self.register(Model::new(D::COLLECTION, D::schema()?)))
    }

    pub fn get_by_name(&self, collection: &str) -> Option<Arc<Model>> {
        self.inner
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
    }

    /// Registered models ordered by collection name.
    pub fn models(&self) -> Vec<Arc<Model>> {
        self.inner
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Initialize every registered model against `store`, stopping at the
    /// first failure.
    pub async fn initialize_all(&self, store: &dyn Store) -> Result<()> {
        let models = self.models();
        for model in &models {
            model.initialize(store).await?;
        }
        info!(event = "registry_initialized", models = models.len(), engine = store.engine());
        Ok(())
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .models()
            .iter()
            .map(|model| model.collection_name().to_string())
            .collect();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}
