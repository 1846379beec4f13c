use std::sync::Arc;

use async_trait::async_trait;

use docschema_core::{Document, ObjectId, StoreResult};

use crate::options::{FindOptions, IndexSpec};

/// Counts reported by update operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Trait implemented by document stores.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the engine identifier (e.g. `memory`).
    fn engine(&self) -> &'static str;

    /// Get or create the named collection.
    async fn create_collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>>;

    /// Get an existing collection.
    async fn collection(&self, name: &str) -> StoreResult<Option<Arc<dyn Collection>>>;

    async fn list_collections(&self) -> StoreResult<Vec<String>>;
}

/// A named set of documents with selector based access.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    async fn drop_indexes(&self) -> StoreResult<()>;

    /// Create an index and return its name.
    async fn create_index(&self, spec: IndexSpec) -> StoreResult<String>;

    async fn list_indexes(&self) -> StoreResult<Vec<IndexSpec>>;

    async fn find(&self, selector: &Document, options: &FindOptions) -> StoreResult<Vec<Document>>;

    async fn find_one(
        &self,
        selector: &Document,
        projection: Option<&Document>,
    ) -> StoreResult<Option<Document>>;

    /// Insert all documents or none. Documents without an `_id` get a
    /// generated one; ids are returned in input order.
    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<ObjectId>>;

    async fn update_one(&self, selector: &Document, update: &Document) -> StoreResult<UpdateOutcome>;

    async fn update_many(&self, selector: &Document, update: &Document)
    -> StoreResult<UpdateOutcome>;

    async fn delete_many(&self, selector: &Document) -> StoreResult<u64>;

    async fn count(&self, selector: &Document) -> StoreResult<u64>;
}
