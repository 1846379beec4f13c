//! In-process document store.
//!
//! Collections keep their documents in insertion order behind a lock that is
//! never held across an await point, so every operation is atomic with
//! respect to other callers. Unique indexes are enforced on every write.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use docschema_core::{Document, ID_FIELD, ObjectId, StoreError, StoreResult, document_id};

use crate::options::{FindOptions, IndexSpec};
use crate::selector::{lookup, matches, project, sort_documents};
use crate::store::{Collection, Store, UpdateOutcome};
use crate::update::apply_update;

/// Store keeping every collection in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn create_collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| poisoned("store catalog"))?;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)));
        Ok(collection.clone())
    }

    async fn collection(&self, name: &str) -> StoreResult<Option<Arc<dyn Collection>>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| poisoned("store catalog"))?;
        Ok(collections
            .get(name)
            .map(|collection| collection.clone() as Arc<dyn Collection>))
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| poisoned("store catalog"))?;
        Ok(collections.keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

/// One in-memory collection.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    state: RwLock<CollectionState>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(CollectionState::default()),
        }
    }

    /// Snapshot of every stored document, in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        self.read()
            .map(|state| state.documents.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, CollectionState>> {
        self.state.read().map_err(|_| poisoned(&self.name))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, CollectionState>> {
        self.state.write().map_err(|_| poisoned(&self.name))
    }

    fn duplicate(&self, index: &IndexSpec) -> StoreError {
        StoreError::DuplicateKey {
            collection: self.name.clone(),
            index: index.name.clone(),
        }
    }

    /// Check unique indexes for `documents` replacing the rows at `skip`.
    fn check_unique(
        &self,
        state: &CollectionState,
        documents: &[Document],
        skip: &[usize],
    ) -> StoreResult<()> {
        for index in state.indexes.iter().filter(|index| index.unique) {
            let mut seen: Vec<Vec<Value>> = state
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| !skip.contains(position))
                .filter_map(|(_, document)| index_key(index, document))
                .collect();
            for document in documents {
                if let Some(key) = index_key(index, document) {
                    if seen.contains(&key) {
                        return Err(self.duplicate(index));
                    }
                    seen.push(key);
                }
            }
        }
        Ok(())
    }

    fn matching_positions(state: &CollectionState, selector: &Document) -> StoreResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (position, document) in state.documents.iter().enumerate() {
            if matches(document, selector)? {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    fn update_positions(
        &self,
        selector: &Document,
        update: &Document,
        limit_one: bool,
    ) -> StoreResult<UpdateOutcome> {
        let mut state = self.write()?;
        let mut positions = Self::matching_positions(&state, selector)?;
        if limit_one {
            positions.truncate(1);
        }

        let mut updated = Vec::with_capacity(positions.len());
        let mut modified = 0;
        for position in &positions {
            let mut document = state.documents[*position].clone();
            if apply_update(&mut document, update)? {
                modified += 1;
            }
            updated.push(document);
        }

        self.check_unique(&state, &updated, &positions)?;
        for (position, document) in positions.iter().zip(updated) {
            state.documents[*position] = document;
        }

        Ok(UpdateOutcome {
            matched: positions.len() as u64,
            modified,
        })
    }
}

/// Index key of a document; documents with a null or missing value are not indexed.
fn index_key(index: &IndexSpec, document: &Document) -> Option<Vec<Value>> {
    let key: Vec<Value> = index
        .fields
        .iter()
        .map(|field| lookup(document, field).cloned().unwrap_or(Value::Null))
        .collect();
    if key.iter().any(Value::is_null) {
        None
    } else {
        Some(key)
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Backend(format!("lock poisoned: {what}"))
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn drop_indexes(&self) -> StoreResult<()> {
        self.write()?.indexes.clear();
        Ok(())
    }

    async fn create_index(&self, spec: IndexSpec) -> StoreResult<String> {
        let mut state = self.write()?;
        if let Some(existing) = state.indexes.iter().find(|index| index.name == spec.name) {
            return Ok(existing.name.clone());
        }
        if spec.unique {
            let probe = CollectionState {
                documents: Vec::new(),
                indexes: vec![spec.clone()],
            };
            self.check_unique(&probe, &state.documents, &[])?;
        }
        let name = spec.name.clone();
        state.indexes.push(spec);
        Ok(name)
    }

    async fn list_indexes(&self) -> StoreResult<Vec<IndexSpec>> {
        Ok(self.read()?.indexes.clone())
    }

    async fn find(&self, selector: &Document, options: &FindOptions) -> StoreResult<Vec<Document>> {
        let mut found = {
            let state = self.read()?;
            let mut found = Vec::new();
            for document in &state.documents {
                if matches(document, selector)? {
                    found.push(document.clone());
                }
            }
            found
        };

        sort_documents(&mut found, &options.sort);
        let found = found
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX));

        match &options.projection {
            Some(projection) => found
                .map(|document| project(&document, projection))
                .collect(),
            None => Ok(found.collect()),
        }
    }

    async fn find_one(
        &self,
        selector: &Document,
        projection: Option<&Document>,
    ) -> StoreResult<Option<Document>> {
        let options = FindOptions {
            limit: Some(1),
            projection: projection.cloned(),
            ..FindOptions::default()
        };
        Ok(self.find(selector, &options).await?.into_iter().next())
    }

    async fn insert_many(&self, mut documents: Vec<Document>) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::with_capacity(documents.len());
        for document in &mut documents {
            let id = match document_id(document) {
                Some(id) => id,
                None => {
                    let id = ObjectId::new();
                    document.insert(ID_FIELD.to_string(), id.to_value());
                    id
                }
            };
            ids.push(id);
        }

        let mut state = self.write()?;
        let id_index = IndexSpec::unique(vec![ID_FIELD.to_string()]);
        let probe = CollectionState {
            documents: Vec::new(),
            indexes: vec![id_index],
        };
        let mut all = state.documents.clone();
        all.extend(documents.iter().cloned());
        self.check_unique(&probe, &all, &[])?;
        self.check_unique(&state, &documents, &[])?;

        state.documents.extend(documents);
        Ok(ids)
    }

    async fn update_one(&self, selector: &Document, update: &Document) -> StoreResult<UpdateOutcome> {
        self.update_positions(selector, update, true)
    }

    async fn update_many(
        &self,
        selector: &Document,
        update: &Document,
    ) -> StoreResult<UpdateOutcome> {
        self.update_positions(selector, update, false)
    }

    async fn delete_many(&self, selector: &Document) -> StoreResult<u64> {
        let mut state = self.write()?;
        let positions = Self::matching_positions(&state, selector)?;
        let mut position = 0;
        state.documents.retain(|_| {
            let keep = !positions.contains(&position);
            position += 1;
            keep
        });
        Ok(positions.len() as u64)
    }

    async fn count(&self, selector: &Document) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(Self::matching_positions(&state, selector)?.len() as u64)
    }
}
