use super::{Collection, Document, DocumentStore, FieldFilter, Fields, StoreError, StoreResult};
use crate::constants::{CREATED_AT_FIELD, UPDATED_AT_FIELD};
use crate::ids::DocumentId;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    collections: HashMap<Collection, BTreeMap<DocumentId, Fields>>,
    last_stamp: Option<DateTime<Utc>>,
}

impl State {
    /// Store clock. Strictly increasing so that write order survives equal wall-clock reads.
    fn next_stamp(&mut self) -> Value {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    fn collection(&mut self, collection: Collection) -> &mut BTreeMap<DocumentId, Fields> {
        self.collections.entry(collection).or_default()
    }
}

/// In-process document store.
///
/// Backs the development server and the test suite. Documents live in memory only and are
/// lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: RwLock<State>,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful write operations since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents currently held in `collection`.
    pub async fn len(&self, collection: Collection) -> usize {
        let state = self.state.read().await;
        state.collections.get(&collection).map_or(0, BTreeMap::len)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn to_document(id: &DocumentId, fields: &Fields) -> Document {
    Document {
        id: id.clone(),
        fields: fields.clone(),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: Collection, id: &DocumentId) -> StoreResult<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| to_document(id, fields)))
    }

    async fn query(
        &self,
        collection: Collection,
        filter: &FieldFilter,
    ) -> StoreResult<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| filter.matches(fields))
                    .map(|(id, fields)| to_document(id, fields))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| to_document(id, fields))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: Collection, mut fields: Fields) -> StoreResult<DocumentId> {
        let mut state = self.state.write().await;
        let stamp = state.next_stamp();
        fields.insert(CREATED_AT_FIELD.into(), stamp.clone());
        fields.insert(UPDATED_AT_FIELD.into(), stamp);

        let docs = state.collection(collection);
        let mut id = DocumentId::generate();
        while docs.contains_key(&id) {
            id = DocumentId::generate();
        }
        docs.insert(id.clone(), fields);
        drop(state);

        self.record_write();
        tracing::debug!(%collection, %id, "document inserted");
        Ok(id)
    }

    async fn set(
        &self,
        collection: Collection,
        id: &DocumentId,
        mut fields: Fields,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let stamp = state.next_stamp();
        let docs = state.collection(collection);

        let created_at = docs
            .get(id)
            .and_then(|existing| existing.get(CREATED_AT_FIELD).cloned())
            .unwrap_or_else(|| stamp.clone());
        fields.insert(CREATED_AT_FIELD.into(), created_at);
        fields.insert(UPDATED_AT_FIELD.into(), stamp);
        docs.insert(id.clone(), fields);
        drop(state);

        self.record_write();
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let stamp = state.next_stamp();
        let existing = state
            .collection(collection)
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing {
                collection,
                id: id.clone(),
            })?;

        for (key, value) in fields {
            if key == CREATED_AT_FIELD {
                continue;
            }
            existing.insert(key, value);
        }
        existing.insert(UPDATED_AT_FIELD.into(), stamp);
        drop(state);

        self.record_write();
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &DocumentId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.collection(collection).remove(id);
        drop(state);

        self.record_write();
        Ok(())
    }
}
