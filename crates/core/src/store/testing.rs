//! Fault injection for tests.

use super::{
    Collection, Document, DocumentStore, FieldFilter, Fields, MemoryDocumentStore, StoreError,
    StoreResult,
};
use crate::ids::DocumentId;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Wraps a [`MemoryDocumentStore`] and fails selected operations on demand.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub inner: Arc<MemoryDocumentStore>,
    fail_queries: AtomicBool,
    fail_inserts: AtomicBool,
    fail_sets: AtomicBool,
    fail_deletes: AtomicBool,
    failing_gets: Mutex<HashSet<DocumentId>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryDocumentStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get(&self, id: &DocumentId) {
        self.failing_gets
            .lock()
            .expect("failing_gets lock")
            .insert(id.clone());
    }
}

fn offline() -> StoreError {
    StoreError::Unavailable("simulated outage".into())
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: Collection, id: &DocumentId) -> StoreResult<Option<Document>> {
        if self
            .failing_gets
            .lock()
            .expect("failing_gets lock")
            .contains(id)
        {
            return Err(offline());
        }
        self.inner.get(collection, id).await
    }

    async fn query(
        &self,
        collection: Collection,
        filter: &FieldFilter,
    ) -> StoreResult<Vec<Document>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.query(collection, filter).await
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.list(collection).await
    }

    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<DocumentId> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("simulated permission denied".into()));
        }
        self.inner.insert(collection, fields).await
    }

    async fn set(
        &self,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> StoreResult<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("simulated permission denied".into()));
        }
        self.inner.set(collection, id, fields).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> StoreResult<()> {
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: Collection, id: &DocumentId) -> StoreResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.delete(collection, id).await
    }
}
