//! Document store collaborator.
//!
//! The portal delegates all persistence to a schemaless document database addressed by
//! collection name and document id. This module defines the contract the core relies on:
//!
//! - point reads (`get`) returning `None` for absent documents
//! - equality-filtered scans (`query`) with no ordering or pagination guarantees
//! - full collection scans (`list`)
//! - writes (`insert`, `set`, `update`, `delete`)
//!
//! Write timestamps are the store's responsibility. Implementations stamp `createdAt` when a
//! document is first written and `updatedAt` on every write, using their own clock.
//! There are no transactions or version checks; concurrent writers are last-write-wins.

mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryDocumentStore;

use crate::constants::{DIAGNOSES_COLLECTION, TEMPLATES_COLLECTION, USERS_COLLECTION};
use crate::ids::DocumentId;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// The collections the portal reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    DiagnosisTemplates,
    Diagnoses,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Users => USERS_COLLECTION,
            Collection::DiagnosisTemplates => TEMPLATES_COLLECTION,
            Collection::Diagnoses => DIAGNOSES_COLLECTION,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as returned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

/// Equality predicate `field == value`, the only filter the store is asked for.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("{collection} document {id} does not exist")]
    Missing {
        collection: Collection,
        id: DocumentId,
    },
    #[error("write rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, collection: Collection, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// Scan `collection` for documents matching `filter`.
    async fn query(&self, collection: Collection, filter: &FieldFilter)
        -> StoreResult<Vec<Document>>;

    /// Scan every document in `collection`.
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>>;

    /// Insert a new document under a store-allocated id.
    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<DocumentId>;

    /// Create or overwrite the document at `id`.
    async fn set(&self, collection: Collection, id: &DocumentId, fields: Fields)
        -> StoreResult<()>;

    /// Merge `fields` into an existing document.
    ///
    /// Fails with [`StoreError::Missing`] if the document does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> StoreResult<()>;

    /// Delete the document at `id`. Deleting an absent document is not an error.
    async fn delete(&self, collection: Collection, id: &DocumentId) -> StoreResult<()>;
}
