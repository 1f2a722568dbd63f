//! Document-store adapter contract shared by every persistence consumer.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

/// Field map of a single document, keyed by field name.
pub type DocumentData = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A document as addressed by the store: the id lives outside the field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: DocumentData,
}

impl Document {
    /// Deserialize into a typed model, folding the id into the field map.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// Full contents of a collection, pushed to subscribers after each mutation.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    pub collection: String,
    pub documents: Vec<Document>,
}

/// Backend-agnostic document database surface: collections of JSON documents
/// addressed by string ids, plus a change feed per collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in a collection, in no particular order.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert a new document under a freshly minted id, returning the id.
    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError>;

    /// Create or replace a document. With `merge`, existing fields not named
    /// in `data` are kept.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: DocumentData,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Merge `data` into an existing document. Fails with [`StoreError::NotFound`]
    /// if the document does not exist.
    async fn update(&self, collection: &str, id: &str, data: DocumentData)
    -> Result<(), StoreError>;

    /// Remove a document. Deleting an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Subscribe to collection snapshots. A snapshot is published after every
    /// successful mutation of the collection.
    fn subscribe(&self, collection: &str) -> broadcast::Receiver<CollectionSnapshot>;
}
