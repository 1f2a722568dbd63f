//! In-memory reference backend for the document-store contract.
//!
//! Backs tests and local development; a hosted document database sits behind
//! the same trait in deployment.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::store::{CollectionSnapshot, Document, DocumentData, DocumentStore, StoreError};

/// Subscribers only ever need the latest snapshot, so a small buffer is
/// enough; lagged receivers resynchronize on the next message.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, HashMap<String, DocumentData>>,
    channels: DashMap<String, broadcast::Sender<CollectionSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, collection: &str) -> broadcast::Sender<CollectionSnapshot> {
        self.channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY).0)
            .clone()
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn publish(&self, collection: &str) {
        let snapshot = CollectionSnapshot {
            collection: collection.to_string(),
            documents: self.snapshot(collection),
        };
        // Send fails when nobody is subscribed, which is fine.
        let _ = self.sender(collection).send(snapshot);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.snapshot(collection))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.collections.get(collection).and_then(|docs| {
            docs.get(id).map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            })
        }))
    }

    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        debug!(collection, id = %id, "document added");
        self.publish(collection);
        Ok(id)
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: DocumentData,
        merge: bool,
    ) -> Result<(), StoreError> {
        {
            let mut docs = self.collections.entry(collection.to_string()).or_default();
            match docs.get_mut(id) {
                Some(existing) if merge => existing.extend(data),
                _ => {
                    docs.insert(id.to_string(), data);
                }
            }
        }
        self.publish(collection);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: DocumentData,
    ) -> Result<(), StoreError> {
        {
            let mut docs = self.collections.entry(collection.to_string()).or_default();
            let existing = docs.get_mut(id).ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
            existing.extend(data);
        }
        self.publish(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let removed = self
            .collections
            .get_mut(collection)
            .is_some_and(|mut docs| docs.remove(id).is_some());
        if removed {
            debug!(collection, id, "document removed");
            self.publish(collection);
        }
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> broadcast::Receiver<CollectionSnapshot> {
        self.sender(collection).subscribe()
    }
}
