//! Typed entity models persisted through the document-store adapter.

pub mod account;
pub mod activity;
pub mod contact;
pub mod deal;
pub mod task;
pub mod team_member;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::store::{Document, DocumentData, DocumentStore, StoreError};

/// Contract shared by every persisted entity type: a collection binding plus
/// document CRUD over any [`DocumentStore`].
#[async_trait]
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this entity type lives in.
    const COLLECTION: &'static str;

    /// Payload accepted when creating a new record. Never carries an id or
    /// timestamps; those are minted on insert.
    type Create: Serialize + DeserializeOwned + Send + Sync;

    fn id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    /// Short human-readable handle used in activity-log details.
    fn label(&self) -> String;

    /// All documents of the collection, oldest first.
    async fn find_all(store: &dyn DocumentStore) -> Result<Vec<Self>, StoreError> {
        let mut items = store
            .list(Self::COLLECTION)
            .await?
            .iter()
            .map(Document::deserialize)
            .collect::<Result<Vec<Self>, _>>()?;
        items.sort_by_key(Self::created_at);
        Ok(items)
    }

    async fn find_by_id(store: &dyn DocumentStore, id: &str) -> Result<Option<Self>, StoreError> {
        match store.get(Self::COLLECTION, id).await? {
            Some(doc) => Ok(Some(doc.deserialize()?)),
            None => Ok(None),
        }
    }

    /// Persist a new record, stamping `created_at`/`updated_at`.
    async fn insert(store: &dyn DocumentStore, data: &Self::Create) -> Result<Self, StoreError> {
        let now = serde_json::to_value(Utc::now())?;
        let mut fields = to_object(data)?;
        fields.insert("created_at".to_string(), now.clone());
        fields.insert("updated_at".to_string(), now);

        let id = store.add(Self::COLLECTION, fields.clone()).await?;
        Document { id, data: fields }.deserialize()
    }

    /// Merge a partial field map into an existing record, stamping `updated_at`.
    async fn patch(
        store: &dyn DocumentStore,
        id: &str,
        mut changes: DocumentData,
    ) -> Result<(), StoreError> {
        changes.insert("updated_at".to_string(), serde_json::to_value(Utc::now())?);
        store.update(Self::COLLECTION, id, changes).await
    }

    async fn remove(store: &dyn DocumentStore, id: &str) -> Result<(), StoreError> {
        store.delete(Self::COLLECTION, id).await
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<DocumentData, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "entity payload must be a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        Model,
        team_member::{CreateTeamMember, TeamMember},
    };
    use crate::MemoryStore;

    fn new_member(name: &str, email: &str) -> CreateTeamMember {
        CreateTeamMember {
            name: name.to_string(),
            role: "AE".to_string(),
            email: email.to_string(),
            department: Some("Sales".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_stamps_timestamps_and_roundtrips() {
        let store = MemoryStore::new();
        let member = TeamMember::insert(&store, &new_member("Grace", "grace@example.com"))
            .await
            .unwrap();

        assert!(!member.id.is_empty());
        assert_eq!(member.created_at, member.updated_at);

        let found = TeamMember::find_by_id(&store, &member.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Grace");
        assert_eq!(found.created_at, member.created_at);
    }

    #[tokio::test]
    async fn find_all_orders_by_creation() {
        let store = MemoryStore::new();
        let first = TeamMember::insert(&store, &new_member("A", "a@example.com"))
            .await
            .unwrap();
        let second = TeamMember::insert(&store, &new_member("B", "b@example.com"))
            .await
            .unwrap();

        let all = TeamMember::find_all(&store).await.unwrap();
        assert_eq!(
            all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec![first.id.as_str(), second.id.as_str()]
        );
    }

    #[tokio::test]
    async fn patch_merges_and_restamps() {
        let store = MemoryStore::new();
        let member = TeamMember::insert(&store, &new_member("Grace", "grace@example.com"))
            .await
            .unwrap();

        let changes = [("role".to_string(), json!("Manager"))].into_iter().collect();
        TeamMember::patch(&store, &member.id, changes).await.unwrap();

        let found = TeamMember::find_by_id(&store, &member.id).await.unwrap().unwrap();
        assert_eq!(found.role, "Manager");
        assert_eq!(found.name, "Grace");
        assert!(found.updated_at >= found.created_at);

        TeamMember::remove(&store, &member.id).await.unwrap();
        assert!(TeamMember::find_by_id(&store, &member.id).await.unwrap().is_none());
    }
}
