//! Audit trail for document mutations, written to the `activities` collection.

use std::sync::Arc;

use chrono::Utc;
use db::{
    Document, DocumentStore, StoreError,
    models::activity::{ACTIVITIES_COLLECTION, ActivityAction, ActivityLog, CreateActivityLog},
    store::DocumentData,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Authenticated user attributed in audit entries.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
    pub display_name: String,
}

pub struct ActivityService {
    store: Arc<dyn DocumentStore>,
    user: UserContext,
}

impl ActivityService {
    pub fn new(store: Arc<dyn DocumentStore>, user: UserContext) -> Arc<Self> {
        Arc::new(Self { store, user })
    }

    /// Record one audit entry, returning its id. Logging must never fail the
    /// mutation that triggered it, so failures are warned and swallowed.
    pub async fn log(
        &self,
        action: ActivityAction,
        collection_name: &str,
        document_ref: &str,
        details: Option<DocumentData>,
    ) -> Option<String> {
        let entry = CreateActivityLog {
            timestamp: Utc::now(),
            action,
            document_ref: document_ref.to_string(),
            collection_name: collection_name.to_string(),
            user_id: self.user.user_id.clone(),
            user_name: self.user.display_name.clone(),
            details,
        };

        let data = match serde_json::to_value(&entry) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!("activity entry did not serialize to a JSON object");
                return None;
            }
        };

        match self.store.add(ACTIVITIES_COLLECTION, data).await {
            Ok(id) => {
                debug!(
                    action = %action,
                    collection = collection_name,
                    document_ref,
                    "activity logged"
                );
                Some(id)
            }
            Err(error) => {
                warn!(
                    error = %error,
                    collection = collection_name,
                    "failed to record activity"
                );
                None
            }
        }
    }

    pub async fn log_create(
        &self,
        collection_name: &str,
        document_ref: &str,
        details: Option<DocumentData>,
    ) -> Option<String> {
        self.log(ActivityAction::Create, collection_name, document_ref, details)
            .await
    }

    pub async fn log_update(
        &self,
        collection_name: &str,
        document_ref: &str,
        details: Option<DocumentData>,
    ) -> Option<String> {
        self.log(ActivityAction::Update, collection_name, document_ref, details)
            .await
    }

    pub async fn log_delete(
        &self,
        collection_name: &str,
        document_ref: &str,
        details: Option<DocumentData>,
    ) -> Option<String> {
        self.log(ActivityAction::Delete, collection_name, document_ref, details)
            .await
    }

    pub async fn log_view(
        &self,
        collection_name: &str,
        document_ref: &str,
        details: Option<DocumentData>,
    ) -> Option<String> {
        self.log(ActivityAction::View, collection_name, document_ref, details)
            .await
    }

    /// Newest audit entries first, for the activity timeline.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ActivityLog>, StoreError> {
        let mut entries = self
            .store
            .list(ACTIVITIES_COLLECTION)
            .await?
            .iter()
            .map(Document::deserialize)
            .collect::<Result<Vec<ActivityLog>, _>>()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }
}
