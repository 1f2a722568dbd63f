//! Per-feature state container: an in-memory entity list persisted through
//! the document-store adapter, with optimistic local mutation and rollback.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use db::{
    Document, DocumentStore, StoreError,
    models::{Model, activity::ActivityAction},
    store::DocumentData,
};
use serde_json::Value;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, warn};

use super::{
    activity::ActivityService,
    crud::{EntityGateway, FormValues},
};

pub struct EntityStore<M: Model> {
    store: Arc<dyn DocumentStore>,
    activity: Option<Arc<ActivityService>>,
    items: tokio::sync::RwLock<Vec<M>>,
    loading: AtomicBool,
    last_error: tokio::sync::RwLock<Option<String>>,
}

impl<M: Model> EntityStore<M> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            activity: None,
            items: tokio::sync::RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
            last_error: tokio::sync::RwLock::new(None),
        })
    }

    /// Attach an audit trail: create/update/delete record an activity entry
    /// after each successful mutation.
    pub fn with_activity(
        store: Arc<dyn DocumentStore>,
        activity: Arc<ActivityService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            activity: Some(activity),
            items: tokio::sync::RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
            last_error: tokio::sync::RwLock::new(None),
        })
    }

    pub async fn items(&self) -> Vec<M> {
        self.items.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    pub async fn get_by_id(&self, id: &str) -> Option<M> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Replace the local list with the store contents, oldest first.
    pub async fn fetch(&self) -> Result<(), StoreError> {
        self.loading.store(true, Ordering::SeqCst);
        let result = M::find_all(self.store.as_ref()).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(items) => {
                *self.items.write().await = items;
                self.clear_error().await;
                Ok(())
            }
            Err(error) => {
                self.record_error(&error).await;
                Err(error)
            }
        }
    }

    pub async fn create(&self, data: M::Create) -> Result<M, StoreError> {
        self.loading.store(true, Ordering::SeqCst);
        let result = M::insert(self.store.as_ref(), &data).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(entity) => {
                self.items.write().await.push(entity.clone());
                self.clear_error().await;
                self.log_activity(
                    ActivityAction::Create,
                    entity.id(),
                    Some(label_details(&entity)),
                )
                .await;
                Ok(entity)
            }
            Err(error) => {
                self.record_error(&error).await;
                Err(error)
            }
        }
    }

    /// Merge a partial field map into one entity. The local list is updated
    /// optimistically and reverted to the pre-call snapshot if the backend
    /// rejects the mutation.
    pub async fn update(&self, id: &str, changes: FormValues) -> Result<(), StoreError> {
        self.loading.store(true, Ordering::SeqCst);

        let snapshot = self.items.read().await.clone();
        let previous = snapshot.iter().find(|item| item.id() == id).cloned();
        let details = update_details(previous.as_ref(), &changes);

        if previous.is_some() {
            self.apply_local_merge(id, &changes).await;
        }

        let result = M::patch(self.store.as_ref(), id, changes).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                self.clear_error().await;
                self.log_activity(ActivityAction::Update, id, Some(details)).await;
                Ok(())
            }
            Err(error) => {
                *self.items.write().await = snapshot;
                self.record_error(&error).await;
                Err(error)
            }
        }
    }

    /// Remove one entity, optimistically and with the same rollback
    /// discipline as [`EntityStore::update`].
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.loading.store(true, Ordering::SeqCst);

        let snapshot = self.items.read().await.clone();
        let removed = snapshot.iter().find(|item| item.id() == id).cloned();
        self.items.write().await.retain(|item| item.id() != id);

        let result = M::remove(self.store.as_ref(), id).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                self.clear_error().await;
                self.log_activity(
                    ActivityAction::Delete,
                    id,
                    removed.as_ref().map(label_details),
                )
                .await;
                Ok(())
            }
            Err(error) => {
                *self.items.write().await = snapshot;
                self.record_error(&error).await;
                Err(error)
            }
        }
    }

    /// Mirror store snapshots into the local list until the store closes.
    pub fn spawn_realtime_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut rx = this.store.subscribe(M::COLLECTION);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => {
                        let parsed = snapshot
                            .documents
                            .iter()
                            .map(Document::deserialize)
                            .collect::<Result<Vec<M>, _>>();
                        match parsed {
                            Ok(mut items) => {
                                items.sort_by_key(M::created_at);
                                *this.items.write().await = items;
                            }
                            Err(error) => warn!(
                                collection = M::COLLECTION,
                                error = %error,
                                "ignoring malformed collection snapshot"
                            ),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(
                            collection = M::COLLECTION,
                            skipped, "resynchronizing after missed snapshots"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn apply_local_merge(&self, id: &str, changes: &FormValues) {
        let mut items = self.items.write().await;
        let Some(slot) = items.iter_mut().find(|item| item.id() == id) else {
            return;
        };
        let mut merged = match serde_json::to_value(&*slot) {
            Ok(Value::Object(map)) => map,
            _ => return,
        };
        merged.extend(changes.clone());
        match serde_json::from_value::<M>(Value::Object(merged)) {
            Ok(updated) => *slot = updated,
            // The backend write may still succeed; the next fetch reconciles.
            Err(error) => warn!(
                collection = M::COLLECTION,
                id,
                error = %error,
                "skipping optimistic merge of non-conforming changes"
            ),
        }
    }

    async fn log_activity(
        &self,
        action: ActivityAction,
        document_ref: &str,
        details: Option<DocumentData>,
    ) {
        if let Some(activity) = &self.activity {
            activity.log(action, M::COLLECTION, document_ref, details).await;
        }
    }

    async fn record_error(&self, error: &StoreError) {
        *self.last_error.write().await = Some(error.to_string());
    }

    async fn clear_error(&self) {
        *self.last_error.write().await = None;
    }
}

#[async_trait]
impl<M: Model> EntityGateway<M> for EntityStore<M> {
    async fn fetch(&self) -> Result<(), StoreError> {
        EntityStore::fetch(self).await
    }

    async fn create(&self, data: FormValues) -> Result<M, StoreError> {
        let data = serde_json::from_value::<M::Create>(Value::Object(data))?;
        EntityStore::create(self, data).await
    }

    async fn update(&self, id: &str, data: FormValues) -> Result<(), StoreError> {
        EntityStore::update(self, id, data).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        EntityStore::delete(self, id).await
    }
}

fn label_details<M: Model>(entity: &M) -> DocumentData {
    [("name".to_string(), Value::String(entity.label()))]
        .into_iter()
        .collect()
}

fn update_details<M: Model>(previous: Option<&M>, changes: &FormValues) -> DocumentData {
    let mut details = DocumentData::new();
    details.insert(
        "updated_fields".to_string(),
        Value::Array(
            changes
                .keys()
                .map(|key| Value::String(key.clone()))
                .collect(),
        ),
    );
    if let Some(previous) = previous {
        details.insert("name".to_string(), Value::String(previous.label()));
        // Stage transitions are worth auditing on their own.
        if let Some(new_stage) = changes.get("stage") {
            let old_stage = field_of(previous, "stage");
            if old_stage.as_ref() != Some(new_stage) {
                details.insert(
                    "previous_stage".to_string(),
                    old_stage.unwrap_or(Value::Null),
                );
                details.insert("new_stage".to_string(), new_stage.clone());
            }
        }
    }
    details
}

fn field_of<M: Model>(entity: &M, field: &str) -> Option<Value> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map.get(field).cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use db::{
        MemoryStore,
        models::{
            activity::{ACTIVITIES_COLLECTION, ActivityLog},
            task::{CreateTask, Task},
        },
        store::CollectionSnapshot,
    };
    use serde_json::json;
    use tokio::sync::broadcast;

    use super::*;
    use crate::services::{
        activity::{ActivityService, UserContext},
        crud::{CrudConfig, CrudController, InputType, SubmitOutcome, Validator, form_template},
        validation,
    };

    fn new_task(title: &str) -> CreateTask {
        CreateTask {
            title: title.to_string(),
            due_date: "2025-06-01".to_string(),
            assigned_to: "tm-1".to_string(),
            ..Default::default()
        }
    }

    fn test_user() -> UserContext {
        UserContext {
            user_id: "u-1".to_string(),
            display_name: "Grace".to_string(),
        }
    }

    fn seeded_task(id: &str, title: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            due_date: "2025-06-01".to_string(),
            status: Default::default(),
            priority: Default::default(),
            assigned_to: "tm-1".to_string(),
            related_to_type: None,
            related_to_id: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    /// Delegates to a [`MemoryStore`] but fails mutations on one collection.
    struct FailingStore {
        inner: MemoryStore,
        fail_collection: String,
    }

    impl FailingStore {
        fn failing_on(collection: &str) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(),
                fail_collection: collection.to_string(),
            })
        }

        fn reject(&self, collection: &str) -> Result<(), StoreError> {
            if collection == self.fail_collection {
                Err(StoreError::Backend("injected failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
            self.inner.list(collection).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError> {
            self.reject(collection)?;
            self.inner.add(collection, data).await
        }

        async fn set(
            &self,
            collection: &str,
            id: &str,
            data: DocumentData,
            merge: bool,
        ) -> Result<(), StoreError> {
            self.reject(collection)?;
            self.inner.set(collection, id, data, merge).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            data: DocumentData,
        ) -> Result<(), StoreError> {
            self.reject(collection)?;
            self.inner.update(collection, id, data).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.reject(collection)?;
            self.inner.delete(collection, id).await
        }

        fn subscribe(&self, collection: &str) -> broadcast::Receiver<CollectionSnapshot> {
            self.inner.subscribe(collection)
        }
    }

    #[tokio::test]
    async fn create_persists_and_appends_locally() {
        let store = Arc::new(MemoryStore::new());
        let tasks = EntityStore::<Task>::new(store.clone());

        let created = tasks.create(new_task("Ship report")).await.unwrap();

        assert_eq!(tasks.items().await.len(), 1);
        assert!(store.get("tasks", &created.id).await.unwrap().is_some());
        assert!(tasks.last_error().await.is_none());
    }

    #[tokio::test]
    async fn fetch_replaces_the_local_list() {
        let store = Arc::new(MemoryStore::new());
        let writer = EntityStore::<Task>::new(store.clone());
        let first = writer.create(new_task("a")).await.unwrap();
        let second = writer.create(new_task("b")).await.unwrap();

        let reader = EntityStore::<Task>::new(store);
        reader.fetch().await.unwrap();

        let ids: Vec<String> = reader.items().await.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert!(reader.get_by_id(&ids[0]).await.is_some());
    }

    #[tokio::test]
    async fn update_merges_locally_and_remotely() {
        let store = Arc::new(MemoryStore::new());
        let tasks = EntityStore::<Task>::new(store.clone());
        let task = tasks.create(new_task("Draft")).await.unwrap();

        let changes = [("title".to_string(), json!("Final"))].into_iter().collect();
        tasks.update(&task.id, changes).await.unwrap();

        assert_eq!(tasks.get_by_id(&task.id).await.unwrap().title, "Final");
        let doc = store.get("tasks", &task.id).await.unwrap().unwrap();
        assert_eq!(doc.data["title"], json!("Final"));
    }

    #[tokio::test]
    async fn failed_update_rolls_back_the_local_list() {
        let store = FailingStore::failing_on("tasks");
        let tasks = EntityStore::<Task>::new(store);
        let seeded = seeded_task("t-1", "Draft");
        *tasks.items.write().await = vec![seeded.clone()];
        let before = tasks.items().await;

        let changes = [("title".to_string(), json!("Final"))].into_iter().collect();
        let err = tasks.update("t-1", changes).await.unwrap_err();

        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(tasks.items().await, before);
        assert!(tasks.last_error().await.unwrap().contains("injected"));
    }

    #[tokio::test]
    async fn failed_delete_rolls_back_the_local_list() {
        let store = FailingStore::failing_on("tasks");
        let tasks = EntityStore::<Task>::new(store);
        let seeded = seeded_task("t-1", "Keep me");
        *tasks.items.write().await = vec![seeded.clone()];

        let err = tasks.delete("t-1").await.unwrap_err();

        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(tasks.items().await, vec![seeded]);
    }

    #[tokio::test]
    async fn mutations_are_audited_when_activity_is_attached() {
        let store = Arc::new(MemoryStore::new());
        let activity = ActivityService::new(store.clone(), test_user());
        let tasks = EntityStore::<Task>::with_activity(store.clone(), activity);

        let task = tasks.create(new_task("Audit me")).await.unwrap();
        let changes = [("title".to_string(), json!("Audited"))].into_iter().collect();
        tasks.update(&task.id, changes).await.unwrap();
        tasks.delete(&task.id).await.unwrap();

        let entries: Vec<ActivityLog> = store
            .list(ACTIVITIES_COLLECTION)
            .await
            .unwrap()
            .iter()
            .map(Document::deserialize)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.collection_name == "tasks"));
        assert!(entries.iter().all(|e| e.user_name == "Grace"));
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_the_mutation() {
        let store = FailingStore::failing_on(ACTIVITIES_COLLECTION);
        let activity = ActivityService::new(store.clone(), test_user());
        let tasks = EntityStore::<Task>::with_activity(store.clone(), activity);

        let created = tasks.create(new_task("Still works")).await.unwrap();

        assert_eq!(tasks.items().await.len(), 1);
        assert!(store.get("tasks", &created.id).await.unwrap().is_some());
        assert!(store.list(ACTIVITIES_COLLECTION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn realtime_sync_mirrors_store_snapshots() {
        let store = Arc::new(MemoryStore::new());
        let tasks = EntityStore::<Task>::new(store.clone());
        let handle = tasks.spawn_realtime_sync();

        let writer = EntityStore::<Task>::new(store);
        writer.create(new_task("Synced")).await.unwrap();

        let mut synced = false;
        for _ in 0..50 {
            if !tasks.items().await.is_empty() {
                synced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(synced, "snapshot never reached the subscribed store");
        assert_eq!(tasks.items().await[0].title, "Synced");
    }

    #[tokio::test]
    async fn controller_drives_a_full_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let tasks = EntityStore::<Task>::new(store.clone());
        let validate: Validator = Arc::new(validation::validate_task);
        let mut controller = CrudController::new(
            CrudConfig::new(
                "Task",
                form_template(&CreateTask::default()),
                tasks.clone() as Arc<dyn EntityGateway<Task>>,
            )
            .with_validate(validate),
        );

        // An empty form is rejected before any store call.
        controller.create_new();
        assert_eq!(controller.handle_submit().await, SubmitOutcome::Invalid);
        assert!(store.list("tasks").await.unwrap().is_empty());

        controller.handle_change("title", "Ship it", InputType::Text).unwrap();
        controller
            .handle_change("due_date", "2025-06-01", InputType::Date)
            .unwrap();
        controller
            .handle_change("assigned_to", "tm-1", InputType::Text)
            .unwrap();
        assert_eq!(controller.handle_submit().await, SubmitOutcome::Saved);
        assert!(!controller.state().is_dialog_open);

        let created = tasks.items().await.remove(0);
        assert_eq!(created.title, "Ship it");

        // Edit through the same controller.
        controller.edit(created.clone());
        controller
            .handle_change("title", "Shipped", InputType::Text)
            .unwrap();
        assert_eq!(controller.handle_submit().await, SubmitOutcome::Saved);
        assert_eq!(tasks.get_by_id(&created.id).await.unwrap().title, "Shipped");

        // And delete.
        let current = tasks.get_by_id(&created.id).await.unwrap();
        controller.confirm_delete(current);
        assert_eq!(controller.handle_submit().await, SubmitOutcome::Saved);
        assert!(tasks.items().await.is_empty());
        assert!(store.list("tasks").await.unwrap().is_empty());
    }
}
