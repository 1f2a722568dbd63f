use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use crate::store::DocumentData;

/// Collection every audit entry is written to.
pub const ACTIVITIES_COLLECTION: &str = "activities";

/// Kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    View,
}

/// Audit entry for a document mutation, as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ActivityLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: ActivityAction,
    /// Id of the affected document.
    pub document_ref: String,
    /// Collection the affected document belongs to.
    pub collection_name: String,
    pub user_id: String,
    pub user_name: String,
    #[ts(type = "Record<string, unknown> | null")]
    pub details: Option<DocumentData>,
}

/// Payload written when recording a new audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateActivityLog {
    pub timestamp: DateTime<Utc>,
    pub action: ActivityAction,
    pub document_ref: String,
    pub collection_name: String,
    pub user_id: String,
    pub user_name: String,
    #[ts(type = "Record<string, unknown> | null")]
    pub details: Option<DocumentData>,
}
