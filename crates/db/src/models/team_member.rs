use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::Model;

/// Form-facing field names, shared with validators and screens so typos are
/// caught at compile time instead of silently missing a field.
pub mod fields {
    pub const NAME: &str = "name";
    pub const ROLE: &str = "role";
    pub const POSITION: &str = "position";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const DEPARTMENT: &str = "department";
    pub const JOINED_DATE: &str = "joined_date";
    pub const STATUS: &str = "status";
    pub const AVATAR_URL: &str = "avatar_url";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: String,
    pub position: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub joined_date: Option<String>,
    pub status: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateTeamMember {
    pub name: String,
    pub role: String,
    pub position: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub joined_date: Option<String>,
    pub status: Option<String>,
    pub avatar_url: Option<String>,
}

impl Model for TeamMember {
    const COLLECTION: &'static str = "team_members";
    type Create = CreateTeamMember;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}
