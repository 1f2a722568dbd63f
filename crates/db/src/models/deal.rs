use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::Model;

pub mod fields {
    pub const NAME: &str = "name";
    pub const ACCOUNT_ID: &str = "account_id";
    pub const STAGE: &str = "stage";
    pub const AMOUNT: &str = "amount";
    pub const CLOSE_DATE: &str = "close_date";
    pub const PROBABILITY: &str = "probability";
    pub const DESCRIPTION: &str = "description";
    pub const STATUS: &str = "status";
    pub const TEAM_MEMBER_ID: &str = "team_member_id";
    pub const OWNER_ID: &str = "owner_id";
    pub const REGION: &str = "region";
    pub const LEAD_SOURCE: &str = "lead_source";
}

/// Pipeline stages are operator-defined strings ("Qualification",
/// "Closed Won", ...), so the stage stays untyped here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Deal {
    pub id: String,
    pub name: String,
    pub account_id: String,
    pub stage: String,
    pub amount: Option<f64>,
    pub close_date: Option<String>,
    pub probability: Option<f64>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub team_member_id: Option<String>,
    pub owner_id: Option<String>,
    pub region: Option<String>,
    pub lead_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateDeal {
    pub name: String,
    pub account_id: String,
    pub stage: String,
    pub amount: Option<f64>,
    pub close_date: Option<String>,
    pub probability: Option<f64>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub team_member_id: Option<String>,
    pub owner_id: Option<String>,
    pub region: Option<String>,
    pub lead_source: Option<String>,
}

impl Model for Deal {
    const COLLECTION: &'static str = "deals";
    type Create = CreateDeal;

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
