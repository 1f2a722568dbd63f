use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::Model;

pub mod fields {
    pub const NAME: &str = "name";
    pub const INDUSTRY: &str = "industry";
    pub const WEBSITE: &str = "website";
    pub const EMPLOYEES: &str = "employees";
    pub const ANNUAL_REVENUE: &str = "annual_revenue";
    pub const ADDRESS: &str = "address";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const COUNTRY: &str = "country";
    pub const POSTAL_CODE: &str = "postal_code";
    pub const PHONE: &str = "phone";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub industry: String,
    pub website: Option<String>,
    pub employees: Option<i64>,
    pub annual_revenue: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateAccount {
    pub name: String,
    pub industry: String,
    pub website: Option<String>,
    pub employees: Option<i64>,
    pub annual_revenue: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
}

impl Model for Account {
    const COLLECTION: &'static str = "accounts";
    type Create = CreateAccount;

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
