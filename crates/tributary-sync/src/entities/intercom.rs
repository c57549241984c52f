//! Typed attributes for Intercom entities
//!
//! Intercom reports timestamps as unix epoch seconds; they are kept as-is.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercomContact {
    pub role: Option<String>,
    pub external_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercomCompany {
    pub name: Option<String>,
    pub company_id: Option<String>,
    pub plan: Option<String>,
    pub monthly_spend: Option<f64>,
    pub session_count: Option<i64>,
    pub user_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercomConversation {
    pub title: Option<String>,
    pub state: Option<String>,
    pub open: bool,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercomTicket {
    pub state: Option<String>,
    pub category: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}
