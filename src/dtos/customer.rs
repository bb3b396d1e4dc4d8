use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CustomerQuery {
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_walk_in: bool,
    pub created_at: DateTime<Utc>,
}

impl From<crate::models::customer::Customer> for CustomerResponse {
    fn from(c: crate::models::customer::Customer) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone,
            email: c.email,
            address: c.address,
            is_walk_in: c.is_walk_in,
            created_at: c.created_at,
        }
    }
}
