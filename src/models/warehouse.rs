use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct StockLevel {
    pub product_id: i64,
    pub product_name: String,
    pub product_code: String,
    pub quantity: i32,
}
