use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateWarehouseRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub quantity: i32,
}

#[derive(Serialize)]
pub struct WarehouseResponse {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<crate::models::warehouse::Warehouse> for WarehouseResponse {
    fn from(w: crate::models::warehouse::Warehouse) -> Self {
        Self {
            id: w.id,
            name: w.name,
            location: w.location,
            is_active: w.is_active,
            created_at: w.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct StockLevelResponse {
    pub product_id: i64,
    pub product_name: String,
    pub product_code: String,
    pub quantity: i32,
}

impl From<crate::models::warehouse::StockLevel> for StockLevelResponse {
    fn from(s: crate::models::warehouse::StockLevel) -> Self {
        Self {
            product_id: s.product_id,
            product_name: s.product_name,
            product_code: s.product_code,
            quantity: s.quantity,
        }
    }
}
