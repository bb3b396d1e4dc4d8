use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::dtos::sale::{PaymentMethod, PaymentStatus};

#[derive(Debug, FromRow)]
pub struct SaleRow {
    pub id: i64,
    pub reference: String,
    pub customer_id: i64,
    pub customer_name: String,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub user_id: i64,
    pub cashier_username: String,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub discount: f64,
    pub grand_total: f64,
    pub received_amount: f64,
    pub paid_amount: f64,
    pub change_amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct SaleItemRow {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: f64,
    pub quantity: i32,
    pub line_total: f64,
    pub returned_quantity: i64,
}
