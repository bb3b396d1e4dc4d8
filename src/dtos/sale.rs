use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::pos::cart::Adjustments;

// ==================== Enums ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::BankTransfer => "Bank transfer",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::Other => "Other",
        }
    }
}

// ==================== Requests ====================

/// Payment fields collected by the payment modal.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub received_amount: f64,
    pub paid_amount: f64,
    pub payment_method: PaymentMethod,
}

/// Checkout of the cashier's register cart.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    #[serde(flatten)]
    pub payment: PaymentRequest,
    pub notes: Option<String>,
}

/// Full sale payload for clients that keep their own cart.
#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub customer_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub items: Vec<SaleItemRequest>,
    #[serde(flatten)]
    pub adjustments: Adjustments,
    #[serde(flatten)]
    pub payment: PaymentRequest,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaleItemRequest {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Option<f64>, // Optional - uses the catalog price if not provided
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub additional_payment: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateReturnRequest {
    pub items: Vec<ReturnItemRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleListQuery {
    pub customer_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub payment_status: Option<PaymentStatus>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}

// ==================== Responses ====================

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub id: i64,
    pub reference: String,
    pub customer_id: i64,
    pub customer_name: String,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub cashier_id: i64,
    pub cashier_username: String,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub discount: f64,
    pub grand_total: f64,
    pub received_amount: f64,
    pub paid_amount: f64,
    pub change: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleItemResponse>,
    pub summary: SaleSummary,
}

#[derive(Debug, Serialize)]
pub struct SaleItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: f64,
    pub quantity: i32,
    pub returned_quantity: i32,
    pub line_total: f64,
}

#[derive(Debug, Serialize)]
pub struct SaleSummary {
    pub total_items: i64,
    pub balance_due: f64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub sale: SaleResponse,
    pub receipt_url: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SaleListItem {
    pub id: i64,
    pub reference: String,
    pub customer_name: String,
    pub warehouse_name: String,
    pub cashier_username: String,
    pub grand_total: f64,
    pub paid_amount: f64,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub total_items: i64,
}

#[derive(Debug, Serialize)]
pub struct SaleReturnResponse {
    pub id: i64,
    pub sale_id: i64,
    pub total_refund: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleReturnItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct SaleReturnItemResponse {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub line_total: f64,
}
