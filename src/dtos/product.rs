// src/dtos/product.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub code: String,
    pub price: f64,
    pub image: Option<String>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
    pub category_id: Option<i64>,
}

/// Catalog filters used by the POS product grid.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub price: f64,
    pub image: Option<String>,
    pub category: Option<CategoryRef>,
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

// Convert from Model to Response DTO
impl From<crate::models::product::Product> for ProductResponse {
    fn from(product: crate::models::product::Product) -> Self {
        let category = match (product.category_id, product.category_name) {
            (Some(id), Some(name)) => Some(CategoryRef { id, name }),
            _ => None,
        };
        Self {
            id: product.id,
            name: product.name,
            code: product.code,
            price: product.price,
            image: product.image,
            category,
            created_at: product.created_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub product_count: i64,
}

impl From<crate::models::product::Category> for CategoryResponse {
    fn from(c: crate::models::product::Category) -> Self {
        Self { id: c.id, name: c.name, product_count: c.product_count }
    }
}
