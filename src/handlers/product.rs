// src/handlers/product.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use crate::dtos::product::{
    CategoryResponse, CreateCategoryRequest, CreateProductRequest, ProductQuery, ProductResponse,
    UpdateProductRequest,
};
use crate::error::{map_constraint_violation, AppError};
use crate::middleware::auth::AuthContext;
use crate::models::product::{Category, Product};
use crate::state::AppState;
use tracing::{error, instrument};

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.code, p.price, p.image, p.category_id,
                c.name AS category_name, p.created_at
         FROM products p LEFT JOIN categories c ON c.id = p.category_id";

fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("Price must be a non-negative number"));
    }
    Ok(())
}

pub(crate) async fn fetch_product(db_pool: &PgPool, id: i64) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

pub(crate) async fn fetch_product_by_code(db_pool: &PgPool, code: &str) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.code = $1"))
        .bind(code.trim())
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("No product with code '{}'", code.trim())))
}

// GET /products - List products, optionally filtered by search text or category
#[instrument(skip(state))]
pub async fn get_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(PRODUCT_SELECT);
    qb.push(" WHERE 1=1");

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (p.name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR p.code ILIKE ").push_bind(pattern).push(")");
    }
    if let Some(category_id) = query.category_id {
        qb.push(" AND p.category_id = ").push_bind(category_id);
    }
    qb.push(" ORDER BY p.name");

    match qb.build_query_as::<Product>().fetch_all(&state.db_pool).await {
        Ok(products) => {
            let response = products.into_iter().map(ProductResponse::from).collect();
            Ok(Json(response))
        }
        Err(e) => {
            error!(?e, "Failed to fetch products");
            Err(e.into())
        }
    }
}

// GET /products/:id - Get single product
#[instrument(skip(state))]
pub async fn get_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = fetch_product(&state.db_pool, id).await?;
    Ok(Json(ProductResponse::from(product)))
}

// GET /products/code/:code - Barcode lookup
#[instrument(skip(state))]
pub async fn get_product_by_code(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = fetch_product_by_code(&state.db_pool, &code).await?;
    Ok(Json(ProductResponse::from(product)))
}

// POST /products - Create new product
#[instrument(skip(state, payload, auth))]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    auth.require_manager("Only managers can create products")?;

    if payload.name.trim().is_empty() || payload.code.trim().is_empty() {
        return Err(AppError::validation("Product name and code are required"));
    }
    validate_price(payload.price)?;

    let product = sqlx::query_as::<_, Product>(
        "WITH p AS (
            INSERT INTO products (name, code, price, image, category_id)
            VALUES ($1, $2, $3, $4, $5) RETURNING *
         )
         SELECT p.id, p.name, p.code, p.price, p.image, p.category_id,
                c.name AS category_name, p.created_at
         FROM p LEFT JOIN categories c ON c.id = p.category_id",
    )
    .bind(payload.name.trim())
    .bind(payload.code.trim())
    .bind(payload.price)
    .bind(payload.image)
    .bind(payload.category_id)
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Product code already exists", "Invalid category_id"))?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

// PUT /products/:id - Update product
#[instrument(skip(state, payload, auth))]
pub async fn update_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    auth.require_manager("Only managers can update products")?;

    if let Some(price) = payload.price {
        validate_price(price)?;
    }

    let product = sqlx::query_as::<_, Product>(
        "WITH p AS (
            UPDATE products SET
                name = COALESCE($1, name),
                code = COALESCE($2, code),
                price = COALESCE($3, price),
                image = COALESCE($4, image),
                category_id = COALESCE($5, category_id)
            WHERE id = $6 RETURNING *
         )
         SELECT p.id, p.name, p.code, p.price, p.image, p.category_id,
                c.name AS category_name, p.created_at
         FROM p LEFT JOIN categories c ON c.id = p.category_id",
    )
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.code.as_deref().map(str::trim))
    .bind(payload.price)
    .bind(payload.image)
    .bind(payload.category_id)
    .bind(id)
    .fetch_optional(&state.db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Product code already exists", "Invalid category_id"))?
    .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(Json(ProductResponse::from(product)))
}

// DELETE /products/:id - Delete product
#[instrument(skip(state, auth))]
pub async fn delete_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    auth.require_manager("Only managers can delete products")?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db_pool)
        .await
        .map_err(|e| map_constraint_violation(e, "Product already exists", "Cannot delete a product that has sales"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Product not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

// GET /categories - Categories for the POS category panel
#[instrument(skip(state))]
pub async fn get_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT c.id, c.name, COUNT(p.id) AS product_count
         FROM categories c LEFT JOIN products p ON p.category_id = c.id
         GROUP BY c.id, c.name
         ORDER BY c.name",
    )
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(categories.into_iter().map(CategoryResponse::from).collect()))
}

// POST /categories
#[instrument(skip(state, payload, auth))]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), AppError> {
    auth.require_manager("Only managers can create categories")?;

    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Category name is required"));
    }

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, 0::BIGINT AS product_count",
    )
    .bind(payload.name.trim())
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Category name already exists", "Invalid category"))?;

    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}
