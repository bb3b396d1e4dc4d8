use axum::{extract::{Path, State}, Json, Extension};
use axum::http::StatusCode;
use sqlx::PgPool;
use crate::state::AppState;
use crate::error::{map_constraint_violation, AppError};
use crate::dtos::warehouse::{
    CreateWarehouseRequest, SetStockRequest, StockLevelResponse, UpdateWarehouseRequest, WarehouseResponse,
};
use crate::middleware::auth::AuthContext;
use crate::models::warehouse::{StockLevel, Warehouse};

const WAREHOUSE_COLUMNS: &str = "id, name, location, is_active, created_at";

/// Picks the warehouse for a sale: the requested one, else the configured
/// default, else the oldest active warehouse. Inactive warehouses are refused.
pub(crate) async fn resolve_warehouse(
    db_pool: &PgPool,
    requested: Option<i64>,
    configured_default: Option<i64>,
) -> Result<i64, AppError> {
    let warehouse = match requested.or(configured_default) {
        Some(id) => sqlx::query_as::<_, (i64, bool)>("SELECT id, is_active FROM warehouses WHERE id = $1")
            .bind(id)
            .fetch_optional(db_pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Warehouse {id} not found")))?,
        None => sqlx::query_as::<_, (i64, bool)>(
            "SELECT id, is_active FROM warehouses WHERE is_active ORDER BY id LIMIT 1",
        )
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::validation("No active warehouse configured"))?,
    };

    if !warehouse.1 {
        return Err(AppError::validation("Warehouse is not active"));
    }
    Ok(warehouse.0)
}

pub async fn create_warehouse(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateWarehouseRequest>,
) -> Result<(StatusCode, Json<WarehouseResponse>), AppError> {
    auth.require_manager("Only managers can create warehouses")?;

    if req.name.trim().is_empty() {
        return Err(AppError::validation("Warehouse name is required"));
    }

    let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
        "INSERT INTO warehouses (name, location) VALUES ($1, $2) RETURNING {WAREHOUSE_COLUMNS}"
    ))
    .bind(req.name.trim())
    .bind(req.location)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Warehouse name already exists", "Invalid warehouse data"))?;

    Ok((StatusCode::CREATED, Json(WarehouseResponse::from(warehouse))))
}

pub async fn get_warehouse(
    State(AppState { db_pool, .. }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WarehouseResponse>, AppError> {
    let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
        "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Warehouse not found"))?;

    Ok(Json(WarehouseResponse::from(warehouse)))
}

pub async fn list_warehouses(
    State(AppState { db_pool, .. }): State<AppState>,
) -> Result<Json<Vec<WarehouseResponse>>, AppError> {
    let warehouses = sqlx::query_as::<_, Warehouse>(&format!(
        "SELECT {WAREHOUSE_COLUMNS} FROM warehouses ORDER BY name ASC"
    ))
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(warehouses.into_iter().map(WarehouseResponse::from).collect()))
}

pub async fn update_warehouse(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateWarehouseRequest>,
) -> Result<Json<WarehouseResponse>, AppError> {
    auth.require_manager("Only managers can update warehouses")?;

    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Warehouse name cannot be empty"));
    }

    let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
        "UPDATE warehouses SET
            name = COALESCE($2, name),
            location = COALESCE($3, location),
            is_active = COALESCE($4, is_active)
         WHERE id = $1
         RETURNING {WAREHOUSE_COLUMNS}"
    ))
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.location)
    .bind(req.is_active)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Warehouse name already exists", "Invalid warehouse data"))?
    .ok_or_else(|| AppError::not_found("Warehouse not found"))?;

    Ok(Json(WarehouseResponse::from(warehouse)))
}

pub async fn list_stock(
    State(AppState { db_pool, .. }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StockLevelResponse>>, AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    if !exists {
        return Err(AppError::not_found("Warehouse not found"));
    }

    let levels = sqlx::query_as::<_, StockLevel>(
        "SELECT p.id AS product_id, p.name AS product_name, p.code AS product_code,
                COALESCE(ws.quantity, 0) AS quantity
         FROM products p
         LEFT JOIN warehouse_stock ws ON ws.product_id = p.id AND ws.warehouse_id = $1
         ORDER BY p.name",
    )
    .bind(id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(levels.into_iter().map(StockLevelResponse::from).collect()))
}

pub async fn set_stock(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, product_id)): Path<(i64, i64)>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<StockLevelResponse>, AppError> {
    auth.require_manager("Only managers can adjust stock")?;

    if req.quantity < 0 {
        return Err(AppError::validation("Stock quantity cannot be negative"));
    }

    let level = sqlx::query_as::<_, StockLevel>(
        "WITH ws AS (
            INSERT INTO warehouse_stock (warehouse_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (warehouse_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING product_id, quantity
         )
         SELECT p.id AS product_id, p.name AS product_name, p.code AS product_code, ws.quantity
         FROM ws JOIN products p ON p.id = ws.product_id",
    )
    .bind(id)
    .bind(product_id)
    .bind(req.quantity)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Stock row already exists", "Unknown warehouse or product"))?;

    tracing::info!(warehouse_id = id, product_id, quantity = req.quantity, "Stock level set");

    Ok(Json(StockLevelResponse::from(level)))
}
