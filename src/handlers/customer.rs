use axum::{extract::{Path, Query, State}, Json, Extension};
use axum::http::StatusCode;
use sqlx::{PgPool, Postgres, QueryBuilder};
use crate::state::AppState;
use crate::error::{map_constraint_violation, AppError};
use crate::dtos::customer::{CreateCustomerRequest, CustomerQuery, CustomerResponse, UpdateCustomerRequest};
use crate::middleware::auth::AuthContext;
use crate::models::customer::Customer;

const CUSTOMER_COLUMNS: &str = "id, name, phone, email, address, is_walk_in, created_at";

/// The sentinel customer used when the cashier selects nobody.
pub(crate) async fn walk_in_customer_id(db_pool: &PgPool) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM customers WHERE is_walk_in LIMIT 1")
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::internal("Walk-in customer record is missing"))
}

pub async fn create_customer(
    State(AppState { db_pool, .. }): State<AppState>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }

    let customer = sqlx::query_as::<_, Customer>(&format!(
        "INSERT INTO customers (name, phone, email, address)
         VALUES ($1, $2, $3, $4)
         RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(req.name.trim())
    .bind(req.phone)
    .bind(req.email)
    .bind(req.address)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Customer already exists", "Invalid customer data"))?;

    Ok((StatusCode::CREATED, Json(CustomerResponse::from(customer))))
}

pub async fn get_customer(
    State(AppState { db_pool, .. }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CustomerResponse>, AppError> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Customer not found"))?;

    Ok(Json(CustomerResponse::from(customer)))
}

pub async fn list_customers(
    State(AppState { db_pool, .. }): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<CustomerResponse>>, AppError> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE 1=1"));

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR phone ILIKE ").push_bind(pattern).push(")");
    }
    // Walk-in first so the POS selector defaults to it
    qb.push(" ORDER BY is_walk_in DESC, name ASC");

    let customers = qb.build_query_as::<Customer>().fetch_all(&db_pool).await?;

    Ok(Json(customers.into_iter().map(CustomerResponse::from).collect()))
}

pub async fn update_customer(
    State(AppState { db_pool, .. }): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<CustomerResponse>, AppError> {
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Customer name cannot be empty"));
    }

    let existing = sqlx::query_scalar::<_, bool>("SELECT is_walk_in FROM customers WHERE id = $1")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Customer not found"))?;

    if existing {
        return Err(AppError::conflict("The walk-in customer cannot be modified"));
    }

    let customer = sqlx::query_as::<_, Customer>(&format!(
        "UPDATE customers SET
            name = COALESCE($2, name),
            phone = COALESCE($3, phone),
            email = COALESCE($4, email),
            address = COALESCE($5, address)
         WHERE id = $1
         RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.phone)
    .bind(req.email)
    .bind(req.address)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Customer already exists", "Invalid customer data"))?;

    Ok(Json(CustomerResponse::from(customer)))
}

pub async fn delete_customer(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    auth.require_manager("Only managers can delete customers")?;

    let has_sales = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM sales WHERE customer_id = $1)")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;

    if has_sales {
        return Err(AppError::conflict("Cannot delete customer with existing sales records"));
    }

    let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND NOT is_walk_in")
        .bind(id)
        .execute(&db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Customer not found or cannot be deleted"));
    }

    Ok(StatusCode::NO_CONTENT)
}
