use axum::{extract::{Path, Query, State}, Json, Extension};
use axum::http::StatusCode;
use axum::response::Html;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use crate::state::AppState;
use crate::error::AppError;
use crate::dtos::sale::{
    CreateReturnRequest, CreateSaleRequest, SaleItemResponse, SaleListItem, SaleListQuery,
    SaleResponse, SaleReturnItemResponse, SaleReturnResponse, SaleSummary, UpdatePaymentRequest,
};
use crate::handlers::{customer::walk_in_customer_id, warehouse::resolve_warehouse};
use crate::middleware::auth::AuthContext;
use crate::models::sale::{SaleItemRow, SaleRow};
use crate::pos::cart::{Cart, CartItem};
use crate::pos::checkout::{payment_status, prepare_sale, SaleDraft};
use crate::pos::receipt;
use crate::pos::returns::{select_returns, SoldLine};

/// Where a sale should be recorded. `None` falls back to the walk-in
/// customer and the default warehouse.
pub(crate) struct SaleTarget {
    pub customer_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub notes: Option<String>,
}

/// Records a validated sale: header, lines and stock decrement in one
/// transaction. Stock rows are locked so concurrent registers cannot oversell.
pub(crate) async fn persist_sale(
    state: &AppState,
    auth: &AuthContext,
    target: SaleTarget,
    draft: &SaleDraft,
) -> Result<SaleResponse, AppError> {
    let db_pool = &state.db_pool;

    let customer_id = match target.customer_id {
        Some(id) => {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
                .bind(id)
                .fetch_one(db_pool)
                .await?;
            if !exists {
                return Err(AppError::not_found("Customer not found"));
            }
            id
        }
        None => walk_in_customer_id(db_pool).await?,
    };
    let warehouse_id = resolve_warehouse(db_pool, target.warehouse_id, state.config.default_warehouse_id).await?;

    // Start transaction
    let mut tx = db_pool.begin().await?;

    for line in &draft.lines {
        let available = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM warehouse_stock
             WHERE warehouse_id = $1 AND product_id = $2
             FOR UPDATE",
        )
        .bind(warehouse_id)
        .bind(line.id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        if available < line.quantity {
            return Err(AppError::validation(format!(
                "Insufficient stock for '{}'. Available {}, requested {}.",
                line.name, available, line.quantity
            )));
        }

        sqlx::query(
            "UPDATE warehouse_stock SET quantity = quantity - $3
             WHERE warehouse_id = $1 AND product_id = $2",
        )
        .bind(warehouse_id)
        .bind(line.id)
        .bind(line.quantity)
        .execute(&mut *tx)
        .await?;
    }

    let totals = &draft.totals;
    let payment = &draft.payment;

    let sale_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO sales (customer_id, warehouse_id, user_id, subtotal, tax, shipping, discount,
                            grand_total, received_amount, paid_amount, change_amount,
                            payment_method, payment_status, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         RETURNING id",
    )
    .bind(customer_id)
    .bind(warehouse_id)
    .bind(auth.user_id)
    .bind(totals.subtotal)
    .bind(totals.tax)
    .bind(totals.shipping)
    .bind(totals.discount)
    .bind(totals.grand_total)
    .bind(payment.received_amount)
    .bind(payment.paid_amount)
    .bind(payment.change)
    .bind(payment.method)
    .bind(payment.status)
    .bind(target.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()))
    .fetch_one(&mut *tx)
    .await?;

    for line in &draft.lines {
        sqlx::query(
            "INSERT INTO sale_items (sale_id, product_id, product_name, unit_price, quantity, line_total)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(sale_id)
        .bind(line.id)
        .bind(&line.name)
        .bind(line.price)
        .bind(line.quantity)
        .bind(line.line_total())
        .execute(&mut *tx)
        .await?;
    }

    // Commit transaction
    tx.commit().await?;

    tracing::info!(
        sale_id,
        cashier = %auth.username,
        grand_total = totals.grand_total,
        items = draft.lines.len(),
        "Sale created"
    );

    fetch_sale_by_id(db_pool, sale_id).await
}

// POST /pos/sales - direct submission with client-side cart
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), AppError> {
    if req.items.is_empty() {
        return Err(AppError::validation("Sale must contain at least one item"));
    }

    for item in &req.items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Quantity must be greater than 0"));
        }
        if let Some(price) = item.unit_price {
            if !price.is_finite() || price < 0.0 {
                return Err(AppError::validation("Unit price cannot be negative"));
            }
        }
    }

    let product_ids: Vec<i64> = req.items.iter().map(|i| i.product_id).collect();
    let catalog: HashMap<i64, (String, f64)> = sqlx::query_as::<_, (i64, String, f64)>(
        "SELECT id, name, price FROM products WHERE id = ANY($1)",
    )
    .bind(&product_ids)
    .fetch_all(&state.db_pool)
    .await?
    .into_iter()
    .map(|(id, name, price)| (id, (name, price)))
    .collect();

    let mut lines = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let (name, catalog_price) = catalog
            .get(&item.product_id)
            .ok_or_else(|| AppError::not_found(format!("Product {} not found", item.product_id)))?;
        lines.push(CartItem {
            id: item.product_id,
            name: name.clone(),
            price: item.unit_price.unwrap_or(*catalog_price),
            quantity: item.quantity,
        });
    }
    let mut cart = Cart::collapse_lines(lines)?;
    cart.set_adjustments(req.adjustments)?;

    let draft = prepare_sale(&cart, &req.payment)?;
    let target = SaleTarget { customer_id: req.customer_id, warehouse_id: req.warehouse_id, notes: req.notes };
    let sale = persist_sale(&state, &auth, target, &draft).await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn get_sale(
    State(AppState { db_pool, .. }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SaleResponse>, AppError> {
    fetch_sale_by_id(&db_pool, id).await.map(Json)
}

// GET /pos/sales/:id/receipt - printable receipt
pub async fn get_receipt(
    State(AppState { db_pool, .. }): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let sale = fetch_sale_by_id(&db_pool, id).await?;
    Ok(Html(receipt::render_html(&sale)))
}

pub async fn list_sales(
    State(AppState { db_pool, .. }): State<AppState>,
    Query(params): Query<SaleListQuery>,
) -> Result<Json<Vec<SaleListItem>>, AppError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT
            s.id, s.reference, c.name AS customer_name, w.name AS warehouse_name,
            u.username AS cashier_username, s.grand_total, s.paid_amount,
            s.payment_status, s.payment_method, s.created_at,
            COALESCE(SUM(si.quantity), 0)::BIGINT AS total_items
        FROM sales s
        JOIN customers c ON s.customer_id = c.id
        JOIN warehouses w ON s.warehouse_id = w.id
        JOIN users u ON s.user_id = u.id
        LEFT JOIN sale_items si ON s.id = si.sale_id
        WHERE 1=1",
    );

    if let Some(customer_id) = params.customer_id {
        qb.push(" AND s.customer_id = ").push_bind(customer_id);
    }
    if let Some(warehouse_id) = params.warehouse_id {
        qb.push(" AND s.warehouse_id = ").push_bind(warehouse_id);
    }
    if let Some(status) = params.payment_status {
        qb.push(" AND s.payment_status = ").push_bind(status);
    }
    if let Some(from) = params.from {
        qb.push(" AND s.created_at::DATE >= ").push_bind(from);
    }
    if let Some(to) = params.to {
        qb.push(" AND s.created_at::DATE <= ").push_bind(to);
    }

    qb.push(" GROUP BY s.id, c.name, w.name, u.username ORDER BY s.created_at DESC, s.id DESC");

    let sales = qb.build_query_as::<SaleListItem>().fetch_all(&db_pool).await?;

    Ok(Json(sales))
}

pub async fn update_payment(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<SaleResponse>, AppError> {
    if !req.additional_payment.is_finite() || req.additional_payment <= 0.0 {
        return Err(AppError::validation("Additional payment must be greater than 0"));
    }

    // Start transaction
    let mut tx = db_pool.begin().await?;

    let (user_id, grand_total, paid_amount) = sqlx::query_as::<_, (i64, f64, f64)>(
        "SELECT user_id, grand_total, paid_amount FROM sales WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Sale not found"))?;

    // Cashiers can only settle their own sales
    if !auth.is_manager() && user_id != auth.user_id {
        return Err(AppError::forbidden("You can only update payments for your own sales"));
    }

    let new_amount_paid = paid_amount + req.additional_payment;

    if new_amount_paid > grand_total + 1e-6 {
        return Err(AppError::validation(format!(
            "Total payment ({}) would exceed sale amount ({})",
            new_amount_paid, grand_total
        )));
    }

    sqlx::query(
        "UPDATE sales
         SET paid_amount = $2, received_amount = received_amount + $3, payment_status = $4
         WHERE id = $1",
    )
    .bind(id)
    .bind(new_amount_paid)
    .bind(req.additional_payment)
    .bind(payment_status(new_amount_paid, grand_total))
    .execute(&mut *tx)
    .await?;

    // Commit transaction
    tx.commit().await?;

    fetch_sale_by_id(&db_pool, id).await.map(Json)
}

// POST /pos/sales/:id/returns - return lines, clamped to what is still returnable
pub async fn create_return(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<CreateReturnRequest>,
) -> Result<(StatusCode, Json<SaleReturnResponse>), AppError> {
    if req.items.is_empty() {
        return Err(AppError::validation("Return must contain at least one item"));
    }

    let mut tx = db_pool.begin().await?;

    let (user_id, warehouse_id) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT user_id, warehouse_id FROM sales WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Sale not found"))?;

    if !auth.is_manager() && user_id != auth.user_id {
        return Err(AppError::forbidden("You can only record returns for your own sales"));
    }

    let sold = sqlx::query_as::<_, SaleItemRow>(SALE_ITEMS_QUERY)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

    let sale_item_ids: HashMap<i64, i64> = sold.iter().map(|row| (row.product_id, row.id)).collect();
    let sold_lines: Vec<SoldLine> = sold
        .into_iter()
        .map(|row| SoldLine {
            product_id: row.product_id,
            name: row.product_name,
            unit_price: row.unit_price,
            sold: row.quantity,
            returned: row.returned_quantity,
        })
        .collect();
    let requested: Vec<(i64, i32)> = req.items.iter().map(|i| (i.product_id, i.quantity)).collect();
    let return_cart = select_returns(&sold_lines, &requested)?;

    let total_refund = return_cart.totals().subtotal;

    let (return_id, created_at) = sqlx::query_as::<_, (i64, chrono::DateTime<chrono::Utc>)>(
        "INSERT INTO sale_returns (sale_id, user_id, total_refund, notes)
         VALUES ($1, $2, $3, $4)
         RETURNING id, created_at",
    )
    .bind(id)
    .bind(auth.user_id)
    .bind(total_refund)
    .bind(&req.notes)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(return_cart.items().len());
    for line in return_cart.items() {
        let sale_item_id = sale_item_ids[&line.id];

        sqlx::query(
            "INSERT INTO sale_return_items (return_id, sale_item_id, product_id, quantity, unit_price, line_total)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(return_id)
        .bind(sale_item_id)
        .bind(line.id)
        .bind(line.quantity)
        .bind(line.price)
        .bind(line.line_total())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO warehouse_stock (warehouse_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (warehouse_id, product_id)
             DO UPDATE SET quantity = warehouse_stock.quantity + EXCLUDED.quantity",
        )
        .bind(warehouse_id)
        .bind(line.id)
        .bind(line.quantity)
        .execute(&mut *tx)
        .await?;

        items.push(SaleReturnItemResponse {
            product_id: line.id,
            product_name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.price,
            line_total: line.line_total(),
        });
    }

    tx.commit().await?;

    tracing::info!(sale_id = id, return_id, total_refund, "Sale return recorded");

    Ok((
        StatusCode::CREATED,
        Json(SaleReturnResponse {
            id: return_id,
            sale_id: id,
            total_refund,
            notes: req.notes,
            created_at,
            items,
        }),
    ))
}

const SALE_ITEMS_QUERY: &str = "SELECT
        si.id, si.product_id, si.product_name, si.unit_price, si.quantity, si.line_total,
        COALESCE((SELECT SUM(ri.quantity) FROM sale_return_items ri WHERE ri.sale_item_id = si.id), 0)::BIGINT
            AS returned_quantity
    FROM sale_items si
    WHERE si.sale_id = $1
    ORDER BY si.id";

// Helper function to fetch full sale details
pub(crate) async fn fetch_sale_by_id(db_pool: &PgPool, id: i64) -> Result<SaleResponse, AppError> {
    // Fetch sale header
    let sale = sqlx::query_as::<_, SaleRow>(
        "SELECT
            s.id, s.reference, s.customer_id, c.name AS customer_name,
            s.warehouse_id, w.name AS warehouse_name,
            s.user_id, u.username AS cashier_username,
            s.subtotal, s.tax, s.shipping, s.discount, s.grand_total,
            s.received_amount, s.paid_amount, s.change_amount,
            s.payment_method, s.payment_status, s.notes, s.created_at
        FROM sales s
        JOIN customers c ON s.customer_id = c.id
        JOIN warehouses w ON s.warehouse_id = w.id
        JOIN users u ON s.user_id = u.id
        WHERE s.id = $1",
    )
    .bind(id)
    .fetch_optional(db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Sale not found"))?;

    // Fetch sale items
    let items_data = sqlx::query_as::<_, SaleItemRow>(SALE_ITEMS_QUERY)
        .bind(id)
        .fetch_all(db_pool)
        .await?;

    let total_items = items_data.iter().map(|i| i64::from(i.quantity)).sum();

    let items: Vec<SaleItemResponse> = items_data
        .into_iter()
        .map(|item| SaleItemResponse {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            returned_quantity: item.returned_quantity as i32,
            line_total: item.line_total,
        })
        .collect();

    Ok(SaleResponse {
        id: sale.id,
        reference: sale.reference,
        customer_id: sale.customer_id,
        customer_name: sale.customer_name,
        warehouse_id: sale.warehouse_id,
        warehouse_name: sale.warehouse_name,
        cashier_id: sale.user_id,
        cashier_username: sale.cashier_username,
        subtotal: sale.subtotal,
        tax: sale.tax,
        shipping: sale.shipping,
        discount: sale.discount,
        grand_total: sale.grand_total,
        received_amount: sale.received_amount,
        paid_amount: sale.paid_amount,
        change: sale.change_amount,
        payment_method: sale.payment_method,
        payment_status: sale.payment_status,
        notes: sale.notes,
        created_at: sale.created_at,
        items,
        summary: SaleSummary {
            total_items,
            balance_due: sale.grand_total - sale.paid_amount,
        },
    })
}
