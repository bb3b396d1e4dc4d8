use bcrypt::{hash, verify, DEFAULT_COST};
use crate::dtos::user::{RegisterUserRequest, UserResponse, LoginRequest, LoginResponse, ROLES};
use crate::auth::jwt::{sign_token, TOKEN_TTL_HOURS};
use crate::error::{map_constraint_violation, AppError};
use crate::models::user::User;
use axum::{extract::State, http::StatusCode, Json};
use crate::state::AppState;
use crate::middleware::auth::AuthContext;
use axum::extract::Extension;

const USER_COLUMNS: &str = "id, username, password_hash, role, is_active, created_at";

/// Role granted through open registration. Only the first account may be a
/// manager; later managers come from `POST /users`.
fn open_registration_role(requested: &str, has_users: bool) -> Result<&'static str, AppError> {
    match requested {
        "cashier" => Ok("cashier"),
        "manager" if !has_users => Ok("manager"),
        "manager" => Err(AppError::forbidden("Managers can only be created by a manager")),
        _ => Err(AppError::validation("Invalid role")),
    }
}

fn validate_new_user(payload: &RegisterUserRequest) -> Result<(), AppError> {
    if !ROLES.contains(&payload.role.as_str()) {
        return Err(AppError::validation("Invalid role"));
    }
    if payload.username.trim().is_empty() {
        return Err(AppError::validation("Username required"));
    }
    if payload.password.len() < 6 {
        return Err(AppError::validation("Password too short"));
    }
    Ok(())
}

async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::internal(format!("Hash task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Hash error: {e}")))
}

// POST /users/register - open sign-up; cashier, or manager for the first account
pub async fn register_user(
    State(AppState { db_pool, .. }): State<AppState>,
    Json(payload): Json<RegisterUserRequest>
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    validate_new_user(&payload)?;

    let has_users = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users)")
        .fetch_one(&db_pool)
        .await?;
    let role = open_registration_role(&payload.role, has_users)?;

    let password_hash = hash_password(payload.password).await?;

    // The NOT EXISTS guard keeps a racing second sign-up from also claiming manager
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, password_hash, role)
         SELECT $1, $2, $3
         WHERE $3 = 'cashier' OR NOT EXISTS (SELECT 1 FROM users)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.username.trim())
    .bind(password_hash)
    .bind(role)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Username already exists", "Invalid user data"))?
    .ok_or_else(|| AppError::forbidden("Managers can only be created by a manager"))?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

// POST /users - manager creates an account with any role
pub async fn create_user(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<RegisterUserRequest>
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    auth.require_manager("Only managers can create users")?;
    validate_new_user(&payload)?;

    let password_hash = hash_password(payload.password).await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, password_hash, role)
         VALUES ($1, $2, $3)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.username.trim())
    .bind(password_hash)
    .bind(&payload.role)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Username already exists", "Invalid user data"))?;

    tracing::info!(user_id = user.id, role = %user.role, created_by = auth.user_id, "User created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login_user(
    State(AppState { db_pool, config, .. }): State<AppState>,
    Json(payload): Json<LoginRequest>
) -> Result<Json<LoginResponse>, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::validation("Username required"));
    }
    if payload.password.is_empty() {
        return Err(AppError::validation("Password required"));
    }

    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
        .bind(payload.username.trim())
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_active {
        return Err(AppError::forbidden("User inactive"));
    }

    let password_hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify(payload.password, &password_hash))
        .await
        .map_err(|e| AppError::internal(format!("Verify task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password verify error: {e}")))?;

    if !ok {
        return Err(AppError::Unauthorized);
    }

    let token = sign_token(user.id, &user.role, &user.username, &config.jwt_secret)?;

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer",
        expires_in_seconds: (TOKEN_TTL_HOURS * 60 * 60) as usize,
        username: user.username,
        role: user.role,
    }))
}

// Authenticated endpoint: returns full user profile from DB using the id in AuthContext
pub async fn get_me(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>
) -> Result<Json<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(auth.user_id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}
