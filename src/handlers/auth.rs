use crate::config::Config;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::auth::bearer_token;
use crate::middleware::rate_limit::strict_rate_limit_middleware;
use crate::models::auth::*;
use crate::AppState;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, Router},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, organization_id, is_active, created_at, updated_at";

pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/register", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify", get(verify_token))
        .layer(axum::middleware::from_fn(strict_rate_limit_middleware))
}

async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let email = normalize_email(&payload.email);
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let existing = sqlx::query("SELECT id FROM users WHERE lower(email) = $1")
        .bind(&email)
        .fetch_optional(&state.db_pool)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("User with this email already exists".to_string()));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        tracing::error!("Error hashing password: {}", e);
        ApiError::Internal("Internal server error".to_string())
    })?;

    let org_name = format!("{}'s Organization", name.as_deref().unwrap_or(&email));

    // Organization, user and default role are created together or not at all
    let mut tx = state.db_pool.begin().await?;

    let organization_id: Uuid =
        sqlx::query_scalar("INSERT INTO organizations (name) VALUES ($1) RETURNING id")
            .bind(&org_name)
            .fetch_one(&mut *tx)
            .await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password_hash, organization_id)
         VALUES ($1, $2, $3, $4)
         RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(organization_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("User with this email already exists".to_string())
        } else {
            ApiError::Database(e)
        }
    })?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE name = $2")
        .bind(user.id)
        .bind(GUEST_ROLE)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, organization_id = %organization_id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: "User created successfully".to_string(),
            user: UserResponse::new(&user, GUEST_ROLE),
        }),
    ))
}

async fn login(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE lower(email) = $1", USER_COLUMNS))
        .bind(&email)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "login attempt for inactive account");
        return Err(invalid());
    }

    // Accounts created without a password cannot log in with one
    let stored_hash = user.password_hash.as_deref().ok_or_else(invalid)?;

    match verify(&payload.password, stored_hash) {
        Ok(true) => {}
        Ok(false) => return Err(invalid()),
        Err(e) => {
            tracing::error!("Error verifying password: {}", e);
            return Err(invalid());
        }
    }

    let role = primary_role(&state.db_pool, user.id).await?;
    let access_token = generate_jwt_token(&state.config, &user, &role)?;

    Ok(Json(LoginResponse {
        success: true,
        user: UserResponse::new(&user, role),
        access_token,
    }))
}

async fn verify_token(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<VerifyResponse>> {
    let token = bearer_token(&headers)?;
    let claims = verify_jwt_token(token, &state.config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    let user = current_user(&state.db_pool, &claims).await?;
    let role = primary_role(&state.db_pool, user.id).await?;

    Ok(Json(VerifyResponse {
        success: true,
        user: UserResponse::new(&user, role),
    }))
}

/// The user's first role by role id, or Guest when none is assigned.
pub async fn primary_role(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let role: Option<String> = sqlx::query_scalar(
        "SELECT r.name FROM user_roles ur
         JOIN roles r ON r.id = ur.role_id
         WHERE ur.user_id = $1
         ORDER BY r.id
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(role.unwrap_or_else(|| GUEST_ROLE.to_string()))
}

/// Re-reads the caller so organization membership is never taken from the token.
pub async fn current_user(pool: &PgPool, claims: &Claims) -> ApiResult<User> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(claims.sub)
        .fetch_optional(pool)
        .await?;

    match user {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ApiError::Unauthorized("User not found".to_string())),
    }
}

pub fn generate_jwt_token(config: &Config, user: &User, role: &str) -> ApiResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: role.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.jwt_expiry_hours)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Error generating JWT token: {}", e);
        ApiError::Internal("Internal server error".to_string())
    })
}

pub fn verify_jwt_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
