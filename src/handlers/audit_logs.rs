use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::handlers::auth::current_user;
use crate::middleware::auth::auth_middleware;
use crate::models::audit::*;
use crate::models::auth::Claims;
use crate::services::audit::{self, AuditEvent, RequestMeta};
use crate::AppState;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, Router},
};
use std::sync::Arc;

pub fn audit_log_routes() -> Router {
    Router::new()
        .route("/api/audit-logs", get(list_audit_logs).post(create_audit_log))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

async fn list_audit_logs(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let user = current_user(&state.db_pool, &claims).await?;

    let rows = sqlx::query_as::<_, AuditLogRow>(
        "SELECT a.id, a.action, a.user_id, a.organization_id, a.resource_type, a.resource_id,
                a.details, a.ip_address, a.user_agent, a.timestamp,
                u.name AS user_name, u.email AS user_email
         FROM audit_logs a
         JOIN users u ON u.id = a.user_id
         WHERE a.organization_id = $1
         ORDER BY a.timestamp DESC
         LIMIT 100",
    )
    .bind(user.organization_id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(rows.into_iter().map(AuditLogEntry::from).collect()))
}

async fn create_audit_log(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CreateAuditLogRequest>,
) -> ApiResult<(StatusCode, Json<AuditLog>)> {
    let action = payload.action.trim();
    if action.is_empty() {
        return Err(ApiError::BadRequest("Action is required".to_string()));
    }

    let user = current_user(&state.db_pool, &claims).await?;

    let mut event = AuditEvent::new(
        action,
        user.id,
        user.organization_id,
        payload.resource_type.clone(),
        &payload.resource_id,
    );
    event.details = payload.details_text();

    let log = audit::record(&state.db_pool, &event, &RequestMeta::from_headers(&headers)).await?;

    Ok((StatusCode::CREATED, Json(log)))
}
