use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::handlers::auth::current_user;
use crate::middleware::auth::auth_middleware;
use crate::models::auth::{normalize_email, Claims};
use crate::models::team::*;
use crate::services::audit::{self, AuditEvent, RequestMeta};
use crate::AppState;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, Router},
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const INVITE_TTL_DAYS: i64 = 7;
const INVITE_COLUMNS: &str = "id, email, role, status, organization_id, expires_at, created_at";

pub fn team_routes() -> Router {
    Router::new()
        .route("/api/team/members", get(list_members).post(invite_member))
        .route("/api/team/members/:id", delete(remove_member))
        .route("/api/team/invite", post(invite_member))
        .route("/api/team/invites/:id", delete(revoke_invite))
        .route("/api/team/invites/:id/accept", post(accept_invite))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

async fn list_members(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<TeamOverview>> {
    let user = current_user(&state.db_pool, &claims).await?;

    let members = sqlx::query_as::<_, MemberRow>(
        "SELECT id, name, email, created_at FROM users
         WHERE organization_id = $1 AND is_active = TRUE
         ORDER BY created_at",
    )
    .bind(user.organization_id)
    .fetch_all(&state.db_pool);

    let invites_sql = format!(
        "SELECT {} FROM team_invites
         WHERE organization_id = $1 AND status = $2 AND expires_at > NOW()
         ORDER BY created_at DESC",
        INVITE_COLUMNS
    );
    let invites = sqlx::query_as::<_, TeamInvite>(&invites_sql)
        .bind(user.organization_id)
        .bind(INVITE_PENDING)
        .fetch_all(&state.db_pool);

    let (members, invites) = futures::try_join!(members, invites)?;

    Ok(Json(TeamOverview {
        members: members
            .into_iter()
            .map(|row| TeamMember::from_row(row, user.id))
            .collect(),
        invites,
    }))
}

async fn invite_member(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<InviteRequest>,
) -> ApiResult<(StatusCode, Json<TeamInvite>)> {
    let email = normalize_email(&payload.email);
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }
    let role = InviteRole::parse(payload.role.as_deref())
        .ok_or_else(|| ApiError::BadRequest("Role must be 'member' or 'admin'".to_string()))?;

    let user = current_user(&state.db_pool, &claims).await?;

    let already_member = sqlx::query("SELECT 1 FROM users WHERE lower(email) = $1 AND organization_id = $2")
        .bind(&email)
        .bind(user.organization_id)
        .fetch_optional(&state.db_pool)
        .await?;
    if already_member.is_some() {
        return Err(ApiError::Conflict("User is already a member of this team".to_string()));
    }

    // Lapsed invites must not block a fresh one
    sqlx::query(
        "UPDATE team_invites SET status = $3
         WHERE organization_id = $1 AND email = $2 AND status = $4 AND expires_at <= NOW()",
    )
    .bind(user.organization_id)
    .bind(&email)
    .bind(INVITE_REVOKED)
    .bind(INVITE_PENDING)
    .execute(&state.db_pool)
    .await?;

    let invite = sqlx::query_as::<_, TeamInvite>(&format!(
        "INSERT INTO team_invites (email, role, status, organization_id, expires_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {}",
        INVITE_COLUMNS
    ))
    .bind(&email)
    .bind(role.as_str())
    .bind(INVITE_PENDING)
    .bind(user.organization_id)
    .bind(Utc::now() + Duration::days(INVITE_TTL_DAYS))
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("An invitation is already pending for this email".to_string())
        } else {
            ApiError::Database(e)
        }
    })?;

    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("INVITE_MEMBER", user.id, user.organization_id, "team_invite", invite.id)
            .with_details(serde_json::json!({ "email": invite.email, "role": invite.role })),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok((StatusCode::CREATED, Json(invite)))
}

async fn remove_member(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiPath(member_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !claims.is_admin() {
        return Err(ApiError::Forbidden("Only admins can remove team members".to_string()));
    }
    let user = current_user(&state.db_pool, &claims).await?;
    if member_id == user.id {
        return Err(ApiError::BadRequest("You cannot remove yourself from the team".to_string()));
    }

    let member = sqlx::query_as::<_, MemberRow>(
        "SELECT id, name, email, created_at FROM users WHERE id = $1 AND organization_id = $2",
    )
    .bind(member_id)
    .bind(user.organization_id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Team member not found".to_string()))?;

    // The removed member keeps their data in a new personal organization
    let org_name = format!(
        "{}'s Organization",
        member.name.as_deref().unwrap_or(&member.email)
    );

    let mut tx = state.db_pool.begin().await?;
    let new_org: Uuid = sqlx::query_scalar("INSERT INTO organizations (name) VALUES ($1) RETURNING id")
        .bind(&org_name)
        .fetch_one(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET organization_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(member.id)
        .bind(new_org)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("REMOVE_MEMBER", user.id, user.organization_id, "user", member.id),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_invite(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiPath(invite_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state.db_pool, &claims).await?;

    let result = sqlx::query(
        "UPDATE team_invites SET status = $3
         WHERE id = $1 AND organization_id = $2 AND status = $4",
    )
    .bind(invite_id)
    .bind(user.organization_id)
    .bind(INVITE_REVOKED)
    .bind(INVITE_PENDING)
    .execute(&state.db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Invitation not found".to_string()));
    }

    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("REVOKE_INVITE", user.id, user.organization_id, "team_invite", invite_id),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn accept_invite(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiPath(invite_id): ApiPath<Uuid>,
) -> ApiResult<Json<AcceptInviteResponse>> {
    let user = current_user(&state.db_pool, &claims).await?;

    let invite = sqlx::query_as::<_, TeamInvite>(&format!(
        "SELECT {} FROM team_invites WHERE id = $1",
        INVITE_COLUMNS
    ))
    .bind(invite_id)
    .fetch_optional(&state.db_pool)
    .await?
    .filter(|invite| invite.status == INVITE_PENDING)
    .ok_or_else(|| ApiError::NotFound("Invitation not found".to_string()))?;

    if !invite.email.eq_ignore_ascii_case(&user.email) {
        return Err(ApiError::Forbidden("This invitation was sent to a different email".to_string()));
    }
    if invite.is_expired_at(Utc::now()) {
        return Err(ApiError::Gone("Invitation has expired".to_string()));
    }

    let mut tx = state.db_pool.begin().await?;
    // Guards against a concurrent revoke or double accept
    let claimed = sqlx::query("UPDATE team_invites SET status = $2 WHERE id = $1 AND status = $3")
        .bind(invite.id)
        .bind(INVITE_ACCEPTED)
        .bind(INVITE_PENDING)
        .execute(&mut *tx)
        .await?;
    if claimed.rows_affected() == 0 {
        return Err(ApiError::NotFound("Invitation not found".to_string()));
    }
    sqlx::query("UPDATE users SET organization_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .bind(invite.organization_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("ACCEPT_INVITE", user.id, invite.organization_id, "team_invite", invite.id),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok(Json(AcceptInviteResponse {
        success: true,
        organization_id: invite.organization_id,
    }))
}
