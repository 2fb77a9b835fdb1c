use crate::error::{is_foreign_key_violation, is_unique_violation, ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::admin::admin_middleware;
use crate::middleware::auth::auth_middleware;
use crate::models::rbac::*;
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
    routing::{get, Router},
};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

pub fn rbac_routes() -> Router {
    Router::new()
        .route(
            "/api/roles",
            get(list_roles).post(create_role).put(update_role).delete(delete_role),
        )
        .route(
            "/api/permissions",
            get(list_permissions)
                .post(create_permission)
                .put(update_permission)
                .delete(delete_permission),
        )
        // Layers run bottom-up: authenticate first, then check the role
        .route_layer(axum::middleware::from_fn(admin_middleware))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

fn map_write_error(e: sqlx::Error, conflict: &str) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict(conflict.to_string())
    } else if is_foreign_key_violation(&e) {
        ApiError::BadRequest("Referenced permission does not exist".to_string())
    } else {
        ApiError::Database(e)
    }
}

async fn role_with_permissions(pool: &PgPool, role: Role) -> Result<RoleWithPermissions, sqlx::Error> {
    let permissions = sqlx::query_as::<_, Permission>(
        "SELECT p.id, p.name, p.route, p.parent_id
         FROM role_permissions rp
         JOIN permissions p ON p.id = rp.permission_id
         WHERE rp.role_id = $1
         ORDER BY p.id",
    )
    .bind(role.id)
    .fetch_all(pool)
    .await?;

    Ok(RoleWithPermissions { role, permissions })
}

async fn set_role_permissions(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i32,
    permission_ids: &[i32],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;

    if !permission_ids.is_empty() {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id)
             SELECT $1, UNNEST($2::int[])
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn list_roles(Extension(state): Extension<Arc<AppState>>) -> ApiResult<Json<Vec<RoleWithPermissions>>> {
    let roles = sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles ORDER BY id")
        .fetch_all(&state.db_pool)
        .await?;

    let links = sqlx::query_as::<_, RolePermissionRow>(
        "SELECT rp.role_id, p.id, p.name, p.route, p.parent_id
         FROM role_permissions rp
         JOIN permissions p ON p.id = rp.permission_id
         ORDER BY p.id",
    )
    .fetch_all(&state.db_pool)
    .await?;

    let mut by_role: HashMap<i32, Vec<Permission>> = HashMap::new();
    for link in links {
        by_role.entry(link.role_id).or_default().push(link.permission);
    }

    let roles = roles
        .into_iter()
        .map(|role| RoleWithPermissions {
            permissions: by_role.remove(&role.id).unwrap_or_default(),
            role,
        })
        .collect();

    Ok(Json(roles))
}

async fn create_role(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleWithPermissions>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Role name is required".to_string()));
    }

    let mut tx = state.db_pool.begin().await?;

    let role = sqlx::query_as::<_, Role>(
        "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id, name, description",
    )
    .bind(name)
    .bind(&payload.description)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_write_error(e, "Role with this name already exists"))?;

    set_role_permissions(&mut tx, role.id, &payload.permission_ids)
        .await
        .map_err(|e| map_write_error(e, "Role with this name already exists"))?;

    tx.commit().await?;

    tracing::info!(role_id = role.id, role = %role.name, "role created");

    Ok((StatusCode::CREATED, Json(role_with_permissions(&state.db_pool, role).await?)))
}

async fn update_role(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<RoleWithPermissions>> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Role name is required".to_string()));
    }

    let mut tx = state.db_pool.begin().await?;

    let role = sqlx::query_as::<_, Role>(
        "UPDATE roles SET name = $2, description = $3 WHERE id = $1 RETURNING id, name, description",
    )
    .bind(payload.id)
    .bind(name)
    .bind(&payload.description)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| map_write_error(e, "Role with this name already exists"))?
    .ok_or_else(|| ApiError::NotFound("Role not found".to_string()))?;

    set_role_permissions(&mut tx, role.id, &payload.permission_ids)
        .await
        .map_err(|e| map_write_error(e, "Role with this name already exists"))?;

    tx.commit().await?;

    Ok(Json(role_with_permissions(&state.db_pool, role).await?))
}

async fn delete_role(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<DeleteByIdRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(payload.id)
        .execute(&state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Role not found".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Role deleted successfully".to_string(),
    }))
}

async fn list_permissions(
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Json<Vec<PermissionWithRoles>>> {
    let permissions = sqlx::query_as::<_, Permission>(
        "SELECT id, name, route, parent_id FROM permissions ORDER BY id",
    )
    .fetch_all(&state.db_pool)
    .await?;

    let links = sqlx::query_as::<_, PermissionRoleRow>(
        "SELECT rp.permission_id, r.id, r.name, r.description
         FROM role_permissions rp
         JOIN roles r ON r.id = rp.role_id
         ORDER BY r.id",
    )
    .fetch_all(&state.db_pool)
    .await?;

    let mut by_permission: HashMap<i32, Vec<Role>> = HashMap::new();
    for link in links {
        by_permission.entry(link.permission_id).or_default().push(link.role);
    }

    let permissions = permissions
        .into_iter()
        .map(|permission| PermissionWithRoles {
            roles: by_permission.remove(&permission.id).unwrap_or_default(),
            permission,
        })
        .collect();

    Ok(Json(permissions))
}

async fn create_permission(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    let name = payload.name.trim();
    let route = payload.route.trim();
    if name.is_empty() || route.is_empty() {
        return Err(ApiError::BadRequest("Name and route are required".to_string()));
    }

    let permission = sqlx::query_as::<_, Permission>(
        "INSERT INTO permissions (name, route, parent_id) VALUES ($1, $2, $3)
         RETURNING id, name, route, parent_id",
    )
    .bind(name)
    .bind(route)
    .bind(payload.parent_id)
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_write_error(e, "Permission with this name already exists"))?;

    Ok((StatusCode::CREATED, Json(permission)))
}

async fn update_permission(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<UpdatePermissionRequest>,
) -> ApiResult<Json<Permission>> {
    if payload.parent_id == Some(Some(payload.id)) {
        return Err(ApiError::BadRequest("A permission cannot be its own parent".to_string()));
    }
    if payload.name.as_deref().map(|n| n.trim().is_empty()).unwrap_or(false)
        || payload.route.as_deref().map(|r| r.trim().is_empty()).unwrap_or(false)
    {
        return Err(ApiError::BadRequest("Name and route cannot be empty".to_string()));
    }

    let permission = sqlx::query_as::<_, Permission>(
        "UPDATE permissions SET
            name = COALESCE($2, name),
            route = COALESCE($3, route),
            parent_id = CASE WHEN $4 THEN $5 ELSE parent_id END
         WHERE id = $1
         RETURNING id, name, route, parent_id",
    )
    .bind(payload.id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.route.as_deref().map(str::trim))
    // An omitted parentId keeps the current parent, null detaches
    .bind(payload.parent_id.is_some())
    .bind(payload.parent_id.flatten())
    .fetch_optional(&state.db_pool)
    .await
    .map_err(|e| map_write_error(e, "Permission with this name already exists"))?
    .ok_or_else(|| ApiError::NotFound("Permission not found".to_string()))?;

    Ok(Json(permission))
}

async fn delete_permission(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<DeleteByIdRequest>,
) -> ApiResult<Json<MessageResponse>> {
    // Children keep existing with parent_id nulled by the foreign key
    let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
        .bind(payload.id)
        .execute(&state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Permission not found".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Permission deleted successfully".to_string(),
    }))
}
