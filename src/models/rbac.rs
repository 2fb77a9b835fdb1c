use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: i32,
    pub name: String,
    pub route: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub struct PermissionWithRoles {
    #[serde(flatten)]
    pub permission: Permission,
    pub roles: Vec<Role>,
}

/// Join row used to attach permissions to roles.
#[derive(Debug, FromRow)]
pub struct RolePermissionRow {
    pub role_id: i32,
    #[sqlx(flatten)]
    pub permission: Permission,
}

/// Join row used to attach roles to permissions.
#[derive(Debug, FromRow)]
pub struct PermissionRoleRow {
    pub permission_id: i32,
    #[sqlx(flatten)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteByIdRequest {
    pub id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub route: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionRequest {
    pub id: i32,
    pub name: Option<String>,
    pub route: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub parent_id: Option<Option<i32>>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_parent_is_left_alone() {
        let update: UpdatePermissionRequest = serde_json::from_str(r#"{"id":3,"name":"x"}"#).unwrap();
        assert_eq!(update.parent_id, None);
    }

    #[test]
    fn null_parent_detaches() {
        let update: UpdatePermissionRequest = serde_json::from_str(r#"{"id":3,"parentId":null}"#).unwrap();
        assert_eq!(update.parent_id, Some(None));

        let update: UpdatePermissionRequest = serde_json::from_str(r#"{"id":3,"parentId":7}"#).unwrap();
        assert_eq!(update.parent_id, Some(Some(7)));
    }
}
