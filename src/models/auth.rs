use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const SUPER_ADMIN_ROLE: &str = "Super Admin";
pub const ADMIN_ROLE: &str = "Admin";
pub const GUEST_ROLE: &str = "Guest";

/// Emails are stored and compared trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub organization_id: Uuid,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub role: String,
}

impl UserResponse {
    pub fn new(user: &User, role: impl Into<String>) -> Self {
        UserResponse {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: role.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserResponse,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user id
    pub email: String,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn is_super_admin(&self) -> bool {
        self.role == SUPER_ADMIN_ROLE
    }

    pub fn is_admin(&self) -> bool {
        self.is_super_admin() || self.role == ADMIN_ROLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "a@b.c".into(),
            role: role.into(),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn emails_are_case_folded() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn admin_checks_follow_role_names() {
        assert!(claims("Super Admin").is_admin());
        assert!(claims("Super Admin").is_super_admin());
        assert!(claims("Admin").is_admin());
        assert!(!claims("Admin").is_super_admin());
        assert!(!claims("Guest").is_admin());
    }

    #[test]
    fn login_response_uses_camel_case_token() {
        let user = UserResponse {
            id: Uuid::nil(),
            name: None,
            email: "a@b.c".into(),
            role: "Guest".into(),
        };
        let json = serde_json::to_value(LoginResponse {
            success: true,
            user,
            access_token: "t".into(),
        })
        .unwrap();
        assert_eq!(json["accessToken"], "t");
        assert_eq!(json["user"]["role"], "Guest");
    }
}
