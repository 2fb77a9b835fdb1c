use crate::error::ApiError;
use crate::models::auth::Claims;
use axum::{extract::Request, middleware::Next, response::Response};

pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    // Claims are set by the auth middleware
    match request.extensions().get::<Claims>() {
        Some(claims) if claims.is_admin() => Ok(next.run(request).await),
        Some(claims) => {
            tracing::warn!(user_id = %claims.sub, role = %claims.role, "admin access denied");
            Err(ApiError::Forbidden(
                "Admin access required. You must be an Admin or Super Admin.".to_string(),
            ))
        }
        None => Err(ApiError::Unauthorized(
            "Authentication required for admin access.".to_string(),
        )),
    }
}
