// src/handlers/mod.rs
pub mod analytics;
pub mod audit_logs;
pub mod auth;
pub mod billing;
pub mod chat;
pub mod chatbots;
pub mod documents;
pub mod messages;
pub mod rbac;
pub mod status;
pub mod team;
pub mod training;

use crate::error::{ApiError, ApiResult};
use uuid::Uuid;

/// Parses an id supplied in a JSON body or query string.
/// Missing or blank values are a 400, malformed ones too.
pub(crate) fn required_id(raw: Option<&str>, field: &str) -> ApiResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {}", field)))
}
