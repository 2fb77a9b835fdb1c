// src/services/audit.rs
use crate::models::audit::AuditLog;
use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

/// Client fingerprint stored with each audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMeta {
    pub ip_address: String,
    pub user_agent: String,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("unknown")
            .to_string();
        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or("unknown")
            .to_string();
        Self {
            ip_address,
            user_agent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub resource_type: String,
    pub resource_id: String,
    pub details: Option<String>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        user_id: Uuid,
        organization_id: Uuid,
        resource_type: impl Into<String>,
        resource_id: impl ToString,
    ) -> Self {
        Self {
            action: action.into(),
            user_id,
            organization_id,
            resource_type: resource_type.into(),
            resource_id: resource_id.to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

pub async fn record(pool: &PgPool, event: &AuditEvent, meta: &RequestMeta) -> Result<AuditLog, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(
        "INSERT INTO audit_logs (action, user_id, organization_id, resource_type, resource_id, details, ip_address, user_agent)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id, action, user_id, organization_id, resource_type, resource_id, details, ip_address, user_agent, timestamp",
    )
    .bind(&event.action)
    .bind(event.user_id)
    .bind(event.organization_id)
    .bind(&event.resource_type)
    .bind(&event.resource_id)
    .bind(&event.details)
    .bind(&meta.ip_address)
    .bind(&meta.user_agent)
    .fetch_one(pool)
    .await
}

/// Server-side events must never fail the request that triggered them.
pub async fn record_best_effort(pool: &PgPool, event: AuditEvent, meta: &RequestMeta) {
    if let Err(e) = record(pool, &event, meta).await {
        tracing::warn!(action = %event.action, resource_id = %event.resource_id, "failed to record audit event: {}", e);
    }
}
