use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub action: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub resource_type: String,
    pub resource_id: String,
    pub details: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, FromRow)]
pub struct AuditLogRow {
    #[sqlx(flatten)]
    pub log: AuditLog,
    pub user_name: Option<String>,
    pub user_email: String,
}

#[derive(Debug, Serialize)]
pub struct AuditUser {
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AuditLogEntry {
    #[serde(flatten)]
    pub log: AuditLog,
    pub user: AuditUser,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        AuditLogEntry {
            log: row.log,
            user: AuditUser {
                name: row.user_name,
                email: row.user_email,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditLogRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: String,
    pub details: Option<serde_json::Value>,
}

impl CreateAuditLogRequest {
    /// Strings are stored as-is, any other JSON value is stored serialized.
    pub fn details_text(&self) -> Option<String> {
        match &self.details {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_keep_strings_and_serialize_objects() {
        let req: CreateAuditLogRequest = serde_json::from_str(
            r#"{"action":"LOGIN","resourceType":"user","resourceId":"1","details":{"a":1}}"#,
        )
        .unwrap();
        assert_eq!(req.details_text().as_deref(), Some(r#"{"a":1}"#));

        let req: CreateAuditLogRequest =
            serde_json::from_str(r#"{"action":"LOGIN","details":"plain"}"#).unwrap();
        assert_eq!(req.details_text().as_deref(), Some("plain"));
        assert_eq!(req.resource_type, "");
    }
}
