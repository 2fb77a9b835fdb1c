use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: i64,
    pub url: String,
    pub chatbot_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWithChatbot {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub document: Document,
    pub chatbot_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteImportRequest {
    pub url: Option<String>,
    pub chatbot_id: Option<String>,
    pub custom_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiImportRequest {
    pub endpoint: Option<String>,
    pub chatbot_id: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub method: Option<String>,
    pub custom_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub success: bool,
}
