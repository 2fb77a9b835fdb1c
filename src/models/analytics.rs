use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsagePoint {
    pub name: String,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub period: String,
    pub total_messages: i64,
    pub active_chatbots: i64,
    pub total_chatbots: i64,
    pub total_documents: i64,
    pub usage_trends: Vec<UsagePoint>,
}
