use super::document::Document;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrainingRequest {
    pub chatbot_id: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub model_config: ModelConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrainingResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatusQuery {
    pub chatbot_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    pub chatbot_id: Uuid,
    pub documents_count: usize,
    pub last_training_date: chrono::DateTime<chrono::Utc>,
    pub status: &'static str,
    pub documents: Vec<Document>,
    pub name: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i32,
}

#[derive(Debug, Deserialize)]
pub struct PhaseRequest {
    pub phase: Option<String>,
    #[serde(default)]
    pub progress: f64,
}

#[derive(Debug, Serialize)]
pub struct CancelTrainingResponse {
    pub success: bool,
    pub message: String,
}
