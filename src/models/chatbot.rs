use super::document::Document;
use super::message::Message;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chatbot {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub user_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatbotRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChatbotRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
}

impl UpdateChatbotRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("Name cannot be empty".to_string());
            }
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err("Model cannot be empty".to_string());
            }
        }
        validate_model_params(self.temperature, self.max_tokens)
    }
}

/// Shared bounds for chatbot model settings.
pub fn validate_model_params(temperature: Option<f64>, max_tokens: Option<i32>) -> Result<(), String> {
    if let Some(t) = temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err("Temperature must be between 0 and 2".to_string());
        }
    }
    if let Some(m) = max_tokens {
        if m <= 0 {
            return Err("maxTokens must be greater than 0".to_string());
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ChatbotDetail {
    #[serde(flatten)]
    pub chatbot: Chatbot,
    pub documents: Vec<Document>,
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_bounds_are_inclusive() {
        assert!(validate_model_params(Some(0.0), None).is_ok());
        assert!(validate_model_params(Some(2.0), None).is_ok());
        assert!(validate_model_params(Some(2.1), None).is_err());
        assert!(validate_model_params(Some(-0.1), None).is_err());
    }

    #[test]
    fn max_tokens_must_be_positive() {
        assert!(validate_model_params(None, Some(1)).is_ok());
        assert!(validate_model_params(None, Some(0)).is_err());
    }

    #[test]
    fn blank_name_is_rejected_on_update() {
        let update = UpdateChatbotRequest {
            name: Some("  ".into()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn update_accepts_camel_case_fields() {
        let update: UpdateChatbotRequest =
            serde_json::from_str(r#"{"maxTokens": 256, "temperature": 1.2}"#).unwrap();
        assert_eq!(update.max_tokens, Some(256));
        assert!(update.validate().is_ok());
    }

    #[test]
    fn description_can_be_cleared() {
        let update: UpdateChatbotRequest = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(update.description, Some(None));

        let update: UpdateChatbotRequest = serde_json::from_str(r#"{"name": "Bot"}"#).unwrap();
        assert_eq!(update.description, None);
    }
}
