// src/handlers/chat.rs
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::handlers::chatbots::{chatbot_documents, find_owned_chatbot};
use crate::handlers::required_id;
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::models::auth::Claims;
use crate::models::chat::*;
use crate::services::llm_client::{ChatMessage, CompletionParams, LlmError};
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::{post, Router},
};
use std::sync::Arc;

pub fn chat_routes() -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route_layer(axum::middleware::from_fn(auth_middleware))
        .route_layer(axum::middleware::from_fn(rate_limit_middleware))
}

/// Prompt preamble listing the chatbot's training material.
pub fn system_prompt(document_urls: &[String]) -> String {
    format!(
        "You are a helpful assistant trained on the following documents:\n{}\nUse this information to answer questions accurately.",
        document_urls.join("\n")
    )
}

/// System prompt, then prior turns, then the new user message.
pub fn build_conversation(
    document_urls: &[String],
    previous: &[PreviousMessage],
    message: &str,
) -> ApiResult<Vec<ChatMessage>> {
    let mut messages = Vec::with_capacity(previous.len() + 2);
    messages.push(ChatMessage::new("system", system_prompt(document_urls)));

    for turn in previous {
        match turn.role.as_str() {
            "user" | "assistant" | "system" => {
                messages.push(ChatMessage::new(turn.role.clone(), turn.content.clone()))
            }
            other => {
                return Err(ApiError::BadRequest(format!(
                    "Invalid message role: {}",
                    other
                )))
            }
        }
    }

    messages.push(ChatMessage::new("user", message));
    Ok(messages)
}

fn map_llm_error(err: LlmError) -> ApiError {
    match err {
        LlmError::QuotaExceeded => ApiError::TooManyRequests("OpenAI API Quota Exceeded".to_string()),
        LlmError::RateLimited => ApiError::TooManyRequests("Rate Limit Exceeded".to_string()),
        other => {
            tracing::error!("LLM request failed: {}", other);
            ApiError::BadGateway(format!("Failed to get a response from the model: {}", other))
        }
    }
}

async fn chat(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let llm = state.llm()?;

    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    let chatbot_id = required_id(payload.chatbot_id.as_deref(), "chatbotId")?;

    let chatbot = find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;
    let document_urls: Vec<String> = chatbot_documents(&state.db_pool, chatbot.id)
        .await?
        .into_iter()
        .map(|d| d.url)
        .collect();

    let previous = payload
        .context
        .map(|c| c.previous_messages)
        .unwrap_or_default();
    let conversation = build_conversation(&document_urls, &previous, message)?;

    let params = CompletionParams {
        model: chatbot.model.clone(),
        temperature: chatbot.temperature,
        max_tokens: chatbot.max_tokens,
    };

    let reply = llm.complete(&params, &conversation).await.map_err(map_llm_error)?;

    // Both sides of the exchange are stored together
    let mut tx = state.db_pool.begin().await?;
    sqlx::query("INSERT INTO messages (content, role, chatbot_id) VALUES ($1, 'user', $2)")
        .bind(message)
        .bind(chatbot.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO messages (content, role, chatbot_id) VALUES ($1, 'assistant', $2)")
        .bind(&reply)
        .bind(chatbot.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(chatbot_id = %chatbot.id, model = %chatbot.model, "chat completion stored");

    Ok(Json(ChatResponse { response: reply }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_document_urls() {
        let prompt = system_prompt(&["https://a/1".into(), "https://a/2".into()]);
        assert_eq!(
            prompt,
            "You are a helpful assistant trained on the following documents:\nhttps://a/1\nhttps://a/2\nUse this information to answer questions accurately."
        );
    }

    #[test]
    fn conversation_orders_system_history_then_message() {
        let previous = vec![
            PreviousMessage { role: "user".into(), content: "hi".into() },
            PreviousMessage { role: "assistant".into(), content: "hello".into() },
        ];
        let conversation = build_conversation(&[], &previous, "what now?").unwrap();
        let roles: Vec<_> = conversation.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(conversation[3].content, "what now?");
    }

    #[test]
    fn unknown_history_roles_are_rejected() {
        let previous = vec![PreviousMessage { role: "tool".into(), content: "x".into() }];
        assert!(matches!(
            build_conversation(&[], &previous, "q"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn provider_errors_map_to_statuses() {
        use axum::http::StatusCode;
        assert_eq!(map_llm_error(LlmError::QuotaExceeded).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(map_llm_error(LlmError::RateLimited).to_string(), "Rate Limit Exceeded");
        assert_eq!(
            map_llm_error(LlmError::Api { status: 500, message: "x".into() }).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
