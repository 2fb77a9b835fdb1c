use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::handlers::auth::current_user;
use crate::middleware::auth::auth_middleware;
use crate::models::auth::Claims;
use crate::models::chatbot::*;
use crate::models::document::Document;
use crate::models::message::Message;
use crate::services::audit::{self, AuditEvent, RequestMeta};
use crate::AppState;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, Router},
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub(crate) const CHATBOT_COLUMNS: &str =
    "id, name, description, model, temperature, max_tokens, user_id, created_at, updated_at";

pub(crate) const DOCUMENT_COLUMNS: &str =
    "id, name, content_type, size, url, chatbot_id, created_at, updated_at";

pub fn chatbot_routes() -> Router {
    Router::new()
        .route("/api/chatbots", get(list_chatbots).post(create_chatbot))
        .route(
            "/api/chatbots/:id",
            get(get_chatbot).patch(update_chatbot).delete(delete_chatbot),
        )
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

/// Loads a chatbot only if it belongs to `user_id`; anything else is a 404.
pub async fn find_owned_chatbot(pool: &PgPool, chatbot_id: Uuid, user_id: Uuid) -> ApiResult<Chatbot> {
    sqlx::query_as::<_, Chatbot>(&format!(
        "SELECT {} FROM chatbots WHERE id = $1 AND user_id = $2",
        CHATBOT_COLUMNS
    ))
    .bind(chatbot_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Chatbot not found".to_string()))
}

pub async fn chatbot_documents(pool: &PgPool, chatbot_id: Uuid) -> Result<Vec<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents WHERE chatbot_id = $1 ORDER BY created_at DESC",
        DOCUMENT_COLUMNS
    ))
    .bind(chatbot_id)
    .fetch_all(pool)
    .await
}

async fn list_chatbots(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Chatbot>>> {
    let chatbots = sqlx::query_as::<_, Chatbot>(&format!(
        "SELECT {} FROM chatbots WHERE user_id = $1 ORDER BY created_at DESC",
        CHATBOT_COLUMNS
    ))
    .bind(claims.sub)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(chatbots))
}

async fn create_chatbot(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<CreateChatbotRequest>,
) -> ApiResult<(StatusCode, Json<Chatbot>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }

    let chatbot = sqlx::query_as::<_, Chatbot>(&format!(
        "INSERT INTO chatbots (name, description, user_id) VALUES ($1, $2, $3) RETURNING {}",
        CHATBOT_COLUMNS
    ))
    .bind(name)
    .bind(&payload.description)
    .bind(claims.sub)
    .fetch_one(&state.db_pool)
    .await?;

    tracing::info!(chatbot_id = %chatbot.id, user_id = %claims.sub, "chatbot created");

    Ok((StatusCode::CREATED, Json(chatbot)))
}

async fn get_chatbot(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ChatbotDetail>> {
    let chatbot = find_owned_chatbot(&state.db_pool, id, claims.sub).await?;

    let documents = chatbot_documents(&state.db_pool, id);
    let messages = sqlx::query_as::<_, Message>(
        "SELECT id, content, role, chatbot_id, created_at FROM messages
         WHERE chatbot_id = $1 ORDER BY created_at DESC LIMIT 10",
    )
    .bind(id)
    .fetch_all(&state.db_pool);

    let (documents, messages) = futures::try_join!(documents, messages)?;

    Ok(Json(ChatbotDetail {
        chatbot,
        documents,
        messages,
    }))
}

async fn update_chatbot(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateChatbotRequest>,
) -> ApiResult<Json<Chatbot>> {
    payload.validate().map_err(ApiError::BadRequest)?;

    let chatbot = sqlx::query_as::<_, Chatbot>(&format!(
        "UPDATE chatbots SET
            name = COALESCE($3, name),
            description = CASE WHEN $4 THEN $5 ELSE description END,
            model = COALESCE($6, model),
            temperature = COALESCE($7, temperature),
            max_tokens = COALESCE($8, max_tokens),
            updated_at = NOW()
         WHERE id = $1 AND user_id = $2
         RETURNING {}",
        CHATBOT_COLUMNS
    ))
    .bind(id)
    .bind(claims.sub)
    .bind(payload.name.as_deref().map(str::trim))
    // An omitted description is kept, null clears it
    .bind(payload.description.is_some())
    .bind(payload.description.clone().flatten())
    .bind(payload.model.as_deref().map(str::trim))
    .bind(payload.temperature)
    .bind(payload.max_tokens)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Chatbot not found".to_string()))?;

    Ok(Json(chatbot))
}

async fn delete_chatbot(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state.db_pool, &claims).await?;

    // Documents and messages go with it through ON DELETE CASCADE
    let result = sqlx::query("DELETE FROM chatbots WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(claims.sub)
        .execute(&state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Chatbot not found".to_string()));
    }

    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("DELETE_CHATBOT", user.id, user.organization_id, "chatbot", id),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
