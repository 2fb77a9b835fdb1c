use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::handlers::required_id;
use crate::middleware::auth::auth_middleware;
use crate::models::auth::Claims;
use crate::models::message::*;
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
    routing::{delete, get, Router},
};
use std::sync::Arc;
use uuid::Uuid;

const MESSAGES_PER_CHATBOT: i64 = 100;

pub fn message_routes() -> Router {
    Router::new()
        .route("/api/messages", get(list_messages).delete(delete_message_by_query))
        .route("/api/messages/:id", delete(delete_message))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<MessageListItem>>> {
    // Latest messages of each chatbot, capped per chatbot
    let rows = sqlx::query_as::<_, MessageWithChatbot>(
        "SELECT m.id, m.content, m.role, m.chatbot_id, m.created_at, c.name AS chatbot_name
         FROM chatbots c
         CROSS JOIN LATERAL (
             SELECT id, content, role, chatbot_id, created_at
             FROM messages
             WHERE chatbot_id = c.id
             ORDER BY created_at DESC
             LIMIT $2
         ) m
         WHERE c.user_id = $1
         ORDER BY m.created_at DESC",
    )
    .bind(claims.sub)
    .bind(MESSAGES_PER_CHATBOT)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(rows.into_iter().map(MessageListItem::from).collect()))
}

async fn delete_owned_message(state: &AppState, id: Uuid, user_id: Uuid) -> ApiResult<StatusCode> {
    let result = sqlx::query(
        "DELETE FROM messages m
         USING chatbots c
         WHERE m.id = $1 AND m.chatbot_id = c.id AND c.user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .execute(&state.db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Message not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_message(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    delete_owned_message(&state, id, claims.sub).await
}

async fn delete_message_by_query(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<DeleteMessageQuery>,
) -> ApiResult<StatusCode> {
    let id = required_id(query.id.as_deref(), "Message ID")?;
    delete_owned_message(&state, id, claims.sub).await
}
