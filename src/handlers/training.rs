use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::handlers::auth::current_user;
use crate::handlers::chatbots::{chatbot_documents, find_owned_chatbot, CHATBOT_COLUMNS};
use crate::handlers::required_id;
use crate::middleware::auth::auth_middleware;
use crate::models::auth::Claims;
use crate::models::chatbot::{validate_model_params, Chatbot};
use crate::models::training::*;
use crate::services::audit::{self, AuditEvent, RequestMeta};
use crate::services::training::{self, TrainingSnapshot};
use crate::AppState;
use axum::{
    extract::Extension,
    http::HeaderMap,
    response::Json,
    routing::{get, post, Router},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub fn training_routes() -> Router {
    Router::new()
        .route("/api/training", get(training_status).post(start_training))
        .route("/api/training/:chatbot_id/phase", post(training_phase))
        .route("/api/training/:chatbot_id/phase/cancel", post(cancel_training))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

async fn start_training(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<StartTrainingRequest>,
) -> ApiResult<Json<StartTrainingResponse>> {
    let chatbot_id = required_id(payload.chatbot_id.as_deref(), "chatbotId")?;
    if payload.documents.is_empty() {
        return Err(ApiError::BadRequest("At least one document is required".to_string()));
    }
    let config = &payload.model_config;
    validate_model_params(config.temperature, config.max_tokens).map_err(ApiError::BadRequest)?;

    let chatbot = find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;

    // Ids that are malformed or belong to another chatbot are ignored
    let requested: Vec<Uuid> = payload
        .documents
        .iter()
        .filter_map(|id| Uuid::parse_str(id.trim()).ok())
        .collect();
    let document_ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM documents WHERE chatbot_id = $1 AND id = ANY($2)",
    )
    .bind(chatbot.id)
    .bind(&requested)
    .fetch_all(&state.db_pool)
    .await?;

    if document_ids.is_empty() {
        return Err(ApiError::BadRequest("No valid documents found for this chatbot".to_string()));
    }

    let updated = sqlx::query_as::<_, Chatbot>(&format!(
        "UPDATE chatbots SET
            model = COALESCE($2, model),
            temperature = COALESCE($3, temperature),
            max_tokens = COALESCE($4, max_tokens),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        CHATBOT_COLUMNS
    ))
    .bind(chatbot.id)
    .bind(config.model.as_deref().map(str::trim).filter(|m| !m.is_empty()))
    .bind(config.temperature)
    .bind(config.max_tokens)
    .fetch_one(&state.db_pool)
    .await?;

    let job_id = training::job_id(Utc::now());
    let user = current_user(&state.db_pool, &claims).await?;
    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("START_TRAINING", user.id, user.organization_id, "chatbot", chatbot.id).with_details(
            serde_json::json!({
                "jobId": job_id,
                "documents": document_ids,
                "model": updated.model,
                "temperature": updated.temperature,
                "maxTokens": updated.max_tokens,
            }),
        ),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    tracing::info!(chatbot_id = %chatbot.id, job_id = %job_id, documents = document_ids.len(), "training started");

    Ok(Json(StartTrainingResponse {
        success: true,
        message: "Training started".to_string(),
        job_id,
    }))
}

async fn training_status(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<TrainingStatusQuery>,
) -> ApiResult<Json<TrainingStatus>> {
    let chatbot_id = required_id(query.chatbot_id.as_deref(), "chatbotId")?;
    let chatbot = find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;
    let documents = chatbot_documents(&state.db_pool, chatbot.id).await?;

    Ok(Json(TrainingStatus {
        chatbot_id: chatbot.id,
        documents_count: documents.len(),
        last_training_date: chatbot.updated_at,
        status: "ready",
        documents,
        name: chatbot.name,
        model: chatbot.model,
        temperature: chatbot.temperature,
        max_tokens: chatbot.max_tokens,
    }))
}

async fn training_phase(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiPath(chatbot_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<PhaseRequest>,
) -> ApiResult<Json<TrainingSnapshot>> {
    let chatbot = find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;

    let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE chatbot_id = $1")
        .bind(chatbot.id)
        .fetch_one(&state.db_pool)
        .await?;

    let snapshot = training::snapshot(
        chatbot.id,
        payload.phase.as_deref(),
        payload.progress,
        total_documents,
        training::random_training_speed(),
    );

    let user = current_user(&state.db_pool, &claims).await?;
    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("TRAINING_PROGRESS", user.id, user.organization_id, "chatbot", chatbot.id).with_details(
            serde_json::json!({
                "phase": snapshot.phase,
                "progress": snapshot.progress,
            }),
        ),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok(Json(snapshot))
}

async fn cancel_training(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiPath(chatbot_id): ApiPath<Uuid>,
) -> ApiResult<Json<CancelTrainingResponse>> {
    let chatbot = find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;

    let user = current_user(&state.db_pool, &claims).await?;
    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("CANCEL_TRAINING", user.id, user.organization_id, "chatbot", chatbot.id),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok(Json(CancelTrainingResponse {
        success: true,
        message: "Training cancelled".to_string(),
    }))
}
