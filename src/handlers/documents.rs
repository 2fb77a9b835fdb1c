use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiMultipart, ApiPath};
use crate::handlers::auth::current_user;
use crate::handlers::chatbots::{find_owned_chatbot, DOCUMENT_COLUMNS};
use crate::handlers::required_id;
use crate::middleware::auth::auth_middleware;
use crate::models::auth::Claims;
use crate::models::document::*;
use crate::services::audit::{self, AuditEvent, RequestMeta};
use crate::services::storage::{generate_object_key, object_key_from_url};
use crate::services::web_import::{self, ImportError};
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, Router},
};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
// Leaves room for multipart framing and the chatbotId field
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 2 * 1024 * 1024;

pub fn document_routes() -> Router {
    let uploads = Router::new()
        .route("/api/documents/upload", post(upload_document))
        .route("/api/upload", post(upload_document))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/api/documents", get(list_documents))
        .route("/api/documents/:id", delete(delete_document))
        .route("/api/documents/import/website", post(import_website))
        .route("/api/documents/import/api", post(import_api))
        .merge(uploads)
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

#[derive(Debug, FromRow)]
struct OwnedDocument {
    #[sqlx(flatten)]
    document: Document,
    owner_id: Uuid,
}

/// Content type sent with the part, else guessed from the extension.
pub fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() => ct.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Uploads `body` and records the document row pointing at it.
async fn store_document(
    state: &AppState,
    chatbot_id: Uuid,
    name: &str,
    object_name: &str,
    content_type: &str,
    body: Vec<u8>,
) -> ApiResult<Document> {
    let storage = state.storage()?;
    let id = Uuid::new_v4();
    let key = generate_object_key(id, object_name);
    let size = body.len() as i64;

    storage.put_object(&key, body, content_type).await?;

    let document = sqlx::query_as::<_, Document>(&format!(
        "INSERT INTO documents (id, name, content_type, size, url, chatbot_id)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {}",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .bind(name)
    .bind(content_type)
    .bind(size)
    .bind(storage.public_url(&key))
    .bind(chatbot_id)
    .fetch_one(&state.db_pool)
    .await?;

    tracing::info!(document_id = %document.id, chatbot_id = %chatbot_id, size, "document stored");
    Ok(document)
}

async fn list_documents(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<DocumentWithChatbot>>> {
    let documents = sqlx::query_as::<_, DocumentWithChatbot>(
        "SELECT d.id, d.name, d.content_type, d.size, d.url, d.chatbot_id, d.created_at, d.updated_at,
                c.name AS chatbot_name
         FROM documents d
         JOIN chatbots c ON c.id = d.chatbot_id
         WHERE c.user_id = $1
         ORDER BY d.created_at DESC",
    )
    .bind(claims.sub)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(documents))
}

async fn upload_document(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut chatbot_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                if data.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::BadRequest("File size exceeds 10MB limit".to_string()));
                }
                file = Some((file_name, content_type, data.to_vec()));
            }
            Some("chatbotId") => {
                chatbot_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Invalid chatbotId: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let chatbot_id = chatbot_id.filter(|id| !id.trim().is_empty());
    let (Some((file_name, declared_type, data)), Some(raw_id)) = (file, chatbot_id) else {
        return Err(ApiError::BadRequest("File and chatbotId are required".to_string()));
    };
    let chatbot_id = required_id(Some(&raw_id), "chatbotId")?;
    state.storage()?;

    find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;

    let content_type = resolve_content_type(declared_type.as_deref(), &file_name);
    let document = store_document(&state, chatbot_id, &file_name, &file_name, &content_type, data).await?;

    Ok((StatusCode::CREATED, Json(document)))
}

async fn delete_document(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<DeleteDocumentResponse>> {
    let owned = sqlx::query_as::<_, OwnedDocument>(
        "SELECT d.id, d.name, d.content_type, d.size, d.url, d.chatbot_id, d.created_at, d.updated_at,
                c.user_id AS owner_id
         FROM documents d
         JOIN chatbots c ON c.id = d.chatbot_id
         WHERE d.id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    if owned.owner_id != claims.sub {
        return Err(ApiError::Forbidden("Not authorized to delete this document".to_string()));
    }

    // Row deletion proceeds even if the object cannot be removed
    match (state.storage.as_ref(), object_key_from_url(&owned.document.url)) {
        (Some(storage), Some(key)) => {
            if let Err(e) = storage.delete_object(&key).await {
                tracing::warn!(document_id = %id, key = %key, "failed to delete stored object: {}", e);
            }
        }
        (None, _) => tracing::warn!(document_id = %id, "object storage not configured, skipping object delete"),
        (_, None) => tracing::warn!(document_id = %id, url = %owned.document.url, "could not derive object key"),
    }

    sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(&state.db_pool)
        .await?;

    let user = current_user(&state.db_pool, &claims).await?;
    audit::record_best_effort(
        &state.db_pool,
        AuditEvent::new("DELETE_DOCUMENT", user.id, user.organization_id, "document", id)
            .with_details(serde_json::json!({ "name": owned.document.name })),
        &RequestMeta::from_headers(&headers),
    )
    .await;

    Ok(Json(DeleteDocumentResponse { success: true }))
}

async fn import_website(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<WebsiteImportRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let raw_url = payload
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL is required".to_string()))?;
    let url = web_import::validate_http_url(raw_url)
        .map_err(|_| ApiError::BadRequest("Invalid URL".to_string()))?;
    let chatbot_id = required_id(payload.chatbot_id.as_deref(), "chatbotId")?;

    state.storage()?;
    find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;

    let html = web_import::fetch_html(&state.http_client, &url).await.map_err(|e| {
        tracing::warn!(url = %url, "website import failed: {}", e);
        ApiError::BadRequest("Failed to fetch website content".to_string())
    })?;

    let text = web_import::extract_visible_text(&html);
    let host = web_import::host_of(&url);
    let name = custom_or(payload.custom_name.as_deref(), || format!("Website Import: {}", host));

    let document = store_document(
        &state,
        chatbot_id,
        &name,
        &format!("{}.txt", host),
        "text/plain",
        text.into_bytes(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

async fn import_api(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<ApiImportRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let raw_endpoint = payload
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Endpoint is required".to_string()))?;
    let url = web_import::validate_http_url(raw_endpoint)
        .map_err(|_| ApiError::BadRequest("Invalid endpoint URL".to_string()))?;
    let method = web_import::parse_method(payload.method.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let chatbot_id = required_id(payload.chatbot_id.as_deref(), "chatbotId")?;

    state.storage()?;
    find_owned_chatbot(&state.db_pool, chatbot_id, claims.sub).await?;

    let data = web_import::fetch_json(&state.http_client, &url, method, &payload.headers)
        .await
        .map_err(|e| match e {
            ImportError::InvalidHeader(_) => ApiError::BadRequest(e.to_string()),
            other => {
                tracing::warn!(url = %url, "api import failed: {}", other);
                ApiError::BadGateway(format!("Failed to fetch API data: {}", other))
            }
        })?;

    let body = serde_json::to_string_pretty(&data)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize API data: {}", e)))?;
    let host = web_import::host_of(&url);
    let name = custom_or(payload.custom_name.as_deref(), || format!("API Import: {}", host));

    let document = store_document(
        &state,
        chatbot_id,
        &name,
        &format!("{}.json", host),
        "application/json",
        body.into_bytes(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

fn custom_or(custom: Option<&str>, default: impl FnOnce() -> String) -> String {
    custom
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default)
}
