// lib.rs - application state, route assembly and module exports
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;

use axum::{Extension, Router};
use config::Config;
use error::{ApiError, ApiResult};
use services::{LlmClient, ObjectStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// Shared state: database pool, optional LLM client, optional object store, outbound HTTP client
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub config: Config,
    pub llm_client: Option<LlmClient>,
    pub storage: Option<Arc<dyn ObjectStore>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn llm(&self) -> ApiResult<&LlmClient> {
        self.llm_client
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OpenAI API key not configured".to_string()))
    }

    pub fn storage(&self) -> ApiResult<&dyn ObjectStore> {
        self.storage
            .as_deref()
            .ok_or_else(|| ApiError::Internal("Object storage not configured".to_string()))
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::auth::auth_routes())
        .merge(handlers::chatbots::chatbot_routes())
        .merge(handlers::documents::document_routes())
        .merge(handlers::chat::chat_routes())
        .merge(handlers::messages::message_routes())
        .merge(handlers::analytics::analytics_routes())
        .merge(handlers::audit_logs::audit_log_routes())
        .merge(handlers::rbac::rbac_routes())
        .merge(handlers::team::team_routes())
        .merge(handlers::billing::billing_routes())
        .merge(handlers::training::training_routes())
        .merge(handlers::status::status_routes())
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_body, test_state, token_for};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn protected_route_requires_token() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(Request::get("/api/chatbots").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(
                Request::get("/api/documents")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn admin_routes_reject_guests() {
        let state = test_state(None);
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::get("/api/roles")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn login_requires_email_and_password() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":"","password":"secret1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "Email and password are required");
    }

    #[tokio::test]
    async fn signup_rejects_short_passwords() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(
                Request::post("/api/auth/signup")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":"a@b.co","password":"123"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_without_llm_reports_missing_key() {
        let state = test_state(None);
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::post("/api/chat")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(
                        r#"{{"message":"hi","chatbotId":"{}"}}"#,
                        Uuid::new_v4()
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["message"], "OpenAI API key not configured");
    }

    #[tokio::test]
    async fn chat_rejects_empty_message() {
        let state = test_state(Some(LlmClient::new("sk-test".into(), "http://127.0.0.1:1".into())));
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::post("/api/chat")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"message":"   ","chatbotId":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_reports_component_health() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], false);
        assert_eq!(body["llm"], false);
        assert_eq!(body["storage"], false);
    }

    #[tokio::test]
    async fn missing_message_id_is_a_bad_request() {
        let state = test_state(None);
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::delete("/api/messages")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_path_id_gets_json_error() {
        let state = test_state(None);
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::delete("/api/chatbots/not-a-uuid")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("UUID"));
    }

    #[tokio::test]
    async fn malformed_json_body_gets_json_error() {
        let state = test_state(None);
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::post("/api/chatbots")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{bad"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn missing_body_field_is_a_bad_request() {
        let state = test_state(None);
        let token = token_for(&state, "Admin");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::delete("/api/roles")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Serde failures report 400, never axum's 422
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("id"));
    }

    #[tokio::test]
    async fn malformed_query_gets_json_error() {
        let state = test_state(None);
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::delete("/api/messages?id=a&id=b")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn only_admins_remove_team_members() {
        let state = test_state(None);
        let token = token_for(&state, "Guest");
        let app = build_router(state);
        let response = app
            .oneshot(
                Request::delete(format!("/api/team/members/{}", Uuid::new_v4()))
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["message"], "Only admins can remove team members");
    }
}
