use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::middleware::auth::auth_middleware;
use crate::models::analytics::*;
use crate::models::auth::Claims;
use crate::services::analytics::{daily_series, AnalyticsPeriod};
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::{get, Router},
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

pub fn analytics_routes() -> Router {
    Router::new()
        .route("/api/analytics", get(get_analytics))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

async fn get_analytics(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> ApiResult<Json<AnalyticsResponse>> {
    let period = AnalyticsPeriod::parse(query.period.as_deref());
    let now = Utc::now();
    let since = period.start(now);
    let pool = &state.db_pool;

    let total_messages = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages m JOIN chatbots c ON c.id = m.chatbot_id
         WHERE c.user_id = $1 AND m.created_at >= $2",
    )
    .bind(claims.sub)
    .bind(since)
    .fetch_one(pool);

    let active_chatbots = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(DISTINCT m.chatbot_id) FROM messages m JOIN chatbots c ON c.id = m.chatbot_id
         WHERE c.user_id = $1 AND m.created_at >= $2",
    )
    .bind(claims.sub)
    .bind(since)
    .fetch_one(pool);

    let total_chatbots = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chatbots WHERE user_id = $1")
        .bind(claims.sub)
        .fetch_one(pool);

    let total_documents = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM documents d JOIN chatbots c ON c.id = d.chatbot_id WHERE c.user_id = $1",
    )
    .bind(claims.sub)
    .fetch_one(pool);

    let daily = sqlx::query_as::<_, (NaiveDate, i64)>(
        "SELECT (m.created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*)
         FROM messages m JOIN chatbots c ON c.id = m.chatbot_id
         WHERE c.user_id = $1 AND m.created_at >= $2
         GROUP BY day
         ORDER BY day",
    )
    .bind(claims.sub)
    .bind(since)
    .fetch_all(pool);

    let (total_messages, active_chatbots, total_chatbots, total_documents, daily) = futures::try_join!(
        total_messages,
        active_chatbots,
        total_chatbots,
        total_documents,
        daily
    )?;

    Ok(Json(AnalyticsResponse {
        period: period.as_str().to_string(),
        total_messages,
        active_chatbots,
        total_chatbots,
        total_documents,
        usage_trends: daily_series(since.date_naive(), now.date_naive(), &daily),
    }))
}
