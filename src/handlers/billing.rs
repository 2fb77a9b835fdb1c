use crate::error::ApiResult;
use crate::middleware::auth::auth_middleware;
use crate::models::auth::Claims;
use crate::models::billing::*;
use crate::AppState;
use axum::{
    extract::Extension,
    response::Json,
    routing::{get, Router},
};
use std::sync::Arc;

pub fn billing_routes() -> Router {
    Router::new()
        .route("/api/billing/subscription", get(get_subscription))
        .route("/api/billing/plans", get(list_plans))
        .route_layer(axum::middleware::from_fn(auth_middleware))
}

async fn get_subscription(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let subscription = sqlx::query_as::<_, Subscription>(
        "SELECT id, user_id, stripe_customer_id, stripe_subscription_id, stripe_price_id,
                status, current_period_end, created_at, updated_at
         FROM subscriptions WHERE user_id = $1",
    )
    .bind(claims.sub)
    .fetch_optional(&state.db_pool)
    .await?;

    Ok(Json(match subscription {
        Some(sub) => SubscriptionResponse::from_subscription(sub, &state.config.billing),
        None => SubscriptionResponse::free(),
    }))
}

async fn list_plans(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<Plan>> {
    Json(plan_catalogue(&state.config.billing))
}
