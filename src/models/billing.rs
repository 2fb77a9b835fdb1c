use crate::config::BillingConfig;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub status: String,
    pub current_period_end: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub plan: String,
    pub status: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub current_period_end: Option<chrono::DateTime<chrono::Utc>>,
}

impl SubscriptionResponse {
    pub fn free() -> Self {
        SubscriptionResponse {
            plan: "free".to_string(),
            status: "inactive".to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_price_id: None,
            current_period_end: None,
        }
    }

    pub fn from_subscription(sub: Subscription, billing: &BillingConfig) -> Self {
        let plan = plan_for_price(sub.stripe_price_id.as_deref(), billing);
        SubscriptionResponse {
            plan: plan.to_string(),
            status: sub.status,
            stripe_customer_id: sub.stripe_customer_id,
            stripe_subscription_id: sub.stripe_subscription_id,
            stripe_price_id: sub.stripe_price_id,
            current_period_end: sub.current_period_end,
        }
    }
}

fn plan_for_price(price_id: Option<&str>, billing: &BillingConfig) -> &'static str {
    match price_id {
        Some(p) if billing.pro_price_id.as_deref() == Some(p) => "pro",
        Some(p) if billing.enterprise_price_id.as_deref() == Some(p) => "enterprise",
        _ => "free",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_id: Option<String>,
}

pub fn plan_catalogue(billing: &BillingConfig) -> Vec<Plan> {
    vec![
        Plan {
            id: "pro",
            name: "Pro",
            description: "For growing teams with more chatbots and documents",
            price_id: billing.pro_price_id.clone(),
        },
        Plan {
            id: "enterprise",
            name: "Enterprise",
            description: "Unlimited chatbots with priority support",
            price_id: billing.enterprise_price_id.clone(),
        },
    ]
}
