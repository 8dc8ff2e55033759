//! Payment and subscription handlers.
//!
//! The gateway is simulated: order creation returns a fake payment URL
//! and `simulate-result` stands in for the gateway callback. A real
//! deployment would replace that endpoint with a signed webhook.

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vscrub_models::{catalog, Order, Plan, SettleOutcome};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PlansResponse {
    pub subscriptions: Vec<Plan>,
    pub credit_packs: Vec<Plan>,
}

/// `GET /api/payment/plans` (public)
pub async fn plans() -> Json<PlansResponse> {
    let (credit_packs, subscriptions) =
        catalog().iter().cloned().partition(Plan::is_credits);
    Json(PlansResponse {
        subscriptions,
        credit_packs,
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub plan_id: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

fn default_payment_method() -> String {
    "alipay".to_string()
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Simulated gateway URL; settling goes through `simulate-result`.
    pub payment_url: String,
    pub amount: u64,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /api/payment/create-order`
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<CreateOrderResponse>)> {
    let order = state
        .ledger
        .create_order(&auth.user_id, &req.plan_id, &req.payment_method)
        .await?;

    let response = CreateOrderResponse {
        payment_url: format!("/api/payment/simulate-result?order_id={}", order.id),
        order_id: order.id.as_str().to_string(),
        amount: order.amount,
        currency: order.currency,
        expires_at: order.expires_at,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct SimulateResultRequest {
    pub order_id: String,
    pub result: SettleOutcome,
}

/// `POST /api/payment/simulate-result`
///
/// Unauthenticated, like the gateway callback it stands in for.
pub async fn simulate_result(
    State(state): State<AppState>,
    Json(req): Json<SimulateResultRequest>,
) -> ApiResult<Json<Order>> {
    let order = state.ledger.settle(&req.order_id, req.result).await?;
    Ok(Json(order))
}

/// `GET /api/payment/order/:order_id`
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    UrlPath(order_id): UrlPath<String>,
) -> ApiResult<Json<Order>> {
    let order = state.ledger.get(&order_id, &auth.user_id).await?;
    Ok(Json(order))
}

/// `GET /api/payment/orders`
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.ledger.orders_for_user(&auth.user_id).await))
}

/// `POST /api/payment/cancel/:order_id`
pub async fn cancel_order(
    State(state): State<AppState>,
    auth: AuthUser,
    UrlPath(order_id): UrlPath<String>,
) -> ApiResult<Json<Order>> {
    let order = state.ledger.cancel_order(&order_id, &auth.user_id).await?;
    Ok(Json(order))
}

#[derive(Serialize)]
pub struct PaymentStatsResponse {
    pub plan_tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_end: Option<DateTime<Utc>>,
    pub credits: u64,
    pub total_orders: usize,
    pub paid_orders: usize,
    pub total_spent: u64,
}

/// `GET /api/payment/stats`
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<PaymentStatsResponse>> {
    let user = state.current_user(&auth.user_id).await?;
    let stats = state.ledger.stats(&auth.user_id).await;

    Ok(Json(PaymentStatsResponse {
        plan_tier: user.plan_tier.as_str().to_string(),
        subscription_end: user.subscription_end,
        credits: user.credits,
        total_orders: stats.total_orders,
        paid_orders: stats.paid_orders,
        total_spent: stats.total_spent,
    }))
}
