//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::account::{
    change_password, delete_account, get_profile, login, logout, permissions, refresh, register,
    update_profile, user_stats, verify,
};
use crate::handlers::payment::{
    cancel_order, create_order, get_order, list_orders, plans, simulate_result, stats,
};
use crate::handlers::video::{cancel, download, formats, history, process, status};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", get(verify))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout));

    let user_routes = Router::new()
        .route("/user/profile", get(get_profile))
        .route("/user/profile", put(update_profile))
        .route("/user/password", put(change_password))
        .route("/user/permissions", get(permissions))
        .route("/user/stats", get(user_stats))
        .route("/user/account", delete(delete_account));

    let video_routes = Router::new()
        .route("/video/process", post(process))
        .route("/video/status/:task_id", get(status))
        .route("/video/download/:task_id", get(download))
        .route("/video/history", get(history))
        .route("/video/cancel/:task_id", delete(cancel))
        .route("/video/formats", get(formats));

    let payment_routes = Router::new()
        .route("/payment/plans", get(plans))
        .route("/payment/create-order", post(create_order))
        .route("/payment/simulate-result", post(simulate_result))
        .route("/payment/order/:order_id", get(get_order))
        .route("/payment/orders", get(list_orders))
        .route("/payment/cancel/:order_id", post(cancel_order))
        .route("/payment/stats", get(stats));

    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(user_routes)
        .merge(video_routes)
        .merge(payment_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Body limit keeps oversized uploads from ever reaching a handler.
        // The extractor-level default (2 MB) must be raised too, or
        // multipart reads fail long before the policy gate sees the file.
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
