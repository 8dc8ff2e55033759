//! Axum HTTP API server.
//!
//! This crate provides:
//! - Account registration/login with HS256 bearer tokens
//! - The asynchronous video processing surface
//! - The simulated payment flow
//! - Rate limiting, security headers, and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
