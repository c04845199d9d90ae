//! Administrative push API.
//!
//! Thin translation layer: HTTP/JSON requests become delivery engine and
//! registry calls. Mounted on the main listener or on its own bind address.
//!
//! The `/api/alert/*` and `/rpc/ws/*` routes are aliases kept for callers
//! of the older alert service; they share handlers and bodies with
//! `/api/push/*` and `/api/online/*`.

pub mod auth;
pub mod handlers;

use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::GatewayConfig;
use crate::http::server::AppState;

pub fn setup_admin_router(config: &GatewayConfig, state: AppState) -> Router {
    Router::new()
        .route("/api/push/broadcast", post(broadcast))
        .route("/api/push/batch", post(push_batch))
        .route("/api/push/users/{identity_id}", post(push_to_user))
        .route("/api/online/count", get(online_count))
        .route("/api/online/{identity_id}", get(online_status))
        // legacy aliases
        .route("/api/alert/broadcast", post(broadcast))
        .route("/api/alert/push/batch", post(push_batch))
        .route("/api/alert/push/{identity_id}", post(push_to_user))
        .route("/api/alert/online/count", get(online_count))
        .route("/api/alert/online/check/{identity_id}", get(online_status))
        .route("/rpc/ws/broadcast", post(broadcast))
        .route("/rpc/ws/push/batch", post(push_batch))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(RequestBodyLimitLayer::new(config.admin.max_body_size))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.timeouts.request_secs),
        ))
        .layer(middleware::map_response(structured_errors))
        .with_state(state)
}
