//! Admin push and presence handlers.
//!
//! Every response carries `success`; malformed input is answered with a
//! 400 and a short message instead of the extractor's error text. Bodies
//! over the size limit keep their 413.

use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::session::IdentityId;

/// Failure body for requests the gateway could not serve.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    }

    pub fn timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "Request timed out")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected admin request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::payload_too_large();
        }
        ApiError::bad_request("Request body must be a JSON document")
    }
}

/// Rewrite bodyless error responses from the limit and timeout layers into
/// `ApiError` bodies.
pub async fn structured_errors(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }
    match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::payload_too_large().into_response(),
        StatusCode::REQUEST_TIMEOUT => {
            tracing::warn!("Admin request timed out");
            ApiError::timeout().into_response()
        }
        _ => response,
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected admin request path");
        ApiError::bad_request("Invalid user id")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub success: bool,
    pub message: &'static str,
    pub success_count: usize,
    pub fail_count: usize,
    pub online_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub success: bool,
    pub message: &'static str,
    pub user_id: IdentityId,
    pub delivered: bool,
    pub online: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub user_ids: Vec<IdentityId>,
    #[serde(alias = "alertData")]
    pub data: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    pub message: &'static str,
    pub total_count: usize,
    pub success_count: usize,
    pub fail_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineCountResponse {
    pub success: bool,
    pub online_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatusResponse {
    pub success: bool,
    pub user_id: IdentityId,
    pub online: bool,
}

fn identity_from_path(raw: String) -> Result<IdentityId, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request("Invalid user id"));
    }
    Ok(IdentityId::from(raw))
}

/// `POST /api/push/broadcast`
pub async fn broadcast(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let start = Instant::now();
    let Json(payload) = payload?;

    let report = state.delivery.broadcast(&payload).await;
    tracing::info!(
        success_count = report.success_count,
        fail_count = report.fail_count,
        "Broadcast completed"
    );
    metrics::record_admin_request("broadcast", start);

    Ok(Json(BroadcastResponse {
        success: true,
        message: "Alert broadcast completed",
        success_count: report.success_count,
        fail_count: report.fail_count,
        online_count: state.registry.count(),
    }))
}

/// `POST /api/push/users/{identityId}`
pub async fn push_to_user(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PushResponse>, ApiError> {
    let start = Instant::now();
    let Path(raw) = path?;
    let identity_id = identity_from_path(raw)?;
    let Json(payload) = payload?;

    let delivered = state.delivery.push_to_one(&identity_id, &payload).await;
    let online = state.registry.is_live(&identity_id);
    tracing::info!(identity_id = %identity_id, delivered, online, "Push to user completed");
    metrics::record_admin_request("push_user", start);

    Ok(Json(PushResponse {
        success: delivered,
        message: if delivered {
            "Alert delivered"
        } else {
            "User offline or delivery failed"
        },
        user_id: identity_id,
        delivered,
        online,
    }))
}

/// `POST /api/push/batch`
pub async fn push_batch(
    State(state): State<AppState>,
    request: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let start = Instant::now();
    let Json(request) = request?;

    let total_count = request.user_ids.len();
    let success_count = state
        .delivery
        .push_to_many(&request.user_ids, &request.data)
        .await;
    tracing::info!(total_count, success_count, "Batch push completed");
    metrics::record_admin_request("push_batch", start);

    Ok(Json(BatchResponse {
        success: true,
        message: "Batch push completed",
        total_count,
        success_count,
        fail_count: total_count - success_count,
    }))
}

/// `GET /api/online/count`
pub async fn online_count(State(state): State<AppState>) -> Json<OnlineCountResponse> {
    Json(OnlineCountResponse {
        success: true,
        online_count: state.registry.count(),
    })
}

/// `GET /api/online/{identityId}`
pub async fn online_status(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<OnlineStatusResponse>, ApiError> {
    let Path(raw) = path?;
    let identity_id = identity_from_path(raw)?;
    let online = state.registry.is_live(&identity_id);
    tracing::debug!(identity_id = %identity_id, online, "Presence check");

    Ok(Json(OnlineStatusResponse {
        success: true,
        user_id: identity_id,
        online,
    }))
}
