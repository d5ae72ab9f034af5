use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::notifications::types::{Notification, NotificationDraft};
use crate::queue::error::ProducerError;

use super::middleware::check_api_key;
use super::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngestRequest {
    Many(Vec<NotificationDraft>),
    One(NotificationDraft),
}

impl IngestRequest {
    fn into_drafts(self) -> Vec<NotificationDraft> {
        match self {
            IngestRequest::Many(drafts) => drafts,
            IngestRequest::One(draft) => vec![draft],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

fn error_response(status: StatusCode, error: String, index: Option<usize>) -> Response {
    (status, Json(ErrorResponse { error, index })).into_response()
}

pub async fn ingest(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = check_api_key(&headers, state.server_config.auth.as_ref()) {
        return *response;
    }
    let request: IngestRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string(), None),
    };
    let drafts = request.into_drafts();
    if drafts.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no notifications".to_string(), None);
    }

    let mut notifications: Vec<Notification> = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.into_iter().enumerate() {
        match draft.into_notification() {
            Ok(notification) => notifications.push(notification),
            Err(err) => {
                return error_response(StatusCode::BAD_REQUEST, err.to_string(), Some(index));
            }
        }
    }
    let ids = notifications
        .iter()
        .map(|notification| notification.id.clone())
        .collect::<Vec<_>>();

    match state.ingestor.submit(notifications).await {
        Ok(()) => {
            tracing::info!(count = ids.len(), "notifications accepted");
            (StatusCode::ACCEPTED, Json(IngestResponse { ids })).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to enqueue notifications");
            let status = match err {
                ProducerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            error_response(status, err.to_string(), None)
        }
    }
}

pub async fn liveness() -> &'static str {
    "ok"
}

pub async fn readiness(State(state): State<AppState>) -> Response {
    let report = state.health.readiness().await;
    let status = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}
