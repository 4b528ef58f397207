//! HTTP endpoints.
//!
//! Shared error mapping lives here; handlers live in the sub-modules.

mod checks;
mod health;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use deadcheck_monitor::MonitorError;
use deadcheck_schedule::OutOfToleranceError;

pub use checks::{check_in, list_checks};
pub use health::health;

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    UnknownCheck(String),
    Monitor(MonitorError),
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        ApiError::Monitor(e)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub retryable: bool,
    #[serde(flatten)]
    pub tolerance: Option<ToleranceDetails>,
}

/// How far outside its window a rejected check-in landed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleranceDetails {
    pub expected: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub observed: DateTime<Utc>,
    pub delta_seconds: i64,
}

impl From<&OutOfToleranceError> for ToleranceDetails {
    fn from(e: &OutOfToleranceError) -> Self {
        Self {
            expected: e.expected,
            window_start: e.window_start,
            window_end: e.window_end,
            observed: e.observed,
            delta_seconds: e.delta.num_seconds(),
        }
    }
}

fn status_for(e: &MonitorError) -> StatusCode {
    match e {
        MonitorError::OutOfTolerance { .. } => StatusCode::BAD_REQUEST,
        MonitorError::InvalidSchedule { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MonitorError::ProviderUnavailable { .. } => StatusCode::BAD_GATEWAY,
        MonitorError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MonitorError::PolicyNotFound { .. } | MonitorError::MissingAlert { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::UnknownCheck(id) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: format!("unknown check '{id}'"),
                    check_id: Some(id),
                    stage: None,
                    retryable: false,
                    tolerance: None,
                },
            ),
            ApiError::Monitor(e) => {
                let tolerance = match &e {
                    MonitorError::OutOfTolerance { source, .. } => Some(ToleranceDetails::from(source)),
                    _ => None,
                };
                (
                    status_for(&e),
                    ErrorResponse {
                        error: e.to_string(),
                        check_id: Some(e.check_id().to_string()),
                        stage: e.stage().map(|s| s.to_string()),
                        retryable: e.is_retryable(),
                        tolerance,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
