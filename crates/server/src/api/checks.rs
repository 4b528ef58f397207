//! Check listing and inbound check-ins.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use deadcheck_schedule::{next_occurrence, ExpectedOccurrence};

use super::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub schedule: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<ExpectedOccurrence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every configured check with its next expected occurrence.
pub async fn list_checks(State(state): State<Arc<AppState>>) -> Json<Vec<CheckSummary>> {
    let now = state.clock.now();
    let summaries = state
        .checks
        .iter()
        .map(|check| {
            let definition = &check.definition;
            let (next, error) = match next_occurrence(now, &definition.schedule) {
                Ok((occurrence, _)) => (Some(occurrence), None),
                Err(e) => (None, Some(e.to_string())),
            };
            CheckSummary {
                id: definition.id.clone(),
                name: definition.name.clone(),
                description: definition.description.clone(),
                schedule: definition.schedule.kind(),
                timezone: definition.schedule.timezone().map(|tz| tz.name().to_string()),
                provider: check.orchestrator.provider_name().to_string(),
                next,
                error,
            }
        })
        .collect();
    Json(summaries)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub next_expected_check_in: DateTime<Utc>,
}

/// Record a check-in for `id` observed now.
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CheckInResponse>, ApiError> {
    let check = state.check(&id).ok_or_else(|| ApiError::UnknownCheck(id.clone()))?;
    let ctx = state.call_context();
    let next = check.orchestrator.check_in(&ctx, &check.definition).await?;
    Ok(Json(CheckInResponse {
        next_expected_check_in: next,
    }))
}
