// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow endpoints.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use jf_core::{
    Flow, FlowCreateRequest, FlowDeleteSummary, FlowId, JobId, JobState, ProgressUpdate,
};
use jf_engine::ServiceError;
use serde::Deserialize;
use serde_json::Value;

pub async fn create(
    State(state): State<AppState>,
    Authed(caller): Authed,
    Json(body): Json<FlowCreateRequest>,
) -> Result<(StatusCode, Json<Flow>), ApiError> {
    let flow = state.flows.create_flow(body, &caller).await?;
    Ok((StatusCode::CREATED, Json(flow)))
}

pub async fn list(
    State(state): State<AppState>,
    Authed(caller): Authed,
) -> Result<Json<Vec<Flow>>, ApiError> {
    Ok(Json(state.flows.flows(Some(caller.user_id)).await?))
}

/// Read-only flow lookup; no credential required.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Flow>, ApiError> {
    let id = FlowId::from_string(id);
    Ok(Json(state.flows.get_flow(&id).await?))
}

/// Body of a job progress report; the job id comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody {
    pub status: JobState,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress: Option<Value>,
    #[serde(default)]
    pub started_at: Option<u64>,
}

pub async fn report_progress(
    State(state): State<AppState>,
    Path((id, job_id)): Path<(String, String)>,
    Authed(caller): Authed,
    Json(body): Json<ReportBody>,
) -> Result<Json<Flow>, ApiError> {
    let id = FlowId::from_string(id);
    let flow = state.flows.get_flow(&id).await?;
    if flow.user_id != caller.user_id {
        return Err(ApiError(ServiceError::Forbidden));
    }
    let update = ProgressUpdate {
        job_id: JobId::from_string(job_id),
        status: body.status,
        job_name: body.job_name,
        queue_name: body.queue_name,
        result: body.result,
        error: body.error,
        progress: body.progress,
        started_at: body.started_at,
    };
    Ok(Json(state.flows.update_progress(&id, update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authed(caller): Authed,
) -> Result<Json<FlowDeleteSummary>, ApiError> {
    let id = FlowId::from_string(id);
    Ok(Json(state.flows.delete_flow(&id, &caller).await?))
}
