// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job endpoints.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use jf_core::{JobId, JobView};
use jf_engine::{JobPage, ListQuery};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub opts: Option<Value>,
}

pub async fn submit(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Authed(caller): Authed,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let job_id = state
        .jobs
        .submit(&queue, &body.name, body.data, body.opts, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "jobId": job_id }))))
}

pub async fn list(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Authed(caller): Authed,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobPage>, ApiError> {
    Ok(Json(state.jobs.list(&queue, &caller, &query).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((queue, id)): Path<(String, String)>,
    Authed(caller): Authed,
) -> Result<Json<JobView>, ApiError> {
    let id = JobId::from_string(id);
    Ok(Json(state.jobs.get(&queue, &id, &caller).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((queue, id)): Path<(String, String)>,
    Authed(caller): Authed,
) -> Result<Json<Value>, ApiError> {
    let id = JobId::from_string(id);
    state.jobs.delete(&queue, &id, &caller).await?;
    Ok(Json(json!({ "deleted": true })))
}
