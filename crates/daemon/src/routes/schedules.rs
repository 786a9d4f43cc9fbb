// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring-schedule endpoints, nested under `/jobs/{queue}/schedule`.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use jf_core::{ScheduleRecord, SchedulerKey};
use jf_engine::{ScheduleSubmission, ServiceError};
use serde_json::{json, Value};

pub async fn create(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Authed(caller): Authed,
    Json(body): Json<ScheduleSubmission>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let key = state.scheduler.schedule(&queue, body, &caller).await?;
    Ok((StatusCode::CREATED, Json(json!({ "schedulerId": key }))))
}

pub async fn list(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Authed(caller): Authed,
) -> Result<Json<Vec<ScheduleRecord>>, ApiError> {
    Ok(Json(state.scheduler.list_for_user(&queue, &caller).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((queue, id)): Path<(String, String)>,
    Authed(caller): Authed,
) -> Result<Json<ScheduleRecord>, ApiError> {
    let key = SchedulerKey::from_string(id);
    let record = state
        .scheduler
        .get(&queue, &key, &caller)
        .await?
        .ok_or(ApiError(ServiceError::NotFound("schedule")))?;
    Ok(Json(record))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((queue, id)): Path<(String, String)>,
    Authed(caller): Authed,
) -> Result<Json<Value>, ApiError> {
    let key = SchedulerKey::from_string(id);
    let removed = state.scheduler.remove(&queue, &key, &caller).await?;
    Ok(Json(json!({ "removed": removed })))
}
