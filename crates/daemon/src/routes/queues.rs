// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue listing.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

pub async fn list(
    State(state): State<AppState>,
    Authed(_caller): Authed,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({ "queues": state.registry.queue_names() })))
}
