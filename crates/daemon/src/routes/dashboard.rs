// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard aggregation endpoint.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use jf_engine::DashboardStats;

pub async fn stats(
    State(state): State<AppState>,
    Authed(caller): Authed,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.dashboard.stats(&caller).await?))
}
