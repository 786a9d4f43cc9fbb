// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API-key endpoints. The plaintext appears exactly once, in the creation
//! response.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use jf_core::{ApiKey, ApiKeyId};
use jf_engine::{CreateApiKeyRequest, CreatedApiKey};
use jf_storage::ApiKeyPatch;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn create(
    State(state): State<AppState>,
    Authed(caller): Authed,
    Json(body): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreatedApiKey>), ApiError> {
    let created = state.auth.create_api_key(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
    State(state): State<AppState>,
    Authed(caller): Authed,
) -> Result<Json<Vec<ApiKey>>, ApiError> {
    Ok(Json(state.auth.list_api_keys(&caller).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authed(caller): Authed,
) -> Result<Json<ApiKey>, ApiError> {
    let id = ApiKeyId::from_string(id);
    Ok(Json(state.auth.get_api_key(&caller, &id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApiKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authed(caller): Authed,
    Json(body): Json<UpdateApiKeyRequest>,
) -> Result<Json<ApiKey>, ApiError> {
    let id = ApiKeyId::from_string(id);
    let patch = ApiKeyPatch {
        name: body.name,
        permissions: body.permissions,
        is_active: body.is_active,
    };
    Ok(Json(state.auth.update_api_key(&caller, &id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authed(caller): Authed,
) -> Result<Json<Value>, ApiError> {
    let id = ApiKeyId::from_string(id);
    state.auth.delete_api_key(&caller, &id).await?;
    Ok(Json(json!({ "deleted": true })))
}
