// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook subscription endpoints.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use jf_core::{Webhook, WebhookEventType, WebhookId};
use jf_engine::CreateWebhookRequest;
use jf_storage::WebhookPatch;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn create(
    State(state): State<AppState>,
    Authed(caller): Authed,
    Json(body): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<Webhook>), ApiError> {
    let hook = state.webhooks.create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(hook)))
}

pub async fn list(
    State(state): State<AppState>,
    Authed(caller): Authed,
) -> Result<Json<Vec<Webhook>>, ApiError> {
    Ok(Json(state.webhooks.list(&caller).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authed(caller): Authed,
) -> Result<Json<Webhook>, ApiError> {
    let id = WebhookId::from_string(id);
    Ok(Json(state.webhooks.get(&caller, &id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebhookRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub event_type: Option<WebhookEventType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authed(caller): Authed,
    Json(body): Json<UpdateWebhookRequest>,
) -> Result<Json<Webhook>, ApiError> {
    let id = WebhookId::from_string(id);
    let patch = WebhookPatch {
        url: body.url,
        event_type: body.event_type,
        description: body.description,
        active: body.active,
    };
    Ok(Json(state.webhooks.update(&caller, &id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authed(caller): Authed,
) -> Result<Json<Value>, ApiError> {
    let id = WebhookId::from_string(id);
    state.webhooks.delete(&caller, &id).await?;
    Ok(Json(json!({ "deleted": true })))
}
