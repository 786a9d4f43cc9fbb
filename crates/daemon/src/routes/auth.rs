// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication endpoints.

use crate::error::ApiError;
use crate::extract::Authed;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use jf_core::UserView;
use jf_engine::TokenPair;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let user = state
        .auth
        .register(&body.username, body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state.auth.login(&body.username, &body.password).await?;
    Ok(Json(tokens))
}

pub async fn logout(
    State(state): State<AppState>,
    Authed(caller): Authed,
) -> Result<Json<Value>, ApiError> {
    state.auth.logout(caller.user_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let access_token = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(json!({ "accessToken": access_token })))
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestBody {
    pub username: String,
}

/// Email delivery is out of scope; the reset token is returned directly.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequestBody>,
) -> Result<Json<Value>, ApiError> {
    let token = state.auth.request_password_reset(&body.username).await?;
    Ok(Json(json!({ "resetToken": token })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<Json<Value>, ApiError> {
    state.auth.reset_password(&body.token, &body.new_password).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn me(
    State(state): State<AppState>,
    Authed(caller): Authed,
) -> Result<Json<UserView>, ApiError> {
    Ok(Json(state.auth.me(&caller).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookUrlBody {
    pub webhook_url: Option<String>,
}

/// Legacy single webhook URL on the user row, still honored for `completed`
/// deliveries when no webhook records match.
pub async fn set_webhook_url(
    State(state): State<AppState>,
    Authed(caller): Authed,
    Json(body): Json<WebhookUrlBody>,
) -> Result<Json<UserView>, ApiError> {
    state.auth.set_webhook_url(&caller, body.webhook_url).await?;
    Ok(Json(state.auth.me(&caller).await?))
}
