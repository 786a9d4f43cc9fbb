// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request authentication: bearer tokens and API keys in parallel.

use crate::error::ApiError;
use crate::state::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jf_core::Caller;
use jf_engine::ServiceError;

/// Header carrying an API-key plaintext.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extractor resolving the authenticated caller from either credential.
pub struct Authed(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for Authed {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(raw) = parts.headers.get(API_KEY_HEADER) {
            let plaintext = raw
                .to_str()
                .map_err(|_| ApiError(ServiceError::Unauthenticated))?;
            let caller = state.auth.verify_api_key(plaintext).await?;
            return Ok(Authed(caller));
        }

        if let Some(raw) = parts.headers.get(axum::http::header::AUTHORIZATION) {
            let value = raw
                .to_str()
                .map_err(|_| ApiError(ServiceError::Unauthenticated))?;
            let token = value
                .strip_prefix("Bearer ")
                .ok_or(ApiError(ServiceError::Unauthenticated))?;
            let caller = state.auth.verify_bearer(token).await?;
            return Ok(Authed(caller));
        }

        Err(ApiError(ServiceError::Unauthenticated))
    }
}
