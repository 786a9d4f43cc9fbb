// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP router. Handlers are thin adapters between the wire shapes and the
//! services; every authenticated route resolves the caller through the
//! [`Authed`](crate::extract::Authed) extractor.

mod api_keys;
mod auth;
mod dashboard;
mod flows;
mod jobs;
mod queues;
mod schedules;
mod webhooks;

use crate::push;
use crate::state::AppState;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/auth/request-password-reset", post(auth::request_password_reset))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/me", get(auth::me))
        .route("/auth/webhook-url", put(auth::set_webhook_url))
        .route("/queues", get(queues::list))
        .route("/jobs/:queue/submit", post(jobs::submit))
        .route("/jobs/:queue", get(jobs::list))
        .route("/jobs/:queue/job/:id", get(jobs::get).delete(jobs::delete))
        .route("/jobs/:queue/schedule", post(schedules::create).get(schedules::list))
        .route(
            "/jobs/:queue/schedule/:id",
            get(schedules::get).delete(schedules::delete),
        )
        .route("/flows", post(flows::create).get(flows::list))
        .route("/flows/:id", get(flows::get).delete(flows::delete))
        .route("/flows/:id/jobs/:job_id", put(flows::report_progress))
        .route("/webhooks", post(webhooks::create).get(webhooks::list))
        .route(
            "/webhooks/:id",
            get(webhooks::get).put(webhooks::update).delete(webhooks::delete),
        )
        .route("/api-keys", post(api_keys::create).get(api_keys::list))
        .route(
            "/api-keys/:id",
            get(api_keys::get).put(api_keys::update).delete(api_keys::delete),
        )
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/ws", get(push::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "../routes_tests.rs"]
mod tests;
