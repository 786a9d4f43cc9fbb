// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook subscription CRUD, scoped to the caller.

use crate::error::ServiceError;
use jf_core::{Caller, Clock, Webhook, WebhookEventType, WebhookId};
use jf_storage::{WebhookPatch, WebhookStore};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookRequest {
    pub url: String,
    pub event_type: WebhookEventType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub struct WebhookService<C: Clock> {
    store: Arc<dyn WebhookStore>,
    clock: C,
}

impl<C: Clock> WebhookService<C> {
    pub fn new(store: Arc<dyn WebhookStore>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Register a webhook. `(user, url, eventType)` must be unique.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateWebhookRequest,
    ) -> Result<Webhook, ServiceError> {
        if request.url.trim().is_empty() {
            return Err(ServiceError::validation("webhook url must not be empty"));
        }
        let now = self.clock.now_utc();
        let hook = Webhook {
            id: WebhookId::new(),
            user_id: caller.user_id,
            url: request.url,
            event_type: request.event_type,
            description: request.description,
            active: request.active,
            created_at: now,
            updated_at: now,
        };
        Ok(self.store.insert(hook).await?)
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<Webhook>, ServiceError> {
        Ok(self.store.list(caller.user_id).await?)
    }

    pub async fn get(&self, caller: &Caller, id: &WebhookId) -> Result<Webhook, ServiceError> {
        self.store
            .get(caller.user_id, id)
            .await?
            .ok_or(ServiceError::NotFound("webhook"))
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: &WebhookId,
        patch: WebhookPatch,
    ) -> Result<Webhook, ServiceError> {
        self.store
            .update(caller.user_id, id, patch, self.clock.now_utc())
            .await?
            .ok_or(ServiceError::NotFound("webhook"))
    }

    pub async fn delete(&self, caller: &Caller, id: &WebhookId) -> Result<(), ServiceError> {
        if !self.store.delete(caller.user_id, id).await? {
            return Err(ServiceError::NotFound("webhook"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;
