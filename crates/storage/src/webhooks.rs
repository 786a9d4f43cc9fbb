// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook persistence.

use crate::error::{map_constraint, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jf_core::{QueueEventKind, UserId, Webhook, WebhookEventType, WebhookId};
use sqlx::PgPool;

/// Mutable fields on a webhook.
#[derive(Debug, Clone, Default)]
pub struct WebhookPatch {
    pub url: Option<String>,
    pub event_type: Option<WebhookEventType>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Insert a webhook. A duplicate `(user, url, event_type)` is a
    /// [`StorageError::Conflict`].
    async fn insert(&self, hook: Webhook) -> Result<Webhook, StorageError>;

    async fn list(&self, user: UserId) -> Result<Vec<Webhook>, StorageError>;

    async fn get(&self, user: UserId, id: &WebhookId) -> Result<Option<Webhook>, StorageError>;

    async fn update(
        &self,
        user: UserId,
        id: &WebhookId,
        patch: WebhookPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Webhook>, StorageError>;

    async fn delete(&self, user: UserId, id: &WebhookId) -> Result<bool, StorageError>;

    /// Active webhooks of a user matching a delivery kind (or subscribed to
    /// everything).
    async fn for_event(
        &self,
        user: UserId,
        kind: QueueEventKind,
    ) -> Result<Vec<Webhook>, StorageError>;
}

fn event_type_to_str(event_type: WebhookEventType) -> String {
    event_type.to_string()
}

fn event_type_from_str(raw: &str) -> Result<WebhookEventType, StorageError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| StorageError::Corrupt(format!("unknown webhook event type {raw:?}")))
}

#[derive(sqlx::FromRow)]
struct WebhookRow {
    id: String,
    user_id: i64,
    url: String,
    event_type: String,
    description: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookRow> for Webhook {
    type Error = StorageError;

    fn try_from(row: WebhookRow) -> Result<Self, StorageError> {
        Ok(Webhook {
            id: WebhookId::from_string(row.id),
            user_id: UserId(row.user_id as u64),
            url: row.url,
            event_type: event_type_from_str(&row.event_type)?,
            description: row.description,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed webhook store.
pub struct PgWebhookStore {
    pool: PgPool,
}

impl PgWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookStore for PgWebhookStore {
    async fn insert(&self, hook: Webhook) -> Result<Webhook, StorageError> {
        let row: WebhookRow = sqlx::query_as(
            "INSERT INTO webhooks \
             (id, user_id, url, event_type, description, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(hook.id.as_str())
        .bind(hook.user_id.as_u64() as i64)
        .bind(&hook.url)
        .bind(event_type_to_str(hook.event_type))
        .bind(&hook.description)
        .bind(hook.active)
        .bind(hook.created_at)
        .bind(hook.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "webhook"))?;
        row.try_into()
    }

    async fn list(&self, user: UserId) -> Result<Vec<Webhook>, StorageError> {
        let rows: Vec<WebhookRow> =
            sqlx::query_as("SELECT * FROM webhooks WHERE user_id = $1 ORDER BY created_at")
                .bind(user.as_u64() as i64)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get(&self, user: UserId, id: &WebhookId) -> Result<Option<Webhook>, StorageError> {
        let row: Option<WebhookRow> =
            sqlx::query_as("SELECT * FROM webhooks WHERE id = $1 AND user_id = $2")
                .bind(id.as_str())
                .bind(user.as_u64() as i64)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(
        &self,
        user: UserId,
        id: &WebhookId,
        patch: WebhookPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Webhook>, StorageError> {
        let row: Option<WebhookRow> = sqlx::query_as(
            "UPDATE webhooks SET \
             url = COALESCE($3, url), \
             event_type = COALESCE($4, event_type), \
             description = COALESCE($5, description), \
             active = COALESCE($6, active), \
             updated_at = $7 \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id.as_str())
        .bind(user.as_u64() as i64)
        .bind(&patch.url)
        .bind(patch.event_type.map(event_type_to_str))
        .bind(&patch.description)
        .bind(patch.active)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "webhook"))?;
        row.map(TryInto::try_into).transpose()
    }

    async fn delete(&self, user: UserId, id: &WebhookId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1 AND user_id = $2")
            .bind(id.as_str())
            .bind(user.as_u64() as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn for_event(
        &self,
        user: UserId,
        kind: QueueEventKind,
    ) -> Result<Vec<Webhook>, StorageError> {
        let rows: Vec<WebhookRow> = sqlx::query_as(
            "SELECT * FROM webhooks WHERE user_id = $1 AND active \
             AND event_type IN ($2, 'all')",
        )
        .bind(user.as_u64() as i64)
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// In-memory webhook store for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct MemoryWebhookStore {
    hooks: parking_lot::Mutex<Vec<Webhook>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn insert(&self, hook: Webhook) -> Result<Webhook, StorageError> {
        let mut hooks = self.hooks.lock();
        let duplicate = hooks.iter().any(|h| {
            h.user_id == hook.user_id && h.url == hook.url && h.event_type == hook.event_type
        });
        if duplicate {
            return Err(StorageError::Conflict("webhook".into()));
        }
        hooks.push(hook.clone());
        Ok(hook)
    }

    async fn list(&self, user: UserId) -> Result<Vec<Webhook>, StorageError> {
        Ok(self
            .hooks
            .lock()
            .iter()
            .filter(|h| h.user_id == user)
            .cloned()
            .collect())
    }

    async fn get(&self, user: UserId, id: &WebhookId) -> Result<Option<Webhook>, StorageError> {
        Ok(self
            .hooks
            .lock()
            .iter()
            .find(|h| h.user_id == user && h.id == *id)
            .cloned())
    }

    async fn update(
        &self,
        user: UserId,
        id: &WebhookId,
        patch: WebhookPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Webhook>, StorageError> {
        let mut hooks = self.hooks.lock();
        let Some(index) = hooks.iter().position(|h| h.user_id == user && h.id == *id) else {
            return Ok(None);
        };
        let mut updated = hooks[index].clone();
        if let Some(url) = patch.url {
            updated.url = url;
        }
        if let Some(event_type) = patch.event_type {
            updated.event_type = event_type;
        }
        if let Some(description) = patch.description {
            updated.description = Some(description);
        }
        if let Some(active) = patch.active {
            updated.active = active;
        }
        updated.updated_at = now;

        let duplicate = hooks.iter().enumerate().any(|(i, h)| {
            i != index
                && h.user_id == updated.user_id
                && h.url == updated.url
                && h.event_type == updated.event_type
        });
        if duplicate {
            return Err(StorageError::Conflict("webhook".into()));
        }
        hooks[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, user: UserId, id: &WebhookId) -> Result<bool, StorageError> {
        let mut hooks = self.hooks.lock();
        let before = hooks.len();
        hooks.retain(|h| !(h.user_id == user && h.id == *id));
        Ok(hooks.len() < before)
    }

    async fn for_event(
        &self,
        user: UserId,
        kind: QueueEventKind,
    ) -> Result<Vec<Webhook>, StorageError> {
        Ok(self
            .hooks
            .lock()
            .iter()
            .filter(|h| h.user_id == user && h.active && h.event_type.matches(kind))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;
