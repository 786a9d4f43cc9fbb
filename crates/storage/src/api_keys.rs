// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API-key persistence.

use crate::error::{map_constraint, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jf_core::{ApiKey, ApiKeyId, UserId};
use sqlx::PgPool;

/// Mutable fields on an API key.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyPatch {
    pub name: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Insert a key. A duplicate `(user, name)` is a [`StorageError::Conflict`].
    async fn insert(&self, key: ApiKey) -> Result<ApiKey, StorageError>;

    async fn list(&self, user: UserId) -> Result<Vec<ApiKey>, StorageError>;

    async fn get(&self, user: UserId, id: &ApiKeyId) -> Result<Option<ApiKey>, StorageError>;

    async fn update(
        &self,
        user: UserId,
        id: &ApiKeyId,
        patch: ApiKeyPatch,
    ) -> Result<Option<ApiKey>, StorageError>;

    async fn delete(&self, user: UserId, id: &ApiKeyId) -> Result<bool, StorageError>;

    /// Active, unexpired keys whose prefix matches. Candidates for a bcrypt
    /// comparison against a presented plaintext.
    async fn usable_by_prefix(
        &self,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApiKey>, StorageError>;

    /// Best-effort `last_used` bump; lost updates are acceptable.
    async fn touch_last_used(&self, id: &ApiKeyId, now: DateTime<Utc>)
        -> Result<(), StorageError>;
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: String,
    user_id: i64,
    name: String,
    prefix: String,
    key_hash: String,
    permissions: Vec<String>,
    last_used: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        ApiKey {
            id: ApiKeyId::from_string(row.id),
            user_id: UserId(row.user_id as u64),
            name: row.name,
            prefix: row.prefix,
            key_hash: row.key_hash,
            permissions: row.permissions,
            last_used: row.last_used,
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        }
    }
}

/// Postgres-backed API-key store.
pub struct PgApiKeyStore {
    pool: PgPool,
}

impl PgApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn insert(&self, key: ApiKey) -> Result<ApiKey, StorageError> {
        let row: ApiKeyRow = sqlx::query_as(
            "INSERT INTO api_keys \
             (id, user_id, name, prefix, key_hash, permissions, created_at, expires_at, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(key.id.as_str())
        .bind(key.user_id.as_u64() as i64)
        .bind(&key.name)
        .bind(&key.prefix)
        .bind(&key.key_hash)
        .bind(&key.permissions)
        .bind(key.created_at)
        .bind(key.expires_at)
        .bind(key.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "api key name"))?;
        Ok(row.into())
    }

    async fn list(&self, user: UserId) -> Result<Vec<ApiKey>, StorageError> {
        let rows: Vec<ApiKeyRow> =
            sqlx::query_as("SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at")
                .bind(user.as_u64() as i64)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(&self, user: UserId, id: &ApiKeyId) -> Result<Option<ApiKey>, StorageError> {
        let row: Option<ApiKeyRow> =
            sqlx::query_as("SELECT * FROM api_keys WHERE id = $1 AND user_id = $2")
                .bind(id.as_str())
                .bind(user.as_u64() as i64)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn update(
        &self,
        user: UserId,
        id: &ApiKeyId,
        patch: ApiKeyPatch,
    ) -> Result<Option<ApiKey>, StorageError> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            "UPDATE api_keys SET \
             name = COALESCE($3, name), \
             permissions = COALESCE($4, permissions), \
             is_active = COALESCE($5, is_active) \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id.as_str())
        .bind(user.as_u64() as i64)
        .bind(&patch.name)
        .bind(&patch.permissions)
        .bind(patch.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "api key name"))?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, user: UserId, id: &ApiKeyId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id.as_str())
            .bind(user.as_u64() as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn usable_by_prefix(
        &self,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApiKey>, StorageError> {
        let rows: Vec<ApiKeyRow> = sqlx::query_as(
            "SELECT * FROM api_keys WHERE prefix = $1 AND is_active \
             AND (expires_at IS NULL OR expires_at > $2)",
        )
        .bind(prefix)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn touch_last_used(
        &self,
        id: &ApiKeyId,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE api_keys SET last_used = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory API-key store for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct MemoryApiKeyStore {
    keys: parking_lot::Mutex<Vec<ApiKey>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn insert(&self, key: ApiKey) -> Result<ApiKey, StorageError> {
        let mut keys = self.keys.lock();
        if keys.iter().any(|k| k.user_id == key.user_id && k.name == key.name) {
            return Err(StorageError::Conflict("api key name".into()));
        }
        keys.push(key.clone());
        Ok(key)
    }

    async fn list(&self, user: UserId) -> Result<Vec<ApiKey>, StorageError> {
        Ok(self
            .keys
            .lock()
            .iter()
            .filter(|k| k.user_id == user)
            .cloned()
            .collect())
    }

    async fn get(&self, user: UserId, id: &ApiKeyId) -> Result<Option<ApiKey>, StorageError> {
        Ok(self
            .keys
            .lock()
            .iter()
            .find(|k| k.user_id == user && k.id == *id)
            .cloned())
    }

    async fn update(
        &self,
        user: UserId,
        id: &ApiKeyId,
        patch: ApiKeyPatch,
    ) -> Result<Option<ApiKey>, StorageError> {
        let mut keys = self.keys.lock();
        let Some(key) = keys.iter_mut().find(|k| k.user_id == user && k.id == *id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            key.name = name;
        }
        if let Some(permissions) = patch.permissions {
            key.permissions = permissions;
        }
        if let Some(is_active) = patch.is_active {
            key.is_active = is_active;
        }
        Ok(Some(key.clone()))
    }

    async fn delete(&self, user: UserId, id: &ApiKeyId) -> Result<bool, StorageError> {
        let mut keys = self.keys.lock();
        let before = keys.len();
        keys.retain(|k| !(k.user_id == user && k.id == *id));
        Ok(keys.len() < before)
    }

    async fn usable_by_prefix(
        &self,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApiKey>, StorageError> {
        Ok(self
            .keys
            .lock()
            .iter()
            .filter(|k| k.prefix == prefix && k.is_usable(now))
            .cloned()
            .collect())
    }

    async fn touch_last_used(
        &self,
        id: &ApiKeyId,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut keys = self.keys.lock();
        if let Some(key) = keys.iter_mut().find(|k| k.id == *id) {
            key.last_used = Some(now);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "api_keys_tests.rs"]
mod tests;
