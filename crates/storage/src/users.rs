// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User persistence.

use crate::error::{map_constraint, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jf_core::{User, UserId};
use sqlx::PgPool;

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Duplicate usernames are a [`StorageError::Conflict`].
    async fn create(&self, new: NewUser) -> Result<User, StorageError>;

    async fn by_id(&self, id: UserId) -> Result<Option<User>, StorageError>;

    async fn by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    async fn set_refresh_token(
        &self,
        id: UserId,
        token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    async fn set_reset_token(
        &self,
        id: UserId,
        token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    /// Replace the password hash and clear any outstanding reset token.
    async fn set_password_hash(&self, id: UserId, hash: String) -> Result<(), StorageError>;

    async fn set_webhook_url(&self, id: UserId, url: Option<String>) -> Result<(), StorageError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: Option<String>,
    password_hash: String,
    refresh_token: Option<String>,
    refresh_token_expiry: Option<DateTime<Utc>>,
    reset_token: Option<String>,
    reset_token_expiry: Option<DateTime<Utc>>,
    webhook_url: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id as u64),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            refresh_token: row.refresh_token,
            refresh_token_expiry: row.refresh_token_expiry,
            reset_token: row.reset_token,
            reset_token_expiry: row.reset_token_expiry,
            webhook_url: row.webhook_url,
        }
    }
}

/// Postgres-backed user store.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StorageError> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "username"))?;
        Ok(row.into())
    }

    async fn by_id(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id.as_u64() as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn set_refresh_token(
        &self,
        id: UserId,
        token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE users SET refresh_token = $2, refresh_token_expiry = $3 WHERE id = $1")
            .bind(id.as_u64() as i64)
            .bind(&token)
            .bind(expiry)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE users SET reset_token = $2, reset_token_expiry = $3 WHERE id = $1")
            .bind(id.as_u64() as i64)
            .bind(&token)
            .bind(expiry)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_password_hash(&self, id: UserId, hash: String) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, reset_token = NULL, reset_token_expiry = NULL \
             WHERE id = $1",
        )
        .bind(id.as_u64() as i64)
        .bind(&hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_webhook_url(&self, id: UserId, url: Option<String>) -> Result<(), StorageError> {
        sqlx::query("UPDATE users SET webhook_url = $2 WHERE id = $1")
            .bind(id.as_u64() as i64)
            .bind(&url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory user store for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct MemoryUserStore {
    users: parking_lot::Mutex<Vec<User>>,
    next_id: parking_lot::Mutex<u64>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: parking_lot::Mutex::new(Vec::new()),
            next_id: parking_lot::Mutex::new(0),
        }
    }

    fn mutate<R>(
        &self,
        id: UserId,
        f: impl FnOnce(&mut User) -> R,
    ) -> Result<(), StorageError> {
        let mut users = self.users.lock();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            f(user);
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StorageError> {
        let mut users = self.users.lock();
        if users.iter().any(|u| u.username == new.username) {
            return Err(StorageError::Conflict("username".into()));
        }
        let mut next = self.next_id.lock();
        *next += 1;
        let user = User {
            id: UserId(*next),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            refresh_token: None,
            refresh_token_expiry: None,
            reset_token: None,
            reset_token_expiry: None,
            webhook_url: None,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn by_id(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.users.lock().iter().find(|u| u.id == id).cloned())
    }

    async fn by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self.users.lock().iter().find(|u| u.username == username).cloned())
    }

    async fn set_refresh_token(
        &self,
        id: UserId,
        token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.mutate(id, |u| {
            u.refresh_token = token;
            u.refresh_token_expiry = expiry;
        })
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.mutate(id, |u| {
            u.reset_token = token;
            u.reset_token_expiry = expiry;
        })
    }

    async fn set_password_hash(&self, id: UserId, hash: String) -> Result<(), StorageError> {
        self.mutate(id, |u| {
            u.password_hash = hash;
            u.reset_token = None;
            u.reset_token_expiry = None;
        })
    }

    async fn set_webhook_url(&self, id: UserId, url: Option<String>) -> Result<(), StorageError> {
        self.mutate(id, |u| u.webhook_url = url)
    }
}

#[cfg(test)]
#[path = "users_tests.rs"]
mod tests;
