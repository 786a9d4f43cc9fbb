// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth & credential service: bearer tokens, API keys, and the password
//! flows that feed them.
//!
//! API keys are stored as `(prefix, bcrypt hash)`; the plaintext leaves the
//! service exactly once, in the creation response. Bearer tokens are JWTs
//! signed with `TOKEN_SECRET`; a decoded token is only as good as the user
//! row still existing.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use jf_core::{prefix_of, ApiKey, ApiKeyId, Caller, Clock, UserId, UserView};
use jf_storage::{ApiKeyPatch, ApiKeyStore, NewUser, UserStore};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Reset tokens live for one hour.
const RESET_TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub refresh_secret: String,
    /// Access-token lifetime (default 30 minutes).
    pub token_expiry: Duration,
    /// Refresh-token lifetime (default 7 days).
    pub refresh_expiry: Duration,
}

impl AuthConfig {
    pub fn new(token_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            refresh_secret: refresh_secret.into(),
            token_expiry: Duration::from_secs(1800),
            refresh_expiry: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id.
    sub: String,
    exp: u64,
    iat: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Creation response: the only place the plaintext ever appears.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub key: ApiKey,
    /// Full plaintext; not recoverable later.
    pub plaintext: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct AuthService<C: Clock> {
    users: Arc<dyn UserStore>,
    keys: Arc<dyn ApiKeyStore>,
    config: AuthConfig,
    clock: C,
}

impl<C: Clock> AuthService<C> {
    pub fn new(
        users: Arc<dyn UserStore>,
        keys: Arc<dyn ApiKeyStore>,
        config: AuthConfig,
        clock: C,
    ) -> Self {
        Self { users, keys, config, clock }
    }

    // -- registration & sessions --

    /// Create a user. A taken username is a Conflict.
    pub async fn register(
        &self,
        username: &str,
        email: Option<String>,
        password: &str,
    ) -> Result<UserView, ServiceError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ServiceError::validation("username and password are required"));
        }
        let password_hash =
            bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(ServiceError::internal)?;
        let user = self
            .users
            .create(NewUser { username: username.to_string(), email, password_hash })
            .await?;
        Ok(UserView::from(&user))
    }

    /// Verify a password and issue an access/refresh token pair. The refresh
    /// token is recorded on the user row until logout.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ServiceError> {
        let user = self
            .users
            .by_username(username)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;
        let valid =
            bcrypt::verify(password, &user.password_hash).map_err(ServiceError::internal)?;
        if !valid {
            return Err(ServiceError::Unauthenticated);
        }

        let access_token =
            self.sign(user.id, &self.config.token_secret, self.config.token_expiry)?;
        let refresh_token =
            self.sign(user.id, &self.config.refresh_secret, self.config.refresh_expiry)?;
        let expiry = self.clock.now_utc()
            + chrono::Duration::seconds(self.config.refresh_expiry.as_secs() as i64);
        self.users
            .set_refresh_token(user.id, Some(refresh_token.clone()), Some(expiry))
            .await?;
        Ok(TokenPair { access_token, refresh_token })
    }

    pub async fn logout(&self, user: UserId) -> Result<(), ServiceError> {
        self.users.set_refresh_token(user, None, None).await?;
        Ok(())
    }

    /// Exchange a still-valid refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ServiceError> {
        let user_id = self.decode(refresh_token, &self.config.refresh_secret)?;
        let user = self
            .users
            .by_id(user_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;
        let stored = user.refresh_token.as_deref() == Some(refresh_token);
        let unexpired = user
            .refresh_token_expiry
            .map(|exp| exp > self.clock.now_utc())
            .unwrap_or(false);
        if !stored || !unexpired {
            return Err(ServiceError::Unauthenticated);
        }
        self.sign(user.id, &self.config.token_secret, self.config.token_expiry)
    }

    // -- password reset --

    /// Produce a short-lived reset token and store it on the user row.
    pub async fn request_password_reset(&self, username: &str) -> Result<String, ServiceError> {
        let user = self
            .users
            .by_username(username)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        let token = self.sign(user.id, &self.config.token_secret, RESET_TOKEN_TTL)?;
        let expiry = self.clock.now_utc() + chrono::Duration::seconds(3600);
        self.users
            .set_reset_token(user.id, Some(token.clone()), Some(expiry))
            .await?;
        Ok(token)
    }

    /// Redeem a reset token: the presented plaintext must match the stored
    /// one and be unexpired. Issues a new hash and clears the token.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if new_password.is_empty() {
            return Err(ServiceError::validation("password must not be empty"));
        }
        let user_id = self.decode(token, &self.config.token_secret)?;
        let user = self
            .users
            .by_id(user_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;
        let stored = user.reset_token.as_deref() == Some(token);
        let unexpired = user
            .reset_token_expiry
            .map(|exp| exp > self.clock.now_utc())
            .unwrap_or(false);
        if !stored || !unexpired {
            return Err(ServiceError::Unauthenticated);
        }
        let hash =
            bcrypt::hash(new_password, bcrypt::DEFAULT_COST).map_err(ServiceError::internal)?;
        self.users.set_password_hash(user.id, hash).await?;
        Ok(())
    }

    // -- current user --

    pub async fn me(&self, caller: &Caller) -> Result<UserView, ServiceError> {
        let user = self
            .users
            .by_id(caller.user_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;
        Ok(UserView::from(&user))
    }

    pub async fn set_webhook_url(
        &self,
        caller: &Caller,
        url: Option<String>,
    ) -> Result<(), ServiceError> {
        self.users.set_webhook_url(caller.user_id, url).await?;
        Ok(())
    }

    // -- credential verification --

    /// Verify a bearer token: signature, expiry, and the user still existing.
    pub async fn verify_bearer(&self, token: &str) -> Result<Caller, ServiceError> {
        let user_id = self.decode(token, &self.config.token_secret)?;
        let user = self
            .users
            .by_id(user_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;
        Ok(Caller::new(user.id))
    }

    /// Verify an API key: prefix lookup, then a bcrypt comparison against
    /// each active candidate. `last_used` is bumped best-effort on a match.
    pub async fn verify_api_key(&self, plaintext: &str) -> Result<Caller, ServiceError> {
        let prefix = prefix_of(plaintext);
        let now = self.clock.now_utc();
        let candidates = self.keys.usable_by_prefix(prefix, now).await?;
        for key in candidates {
            let matched =
                bcrypt::verify(plaintext, &key.key_hash).map_err(ServiceError::internal)?;
            if matched {
                if let Err(e) = self.keys.touch_last_used(&key.id, now).await {
                    warn!(key = %key.id, error = %e, "last_used update failed");
                }
                return Ok(Caller::with_permissions(key.user_id, key.permissions));
            }
        }
        Err(ServiceError::Unauthenticated)
    }

    // -- API key CRUD --

    /// Create a key. The returned plaintext is never persisted; only its
    /// first eight characters and a bcrypt hash are.
    pub async fn create_api_key(
        &self,
        caller: &Caller,
        request: CreateApiKeyRequest,
    ) -> Result<CreatedApiKey, ServiceError> {
        if request.name.trim().is_empty() {
            return Err(ServiceError::validation("api key name must not be empty"));
        }
        let plaintext = format!("jf_{}", nanoid::nanoid!(32));
        let key_hash =
            bcrypt::hash(&plaintext, bcrypt::DEFAULT_COST).map_err(ServiceError::internal)?;
        let key = ApiKey {
            id: ApiKeyId::new(),
            user_id: caller.user_id,
            name: request.name,
            prefix: prefix_of(&plaintext).to_string(),
            key_hash,
            permissions: request.permissions,
            last_used: None,
            created_at: self.clock.now_utc(),
            expires_at: request.expires_at,
            is_active: true,
        };
        let key = self.keys.insert(key).await?;
        Ok(CreatedApiKey { key, plaintext })
    }

    pub async fn list_api_keys(&self, caller: &Caller) -> Result<Vec<ApiKey>, ServiceError> {
        Ok(self.keys.list(caller.user_id).await?)
    }

    pub async fn get_api_key(
        &self,
        caller: &Caller,
        id: &ApiKeyId,
    ) -> Result<ApiKey, ServiceError> {
        self.keys
            .get(caller.user_id, id)
            .await?
            .ok_or(ServiceError::NotFound("api key"))
    }

    pub async fn update_api_key(
        &self,
        caller: &Caller,
        id: &ApiKeyId,
        patch: ApiKeyPatch,
    ) -> Result<ApiKey, ServiceError> {
        self.keys
            .update(caller.user_id, id, patch)
            .await?
            .ok_or(ServiceError::NotFound("api key"))
    }

    pub async fn delete_api_key(
        &self,
        caller: &Caller,
        id: &ApiKeyId,
    ) -> Result<(), ServiceError> {
        if !self.keys.delete(caller.user_id, id).await? {
            return Err(ServiceError::NotFound("api key"));
        }
        Ok(())
    }

    // -- helpers --

    fn sign(&self, user: UserId, secret: &str, ttl: Duration) -> Result<String, ServiceError> {
        let iat = self.clock.epoch_ms() / 1000;
        let claims = Claims {
            sub: user.to_string(),
            iat,
            exp: iat + ttl.as_secs(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(ServiceError::internal)
    }

    fn decode(&self, token: &str, secret: &str) -> Result<UserId, ServiceError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ServiceError::Unauthenticated)?;
        let id: u64 = data
            .claims
            .sub
            .parse()
            .map_err(|_| ServiceError::Unauthenticated)?;
        Ok(UserId(id))
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
