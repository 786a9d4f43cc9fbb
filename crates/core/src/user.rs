// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User identity and the authenticated caller.

use crate::id::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
///
/// `password_hash` and the token fields never leave the storage/auth layers;
/// the HTTP surface serializes [`UserView`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token_expiry: Option<DateTime<Utc>>,
    /// Legacy single webhook URL, superseded by webhook records but still
    /// honored for `completed` deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Public projection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            webhook_url: user.webhook_url.clone(),
        }
    }
}

/// The authenticated caller, as resolved from a bearer token or API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    /// Present when the caller authenticated with an API key.
    pub permissions: Option<Vec<String>>,
}

impl Caller {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, permissions: None }
    }

    pub fn with_permissions(user_id: UserId, permissions: Vec<String>) -> Self {
        Self { user_id, permissions: Some(permissions) }
    }
}

crate::builder! {
    pub struct UserBuilder => User {
        into {
            username: String = "alice",
            password_hash: String = "$2b$test-hash",
        }
        set {
            id: UserId = UserId(1),
        }
        option {
            email: String = None,
            refresh_token: String = None,
            refresh_token_expiry: DateTime<Utc> = None,
            reset_token: String = None,
            reset_token_expiry: DateTime<Utc> = None,
            webhook_url: String = None,
        }
    }
}
