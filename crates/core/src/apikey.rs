// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API-key credentials stored as (prefix, bcrypt hash).

use crate::id::{ApiKeyId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the lookup prefix kept alongside the hash.
pub const PREFIX_LEN: usize = 8;

/// The exact first eight characters of the plaintext key.
pub fn prefix_of(plaintext: &str) -> &str {
    crate::id::short(plaintext, PREFIX_LEN)
}

/// A stored API key. The plaintext is returned to the caller exactly once at
/// creation and never persisted; only `prefix` and `key_hash` remain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl ApiKey {
    /// A key authenticates only while active and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

crate::builder! {
    pub struct ApiKeyBuilder => ApiKey {
        into {
            id: ApiKeyId = "key_test",
            name: String = "test-key",
            prefix: String = "jf_abcde",
            key_hash: String = "$2b$test-hash",
        }
        set {
            user_id: UserId = UserId(1),
            permissions: Vec<String> = Vec::new(),
            is_active: bool = true,
        }
        option {
            last_used: DateTime<Utc> = None,
            expires_at: DateTime<Utc> = None,
        }
        computed {
            created_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "apikey_tests.rs"]
mod tests;
