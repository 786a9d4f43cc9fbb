// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jf-storage: relational persistence for users, credentials, webhooks, and
//! flow rows.

pub mod api_keys;
pub mod error;
pub mod flows;
pub mod schema;
pub mod users;
pub mod webhooks;

#[cfg(any(test, feature = "test-support"))]
pub use api_keys::MemoryApiKeyStore;
pub use api_keys::{ApiKeyPatch, ApiKeyStore, PgApiKeyStore};
pub use error::StorageError;
#[cfg(any(test, feature = "test-support"))]
pub use flows::MemoryFlowStore;
pub use flows::{FlowStore, PgFlowStore};
pub use schema::{bootstrap, connect};
#[cfg(any(test, feature = "test-support"))]
pub use users::MemoryUserStore;
pub use users::{NewUser, PgUserStore, UserStore};
#[cfg(any(test, feature = "test-support"))]
pub use webhooks::MemoryWebhookStore;
pub use webhooks::{PgWebhookStore, WebhookPatch, WebhookStore};
