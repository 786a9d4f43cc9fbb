// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook subscriptions.

use crate::event::QueueEventKind;
use crate::id::{UserId, WebhookId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event classes a webhook may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookEventType {
    Progress,
    Completed,
    Failed,
    Delta,
    All,
}

crate::simple_display! {
    WebhookEventType {
        Progress => "progress",
        Completed => "completed",
        Failed => "failed",
        Delta => "delta",
        All => "all",
    }
}

impl WebhookEventType {
    /// Whether a delivery of `kind` should reach this subscription.
    pub fn matches(&self, kind: QueueEventKind) -> bool {
        match self {
            WebhookEventType::All => true,
            WebhookEventType::Progress => kind == QueueEventKind::Progress,
            WebhookEventType::Completed => kind == QueueEventKind::Completed,
            WebhookEventType::Failed => kind == QueueEventKind::Failed,
            WebhookEventType::Delta => false,
        }
    }
}

/// A registered webhook endpoint. `(user_id, url, event_type)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: WebhookId,
    pub user_id: UserId,
    pub url: String,
    pub event_type: WebhookEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

crate::builder! {
    pub struct WebhookBuilder => Webhook {
        into {
            id: WebhookId = "wh_test",
            url: String = "http://example.test/hook",
        }
        set {
            user_id: UserId = UserId(1),
            event_type: WebhookEventType = WebhookEventType::All,
            active: bool = true,
        }
        option {
            description: String = None,
        }
        computed {
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
