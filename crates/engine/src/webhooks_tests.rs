// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ServiceError;
use crate::test_support::{alice, bob};
use jf_core::FakeClock;
use jf_storage::MemoryWebhookStore;

fn service() -> WebhookService<FakeClock> {
    WebhookService::new(Arc::new(MemoryWebhookStore::new()), FakeClock::new())
}

fn request(url: &str, event_type: WebhookEventType) -> CreateWebhookRequest {
    CreateWebhookRequest {
        url: url.into(),
        event_type,
        description: None,
        active: true,
    }
}

#[tokio::test]
async fn create_and_get() {
    let service = service();
    let hook = service
        .create(&alice(), request("http://a.test", WebhookEventType::Completed))
        .await
        .unwrap();
    assert!(hook.active);
    let loaded = service.get(&alice(), &hook.id).await.unwrap();
    assert_eq!(loaded, hook);
}

#[tokio::test]
async fn empty_url_is_invalid() {
    let service = service();
    let err = service
        .create(&alice(), request(" ", WebhookEventType::All))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn duplicate_tuple_conflicts() {
    let service = service();
    service
        .create(&alice(), request("http://a.test", WebhookEventType::Completed))
        .await
        .unwrap();
    let err = service
        .create(&alice(), request("http://a.test", WebhookEventType::Completed))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn foreign_webhooks_are_invisible() {
    let service = service();
    let hook = service
        .create(&alice(), request("http://a.test", WebhookEventType::All))
        .await
        .unwrap();
    let err = service.get(&bob(), &hook.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("webhook")));
    let err = service.delete(&bob(), &hook.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("webhook")));
}

#[tokio::test]
async fn update_patches_and_bumps_updated_at() {
    let service = service();
    let hook = service
        .create(&alice(), request("http://a.test", WebhookEventType::All))
        .await
        .unwrap();
    let updated = service
        .update(
            &alice(),
            &hook.id,
            jf_storage::WebhookPatch { active: Some(false), ..Default::default() },
        )
        .await
        .unwrap();
    assert!(!updated.active);
}

#[tokio::test]
async fn delete_then_list_is_empty() {
    let service = service();
    let hook = service
        .create(&alice(), request("http://a.test", WebhookEventType::All))
        .await
        .unwrap();
    service.delete(&alice(), &hook.id).await.unwrap();
    assert!(service.list(&alice()).await.unwrap().is_empty());
}
