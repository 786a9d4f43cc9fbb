// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jf_core::Webhook;

fn hook(user: u64, url: &str, event_type: WebhookEventType) -> Webhook {
    Webhook::builder()
        .id(WebhookId::new())
        .user_id(UserId(user))
        .url(url)
        .event_type(event_type)
        .build()
}

#[tokio::test]
async fn duplicate_tuple_conflicts() {
    let store = MemoryWebhookStore::new();
    store
        .insert(hook(1, "http://a.test", WebhookEventType::Completed))
        .await
        .unwrap();
    let err = store
        .insert(hook(1, "http://a.test", WebhookEventType::Completed))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    // Same URL with a different event type is a distinct subscription.
    store
        .insert(hook(1, "http://a.test", WebhookEventType::Failed))
        .await
        .unwrap();
}

#[tokio::test]
async fn for_event_matches_kind_and_all() {
    let store = MemoryWebhookStore::new();
    store
        .insert(hook(1, "http://completed.test", WebhookEventType::Completed))
        .await
        .unwrap();
    store
        .insert(hook(1, "http://all.test", WebhookEventType::All))
        .await
        .unwrap();
    store
        .insert(hook(1, "http://progress.test", WebhookEventType::Progress))
        .await
        .unwrap();

    let targets = store.for_event(UserId(1), QueueEventKind::Completed).await.unwrap();
    let urls: Vec<&str> = targets.iter().map(|h| h.url.as_str()).collect();
    assert!(urls.contains(&"http://completed.test"));
    assert!(urls.contains(&"http://all.test"));
    assert!(!urls.contains(&"http://progress.test"));
}

#[tokio::test]
async fn inactive_hooks_excluded_from_event_resolution() {
    let store = MemoryWebhookStore::new();
    let mut inactive = hook(1, "http://off.test", WebhookEventType::All);
    inactive.active = false;
    store.insert(inactive).await.unwrap();
    let targets = store.for_event(UserId(1), QueueEventKind::Completed).await.unwrap();
    assert!(targets.is_empty());
}

#[tokio::test]
async fn update_refreshes_updated_at_and_checks_duplicates() {
    let store = MemoryWebhookStore::new();
    let first = store
        .insert(hook(1, "http://a.test", WebhookEventType::Completed))
        .await
        .unwrap();
    store
        .insert(hook(1, "http://b.test", WebhookEventType::Completed))
        .await
        .unwrap();

    let now = Utc::now();
    let updated = store
        .update(
            UserId(1),
            &first.id,
            WebhookPatch { active: Some(false), ..WebhookPatch::default() },
            now,
        )
        .await
        .unwrap()
        .unwrap();
    assert!(!updated.active);
    assert_eq!(updated.updated_at, now);

    // Moving first onto b's tuple collides.
    let err = store
        .update(
            UserId(1),
            &first.id,
            WebhookPatch { url: Some("http://b.test".into()), ..WebhookPatch::default() },
            now,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn delete_scoped_to_owner() {
    let store = MemoryWebhookStore::new();
    let inserted = store
        .insert(hook(1, "http://a.test", WebhookEventType::All))
        .await
        .unwrap();
    assert!(!store.delete(UserId(2), &inserted.id).await.unwrap());
    assert!(store.delete(UserId(1), &inserted.id).await.unwrap());
}
