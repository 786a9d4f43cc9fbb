// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.into(),
        email: Some(format!("{username}@example.test")),
        password_hash: "$2b$hash".into(),
    }
}

#[tokio::test]
async fn create_assigns_sequential_ids() {
    let store = MemoryUserStore::new();
    let alice = store.create(new_user("alice")).await.unwrap();
    let bob = store.create(new_user("bob")).await.unwrap();
    assert_eq!(alice.id, UserId(1));
    assert_eq!(bob.id, UserId(2));
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let store = MemoryUserStore::new();
    store.create(new_user("alice")).await.unwrap();
    let err = store.create(new_user("alice")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn lookup_by_id_and_username() {
    let store = MemoryUserStore::new();
    let alice = store.create(new_user("alice")).await.unwrap();
    assert_eq!(store.by_id(alice.id).await.unwrap().unwrap().username, "alice");
    assert_eq!(store.by_username("alice").await.unwrap().unwrap().id, alice.id);
    assert!(store.by_username("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_token_round_trip() {
    let store = MemoryUserStore::new();
    let alice = store.create(new_user("alice")).await.unwrap();
    let expiry = Utc::now();
    store
        .set_refresh_token(alice.id, Some("token".into()), Some(expiry))
        .await
        .unwrap();
    let loaded = store.by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(loaded.refresh_token.as_deref(), Some("token"));
    assert_eq!(loaded.refresh_token_expiry, Some(expiry));

    store.set_refresh_token(alice.id, None, None).await.unwrap();
    let loaded = store.by_id(alice.id).await.unwrap().unwrap();
    assert!(loaded.refresh_token.is_none());
}

#[tokio::test]
async fn password_update_clears_reset_token() {
    let store = MemoryUserStore::new();
    let alice = store.create(new_user("alice")).await.unwrap();
    store
        .set_reset_token(alice.id, Some("reset".into()), Some(Utc::now()))
        .await
        .unwrap();
    store.set_password_hash(alice.id, "$2b$new".into()).await.unwrap();
    let loaded = store.by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(loaded.password_hash, "$2b$new");
    assert!(loaded.reset_token.is_none());
    assert!(loaded.reset_token_expiry.is_none());
}

#[tokio::test]
async fn webhook_url_update() {
    let store = MemoryUserStore::new();
    let alice = store.create(new_user("alice")).await.unwrap();
    store
        .set_webhook_url(alice.id, Some("http://example.test/hook".into()))
        .await
        .unwrap();
    let loaded = store.by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(loaded.webhook_url.as_deref(), Some("http://example.test/hook"));
}
