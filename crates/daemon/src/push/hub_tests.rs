// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jf_core::{JobId, UserId};
use serde_json::json;

#[tokio::test]
async fn emit_reaches_subscribers_with_room_tag() {
    let hub = Hub::new();
    let mut rx = hub.subscribe();

    hub.emit(
        &Room::User(UserId(1)),
        PushMessage::new("job:completed", json!({"jobId": "42"})),
    );

    let envelope = rx.recv().await.unwrap();
    assert_eq!(envelope.room, "user:1");
    assert_eq!(envelope.message.event, "job:completed");
}

#[test]
fn emit_without_subscribers_is_fire_and_forget() {
    let hub = Hub::new();
    assert_eq!(hub.receiver_count(), 0);
    // Must not panic or error.
    hub.emit(
        &Room::Job(JobId::from_string("42")),
        PushMessage::new("job:progress", json!(50)),
    );
}

#[tokio::test]
async fn every_subscriber_sees_every_message() {
    let hub = Hub::new();
    let mut a = hub.subscribe();
    let mut b = hub.subscribe();

    hub.emit(&Room::User(UserId(1)), PushMessage::new("flow:created", json!({})));
    hub.emit(&Room::User(UserId(2)), PushMessage::new("flow:updated", json!({})));

    assert_eq!(a.recv().await.unwrap().room, "user:1");
    assert_eq!(a.recv().await.unwrap().room, "user:2");
    assert_eq!(b.recv().await.unwrap().room, "user:1");
    assert_eq!(b.recv().await.unwrap().room, "user:2");
}
