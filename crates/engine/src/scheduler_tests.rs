// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ServiceError;
use crate::test_support::{alice, bob, fake_registry};
use jf_core::FakeClock;
use serde_json::json;

fn submission(name: &str, cron: &str) -> ScheduleSubmission {
    ScheduleSubmission {
        name: name.into(),
        data: json!({"report": "daily"}),
        opts: None,
        schedule: ScheduleSpec {
            cron: Some(cron.into()),
            tz: None,
            repeat: None,
            start_date: None,
            end_date: None,
        },
    }
}

fn service() -> SchedulerService<FakeClock> {
    let (registry, _) = fake_registry();
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    SchedulerService::new(registry, clock)
}

#[tokio::test]
async fn schedule_composes_ownable_key() {
    let service = service();
    let key = service
        .schedule("schedQueue", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap();
    assert_eq!(key.as_str(), "1-daily-1700000000000");
    assert!(key.is_owned_by(jf_core::UserId(1)));
    assert!(!key.is_owned_by(jf_core::UserId(2)));
}

#[tokio::test]
async fn schedule_injects_owner_into_template() {
    let service = service();
    let key = service
        .schedule("schedQueue", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap();
    let record = service
        .get("schedQueue", &key, &alice())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.template.data["userId"], json!(1));
    assert_eq!(record.repeat.pattern.as_deref(), Some("0 0 * * *"));
    assert!(record.next.is_some());
}

#[tokio::test]
async fn upsert_with_same_key_does_not_grow_the_list() {
    let (registry, _) = fake_registry();
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    let service = SchedulerService::new(registry, clock.clone());

    // Identical timestamp produces an identical key; the upsert overrides.
    let first = service
        .schedule("schedQueue", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap();
    let second = service
        .schedule("schedQueue", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap();
    assert_eq!(first, second);
    let listed = service.list_for_user("schedQueue", &alice()).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn schedule_without_cron_or_every_is_invalid() {
    let service = service();
    let mut bad = submission("daily", "0 0 * * *");
    bad.schedule = ScheduleSpec::default();
    let err = service.schedule("schedQueue", bad, &alice()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn interval_schedules_supported() {
    let service = service();
    let mut submission = submission("poller", "ignored");
    submission.schedule = ScheduleSpec {
        cron: None,
        tz: None,
        repeat: Some(jf_core::RepeatSpec { every: 60_000, limit: Some(3) }),
        start_date: None,
        end_date: None,
    };
    let key = service.schedule("schedQueue", submission, &alice()).await.unwrap();
    let record = service.get("schedQueue", &key, &alice()).await.unwrap().unwrap();
    assert_eq!(record.repeat.every, Some(60_000));
    assert_eq!(record.repeat.limit, Some(3));
}

#[tokio::test]
async fn list_is_scoped_per_user() {
    let service = service();
    service
        .schedule("schedQueue", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap();

    let mine = service.list_for_user("schedQueue", &alice()).await.unwrap();
    assert_eq!(mine.len(), 1);

    let theirs = service.list_for_user("schedQueue", &bob()).await.unwrap();
    assert!(theirs.is_empty());
}

#[tokio::test]
async fn get_returns_none_for_foreign_keys() {
    let service = service();
    let key = service
        .schedule("schedQueue", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap();
    assert!(service.get("schedQueue", &key, &alice()).await.unwrap().is_some());
    assert!(service.get("schedQueue", &key, &bob()).await.unwrap().is_none());
}

#[tokio::test]
async fn remove_is_idempotent_and_ownership_checked() {
    let service = service();
    let key = service
        .schedule("schedQueue", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap();

    // A stranger's removal is a no-op false, not an error.
    assert!(!service.remove("schedQueue", &key, &bob()).await.unwrap());

    assert!(service.remove("schedQueue", &key, &alice()).await.unwrap());
    assert!(!service.remove("schedQueue", &key, &alice()).await.unwrap());
    assert!(service.list_for_user("schedQueue", &alice()).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_queue_rejected_at_the_boundary() {
    let service = service();
    let err = service
        .schedule("bogus", submission("daily", "0 0 * * *"), &alice())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}
