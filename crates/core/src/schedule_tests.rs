// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn key_composition() {
    let key = SchedulerKey::compose(UserId(1), "daily", 1_700_000_000_000);
    assert_eq!(key.as_str(), "1-daily-1700000000000");
}

#[parameterized(
    owner = { "1-daily-123", 1, true },
    other_user = { "1-daily-123", 2, false },
    prefix_collision = { "12-daily-123", 1, false },
    empty = { "", 1, false },
)]
fn key_ownership(key: &str, user: u64, expected: bool) {
    let key = SchedulerKey::from_string(key);
    assert_eq!(key.is_owned_by(UserId(user)), expected);
}

#[test]
fn cron_wins_over_every() {
    let spec = ScheduleSpec {
        cron: Some("0 0 * * *".into()),
        tz: Some("UTC".into()),
        repeat: Some(RepeatSpec { every: 1000, limit: Some(3) }),
        start_date: None,
        end_date: None,
    };
    let opts = spec.to_repeat_opts().unwrap();
    assert_eq!(opts.pattern.as_deref(), Some("0 0 * * *"));
    assert_eq!(opts.tz.as_deref(), Some("UTC"));
    assert_eq!(opts.every, None);
    assert_eq!(opts.limit, None);
}

#[test]
fn every_used_without_cron() {
    let spec = ScheduleSpec {
        cron: None,
        tz: None,
        repeat: Some(RepeatSpec { every: 60_000, limit: Some(10) }),
        start_date: None,
        end_date: None,
    };
    let opts = spec.to_repeat_opts().unwrap();
    assert_eq!(opts.pattern, None);
    assert_eq!(opts.every, Some(60_000));
    assert_eq!(opts.limit, Some(10));
}

#[test]
fn window_dates_carried_over() {
    let spec = ScheduleSpec {
        cron: Some("*/5 * * * *".into()),
        tz: None,
        repeat: None,
        start_date: Some(100),
        end_date: Some(200),
    };
    let opts = spec.to_repeat_opts().unwrap();
    assert_eq!(opts.start_date, Some(100));
    assert_eq!(opts.end_date, Some(200));
}

#[test]
fn empty_schedule_yields_no_repeat() {
    let spec = ScheduleSpec::default();
    assert!(spec.to_repeat_opts().is_none());
}

#[test]
fn record_serializes_camel_case() {
    let record = ScheduleRecord {
        key: SchedulerKey::compose(UserId(1), "daily", 1),
        queue: "schedQueue".into(),
        job_name: "daily".into(),
        template: ScheduleTemplate {
            data: serde_json::json!({"userId": 1}),
            opts: crate::job::JobOpts::default(),
        },
        repeat: RepeatOpts {
            pattern: Some("0 0 * * *".into()),
            every: None,
            limit: None,
            start_date: None,
            end_date: None,
            tz: None,
        },
        next: Some(1_700_000_000_000),
        iteration_count: 2,
    };
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["jobName"], "daily");
    assert_eq!(value["iterationCount"], 2);
    assert_eq!(value["repeat"]["pattern"], "0 0 * * *");
}
