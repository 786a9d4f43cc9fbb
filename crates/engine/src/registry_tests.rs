// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ServiceError;
use crate::test_support::fake_registry;
use yare::parameterized;

#[test]
fn default_allow_list() {
    let (registry, _) = fake_registry();
    assert_eq!(registry.queue_names(), &["jobQueue", "webhooks", "schedQueue"]);
}

#[parameterized(
    primary = { "jobQueue" },
    webhooks = { "webhooks" },
    sched = { "schedQueue" },
)]
fn allowed_names_vend_handles(name: &str) {
    let (registry, _) = fake_registry();
    let handle = registry.queue(name).unwrap();
    assert_eq!(handle.name(), name);
}

#[parameterized(
    unknown = { "otherQueue" },
    case_sensitive = { "JOBQUEUE" },
    empty = { "" },
    injection = { "jobQueue:evil" },
)]
fn unknown_names_fail_validation(name: &str) {
    let (registry, _) = fake_registry();
    let err = registry.queue(name).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(!registry.is_allowed(name));
}

#[tokio::test]
async fn handles_are_shared_lazily() {
    let (registry, broker) = fake_registry();
    let first = registry.queue("jobQueue").unwrap();
    let second = registry.queue("jobQueue").unwrap();

    // Both handles hit the same underlying queue.
    first
        .add_job("export", serde_json::json!({"userId": 1}), jf_core::JobOpts::default())
        .await
        .unwrap();
    let jobs = second
        .jobs_in_states(&[jf_core::JobState::Waiting])
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(broker.job_count("jobQueue"), 1);
}
