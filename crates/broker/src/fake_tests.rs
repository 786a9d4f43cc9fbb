// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jf_core::UserId;
use serde_json::json;

fn spec(name: &str, children: Vec<FlowNodeSpec>) -> FlowNodeSpec {
    FlowNodeSpec {
        name: name.into(),
        queue_name: "jobQueue".into(),
        data: json!({"userId": 1}),
        opts: None,
        children,
    }
}

#[tokio::test]
async fn add_job_assigns_sequential_ids() {
    let broker = FakeBroker::new();
    let a = broker
        .add_job("jobQueue", "export", json!({"userId": 1}), JobOpts::default())
        .await
        .unwrap();
    let b = broker
        .add_job("jobQueue", "export", json!({"userId": 1}), JobOpts::default())
        .await
        .unwrap();
    assert_eq!(a, "1");
    assert_eq!(b, "2");
}

#[tokio::test]
async fn job_round_trips_owner_data() {
    let broker = FakeBroker::new();
    let id = broker
        .add_job("jobQueue", "export", json!({"userId": 7, "path": "/tmp"}), JobOpts::default())
        .await
        .unwrap();
    let job = broker.job("jobQueue", &id).await.unwrap().unwrap();
    assert_eq!(job.user_id(), Some(UserId(7)));
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.name, "export");
}

#[tokio::test]
async fn unknown_job_is_none() {
    let broker = FakeBroker::new();
    let missing = broker.job("jobQueue", &JobId::from_string("404")).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn remove_job_is_idempotent() {
    let broker = FakeBroker::new();
    let id = broker
        .add_job("jobQueue", "export", json!({}), JobOpts::default())
        .await
        .unwrap();
    assert!(broker.remove_job("jobQueue", &id).await.unwrap());
    assert!(!broker.remove_job("jobQueue", &id).await.unwrap());
}

#[tokio::test]
async fn flow_parents_wait_on_children() {
    let broker = FakeBroker::new();
    let root = spec("parent", vec![spec("c1", vec![]), spec("c2", vec![])]);
    let root_id = broker.add_flow(&root).await.unwrap();

    let parent = broker.job("jobQueue", &root_id).await.unwrap().unwrap();
    assert_eq!(parent.state, JobState::WaitingChildren);

    let waiting = broker
        .jobs_in_states("jobQueue", &[JobState::Waiting])
        .await
        .unwrap();
    assert_eq!(waiting.len(), 2);
}

#[tokio::test]
async fn completing_all_children_releases_parent() {
    let broker = FakeBroker::new();
    let root = spec("parent", vec![spec("c1", vec![]), spec("c2", vec![])]);
    let root_id = broker.add_flow(&root).await.unwrap();
    let children: Vec<JobId> = broker
        .jobs_in_states("jobQueue", &[JobState::Waiting])
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();

    broker.complete_job("jobQueue", &children[0], json!({})).await.unwrap();
    let parent = broker.job("jobQueue", &root_id).await.unwrap().unwrap();
    assert_eq!(parent.state, JobState::WaitingChildren);

    broker.complete_job("jobQueue", &children[1], json!({})).await.unwrap();
    let parent = broker.job("jobQueue", &root_id).await.unwrap().unwrap();
    assert_eq!(parent.state, JobState::Waiting);
    assert!(broker.waiting_ids("jobQueue").contains(&root_id.to_string()));
}

#[tokio::test]
async fn cascade_removal_reports_each_job() {
    let broker = FakeBroker::new();
    let root = spec("parent", vec![spec("c1", vec![]), spec("c2", vec![])]);
    let root_id = broker.add_flow(&root).await.unwrap();

    let removed = broker.remove_job_cascade("jobQueue", &root_id).await.unwrap();
    assert_eq!(removed.len(), 3);
    assert!(removed.iter().all(|r| r.status == RemovalStatus::Success));
    assert_eq!(broker.job_count("jobQueue"), 0);

    // Removing again reports not_found for the root.
    let removed = broker.remove_job_cascade("jobQueue", &root_id).await.unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].status, RemovalStatus::NotFound);
}

#[tokio::test]
async fn events_delivered_in_order() {
    let broker = FakeBroker::new();
    let id = broker
        .add_job("jobQueue", "export", json!({"userId": 1}), JobOpts::default())
        .await
        .unwrap();
    let mut rx = broker.subscribe("jobQueue").await.unwrap();

    broker.report_progress("jobQueue", &id, json!(50)).await.unwrap();
    broker.complete_job("jobQueue", &id, json!({"ok": true})).await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, QueueEventKind::Progress);
    assert_eq!(first.payload, json!(50));
    let second = rx.recv().await.unwrap();
    assert_eq!(second.kind, QueueEventKind::Completed);
    assert_eq!(second.job_id, id);
}

#[tokio::test]
async fn events_scoped_to_subscribed_queue() {
    let broker = FakeBroker::new();
    let id = broker
        .add_job("webhooks", "deliver", json!({}), JobOpts::default())
        .await
        .unwrap();
    let mut rx = broker.subscribe("jobQueue").await.unwrap();
    broker.complete_job("webhooks", &id, json!({})).await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn fail_requeues_while_attempts_remain() {
    let broker = FakeBroker::new();
    let opts = JobOpts { attempts: Some(3), ..JobOpts::default() };
    let id = broker.add_job("webhooks", "deliver", json!({}), opts).await.unwrap();

    broker.fail_job("webhooks", &id, "timeout").await.unwrap();
    let job = broker.job("webhooks", &id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.attempts_made, 1);

    broker.fail_job("webhooks", &id, "timeout").await.unwrap();
    broker.fail_job("webhooks", &id, "timeout").await.unwrap();
    let job = broker.job("webhooks", &id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.failed_reason.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn fetch_next_activates_in_fifo_order() {
    let broker = FakeBroker::new();
    let first = broker.add_job("webhooks", "a", json!({}), JobOpts::default()).await.unwrap();
    let _second = broker.add_job("webhooks", "b", json!({}), JobOpts::default()).await.unwrap();

    let job = broker
        .fetch_next("webhooks", Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.id, first);
    assert_eq!(job.state, JobState::Active);

    let record = broker.job("webhooks", &first).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Active);
    assert!(record.processed_on.is_some());
}

#[tokio::test]
async fn fetch_next_empty_returns_none() {
    let broker = FakeBroker::new();
    let none = broker.fetch_next("webhooks", Duration::from_millis(1)).await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn scheduler_upsert_is_idempotent() {
    let broker = FakeBroker::new();
    let record = ScheduleRecord {
        key: SchedulerKey::compose(UserId(1), "daily", 123),
        queue: "schedQueue".into(),
        job_name: "daily".into(),
        template: jf_core::ScheduleTemplate { data: json!({"userId": 1}), opts: JobOpts::default() },
        repeat: jf_core::RepeatOpts {
            pattern: Some("0 0 * * *".into()),
            every: None,
            limit: None,
            start_date: None,
            end_date: None,
            tz: None,
        },
        next: None,
        iteration_count: 0,
    };
    broker.upsert_scheduler("schedQueue", record.clone()).await.unwrap();
    broker.upsert_scheduler("schedQueue", record.clone()).await.unwrap();

    let listed = broker.schedulers("schedQueue").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].next.is_some());

    assert!(broker.remove_scheduler("schedQueue", &record.key).await.unwrap());
    assert!(!broker.remove_scheduler("schedQueue", &record.key).await.unwrap());
}
