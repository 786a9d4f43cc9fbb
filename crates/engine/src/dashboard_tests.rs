// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::scheduler::{ScheduleSubmission, SchedulerService};
use crate::test_support::{alice, bob, fake_registry};
use jf_broker::Broker;
use jf_core::{FakeClock, JobOpts, ScheduleSpec};
use jf_storage::{MemoryWebhookStore, WebhookStore};
use serde_json::json;


struct Fixture {
    dashboard: DashboardService<FakeClock>,
    scheduler: Arc<SchedulerService<FakeClock>>,
    webhooks: Arc<MemoryWebhookStore>,
    broker: Arc<jf_broker::FakeBroker>,
}

fn fixture() -> Fixture {
    let (registry, broker) = fake_registry();
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    let scheduler = Arc::new(SchedulerService::new(registry.clone(), clock));
    let webhooks = Arc::new(MemoryWebhookStore::new());
    let dashboard = DashboardService::new(registry, scheduler.clone(), webhooks.clone());
    Fixture { dashboard, scheduler, webhooks, broker }
}

#[tokio::test]
async fn counts_are_scoped_to_the_caller() {
    let f = fixture();
    for _ in 0..2 {
        f.broker
            .add_job("jobQueue", "export", json!({"userId": 1}), JobOpts::default())
            .await
            .unwrap();
    }
    f.broker
        .add_job("jobQueue", "export", json!({"userId": 2}), JobOpts::default())
        .await
        .unwrap();

    let stats = f.dashboard.stats(&alice()).await.unwrap();
    let job_queue = stats.queues.iter().find(|q| q.queue == "jobQueue").unwrap();
    assert_eq!(job_queue.counts["waiting"], 2);
    assert_eq!(job_queue.total, 2);
    assert_eq!(stats.totals["waiting"], 2);

    let stats = f.dashboard.stats(&bob()).await.unwrap();
    assert_eq!(stats.totals["waiting"], 1);
}

#[tokio::test]
async fn recent_jobs_top_five_with_duration() {
    let f = fixture();
    let mut last_id = None;
    for i in 0..7 {
        f.broker.set_now(1_700_000_000_000 + i * 1000);
        let id = f
            .broker
            .add_job("jobQueue", format!("job{i}").as_str(), json!({"userId": 1}), JobOpts::default())
            .await
            .unwrap();
        last_id = Some(id);
    }
    let newest = last_id.unwrap();
    f.broker
        .fetch_next("jobQueue", std::time::Duration::from_millis(1))
        .await
        .unwrap();
    f.broker.set_now(1_700_000_010_000);
    // Complete the oldest (it was fetched first).
    f.broker
        .complete_job("jobQueue", &jf_core::JobId::from_string("1"), json!({}))
        .await
        .unwrap();

    let stats = f.dashboard.stats(&alice()).await.unwrap();
    assert_eq!(stats.recent_jobs.len(), 5);
    // Newest first.
    assert_eq!(stats.recent_jobs[0].id, newest);
    // The completed one carries a duration once processed and finished.
    let completed = stats.recent_jobs.iter().find(|j| j.id == "1");
    if let Some(job) = completed {
        assert!(job.duration.is_some());
    }
}

#[tokio::test]
async fn schedule_stats_derive_from_owned_schedules() {
    let f = fixture();
    f.scheduler
        .schedule(
            "schedQueue",
            ScheduleSubmission {
                name: "daily".into(),
                data: json!({}),
                opts: None,
                schedule: ScheduleSpec {
                    cron: Some("0 0 * * *".into()),
                    tz: None,
                    repeat: None,
                    start_date: None,
                    end_date: None,
                },
            },
            &alice(),
        )
        .await
        .unwrap();

    let stats = f.dashboard.stats(&alice()).await.unwrap();
    assert_eq!(stats.schedules.total_schedules, 1);
    assert_eq!(stats.schedules.active_schedules, 1);
    let next = stats.schedules.next_scheduled_job.unwrap();
    assert_eq!(next.job_name, "daily");

    let stats = f.dashboard.stats(&bob()).await.unwrap();
    assert_eq!(stats.schedules.total_schedules, 0);
    assert!(stats.schedules.next_scheduled_job.is_none());
}

#[tokio::test]
async fn webhook_stats_use_documented_placeholders() {
    let f = fixture();
    f.webhooks
        .insert(
            jf_core::Webhook::builder()
                .user_id(jf_core::UserId(1))
                .url("http://a.test")
                .build(),
        )
        .await
        .unwrap();
    let mut inactive = jf_core::Webhook::builder()
        .user_id(jf_core::UserId(1))
        .url("http://b.test")
        .build();
    inactive.active = false;
    f.webhooks.insert(inactive).await.unwrap();

    let stats = f.dashboard.stats(&alice()).await.unwrap();
    assert_eq!(stats.webhooks.total_webhooks, 2);
    assert_eq!(stats.webhooks.active_webhooks, 1);
    // Placeholders until a delivery ledger exists.
    assert_eq!(stats.webhooks.delivery_rate, 100);
    assert_eq!(stats.webhooks.total_deliveries, 0);
    assert_eq!(stats.webhooks.failed_deliveries, 0);
}
