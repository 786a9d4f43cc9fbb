// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::flows::FlowService;
use crate::test_support::{alice, fake_registry, RecordingPush};
use jf_broker::{Broker, FakeBroker};
use jf_core::{FakeClock, FlowCreateRequest, FlowNodeSpec, FlowStatus, JobId};
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    demux: EventDemux<FakeClock>,
    flows: Arc<FlowService<FakeClock>>,
    broker: Arc<FakeBroker>,
    push: Arc<RecordingPush>,
}

fn fixture() -> Fixture {
    let (registry, broker) = fake_registry();
    let push = RecordingPush::new();
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    let store = Arc::new(jf_storage::MemoryFlowStore::new());
    let flows = Arc::new(FlowService::new(
        store,
        registry.clone(),
        push.clone(),
        clock,
    ));
    let demux = EventDemux::new(registry, flows.clone(), push.clone());
    Fixture { demux, flows, broker, push }
}

fn event(job_id: &str, kind: QueueEventKind, payload: serde_json::Value) -> QueueEvent {
    QueueEvent {
        queue: PRIMARY_QUEUE.into(),
        job_id: JobId::from_string(job_id),
        kind,
        payload,
    }
}

#[tokio::test]
async fn completed_event_reaches_both_rooms_and_webhook_queue() {
    let f = fixture();
    let id = f
        .broker
        .add_job(
            PRIMARY_QUEUE,
            "export",
            json!({"userId": 1}),
            jf_core::JobOpts::default(),
        )
        .await
        .unwrap();

    f.demux
        .handle_event(&event(id.as_str(), QueueEventKind::Completed, json!({"ok": true})))
        .await
        .unwrap();

    let job_room = f.push.messages_for(&format!("job:{id}"));
    assert_eq!(job_room.len(), 1);
    assert_eq!(job_room[0].event, format!("job:{id}:completed"));

    let user_room = f.push.messages_for("user:1");
    assert_eq!(user_room.len(), 1);
    assert_eq!(user_room[0].event, "job:completed");
    assert_eq!(user_room[0].data["jobId"], json!(id.as_str()));
    assert_eq!(user_room[0].data["jobName"], json!("export"));
    assert_eq!(user_room[0].data["result"], json!({"ok": true}));

    // Exactly one webhook-delivery item was produced.
    assert_eq!(f.broker.job_count(WEBHOOK_QUEUE), 1);
    let delivery_jobs = f
        .broker
        .jobs_in_states(WEBHOOK_QUEUE, &[JobState::Waiting])
        .await
        .unwrap();
    let delivery: WebhookDelivery =
        serde_json::from_value(delivery_jobs[0].data.clone()).unwrap();
    assert_eq!(delivery.id, id.as_str());
    assert_eq!(delivery.user_id, jf_core::UserId(1));
    assert_eq!(delivery.event_type, QueueEventKind::Completed);
    assert_eq!(delivery.result, Some(json!({"ok": true})));
    assert_eq!(delivery_jobs[0].opts.attempts, Some(3));
}

#[tokio::test]
async fn progress_event_carries_progress_payload() {
    let f = fixture();
    let id = f
        .broker
        .add_job(
            PRIMARY_QUEUE,
            "export",
            json!({"userId": 1}),
            jf_core::JobOpts::default(),
        )
        .await
        .unwrap();

    f.demux
        .handle_event(&event(id.as_str(), QueueEventKind::Progress, json!(50)))
        .await
        .unwrap();

    let user_room = f.push.messages_for("user:1");
    assert_eq!(user_room[0].event, "job:progress");
    assert_eq!(user_room[0].data["progress"], json!(50));
}

#[tokio::test]
async fn unknown_job_events_are_dropped() {
    let f = fixture();
    f.demux
        .handle_event(&event("404", QueueEventKind::Completed, json!({})))
        .await
        .unwrap();
    assert!(f.push.events().is_empty());
    assert_eq!(f.broker.job_count(WEBHOOK_QUEUE), 0);
}

#[tokio::test]
async fn ownerless_job_events_are_dropped() {
    let f = fixture();
    let id = f
        .broker
        .add_job(PRIMARY_QUEUE, "orphan", json!({}), jf_core::JobOpts::default())
        .await
        .unwrap();
    f.demux
        .handle_event(&event(id.as_str(), QueueEventKind::Completed, json!({})))
        .await
        .unwrap();
    assert!(f.push.events().is_empty());
    assert_eq!(f.broker.job_count(WEBHOOK_QUEUE), 0);
}

#[tokio::test]
async fn flow_job_events_report_into_the_flow() {
    let f = fixture();
    let request = FlowCreateRequest {
        flowname: "pipeline".into(),
        root: FlowNodeSpec {
            name: "solo".into(),
            queue_name: PRIMARY_QUEUE.into(),
            data: json!({}),
            opts: None,
            children: Vec::new(),
        },
    };
    let flow = f.flows.create_flow(request, &alice()).await.unwrap();
    let root_id = flow.root_job_id.clone().unwrap();

    f.demux
        .handle_event(&event(root_id.as_str(), QueueEventKind::Completed, json!({"ok": true})))
        .await
        .unwrap();

    let flow = f.flows.get_flow(&flow.flow_id).await.unwrap();
    assert_eq!(flow.status, FlowStatus::Completed);
    assert_eq!(flow.progress.summary.completed, 1);
    assert_eq!(flow.result, Some(json!({"ok": true})));
}

#[tokio::test]
async fn failed_flow_job_records_the_error() {
    let f = fixture();
    let request = FlowCreateRequest {
        flowname: "pipeline".into(),
        root: FlowNodeSpec {
            name: "solo".into(),
            queue_name: PRIMARY_QUEUE.into(),
            data: json!({}),
            opts: None,
            children: Vec::new(),
        },
    };
    let flow = f.flows.create_flow(request, &alice()).await.unwrap();
    let root_id = flow.root_job_id.clone().unwrap();

    f.demux
        .handle_event(&event(root_id.as_str(), QueueEventKind::Failed, json!("disk full")))
        .await
        .unwrap();

    let flow = f.flows.get_flow(&flow.flow_id).await.unwrap();
    assert_eq!(flow.status, FlowStatus::Failed);
    assert_eq!(flow.error.as_deref(), Some("disk full"));
}

#[tokio::test]
async fn non_flow_jobs_skip_flow_reporting() {
    let f = fixture();
    let id = f
        .broker
        .add_job(
            PRIMARY_QUEUE,
            "export",
            json!({"userId": 1}),
            jf_core::JobOpts::default(),
        )
        .await
        .unwrap();
    f.demux
        .handle_event(&event(id.as_str(), QueueEventKind::Completed, json!({})))
        .await
        .unwrap();
    assert!(f.flows.flows(None).await.unwrap().is_empty());
}
