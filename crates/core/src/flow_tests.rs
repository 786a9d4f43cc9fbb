// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use proptest::prelude::*;
use serde_json::json;

fn node(name: &str, children: Vec<FlowNodeSpec>) -> FlowNodeSpec {
    FlowNodeSpec {
        name: name.into(),
        queue_name: "jobQueue".into(),
        data: json!({}),
        opts: None,
        children,
    }
}

fn three_job_request() -> FlowCreateRequest {
    FlowCreateRequest {
        flowname: "nightly-export".into(),
        root: node("parent", vec![node("c1", vec![]), node("c2", vec![])]),
    }
}

fn update(job_id: &str, status: JobState) -> ProgressUpdate {
    ProgressUpdate {
        job_id: JobId::from_string(job_id),
        status,
        job_name: Some(job_id.to_string()),
        queue_name: Some("jobQueue".into()),
        result: None,
        error: None,
        progress: None,
        started_at: None,
    }
}

#[test]
fn count_jobs_walks_the_tree() {
    assert_eq!(three_job_request().root.count_jobs(), 3);
    assert_eq!(node("solo", vec![]).count_jobs(), 1);
    let nested = node("a", vec![node("b", vec![node("c", vec![])])]);
    assert_eq!(nested.count_jobs(), 3);
}

#[test]
fn validate_rejects_excessive_depth() {
    let mut tree = node("leaf", vec![]);
    for i in 0..MAX_FLOW_DEPTH {
        tree = node(&format!("level{i}"), vec![tree]);
    }
    assert_eq!(tree.validate(), Err(FlowTreeError::DepthExceeded));
}

#[test]
fn validate_accepts_depth_at_bound() {
    let mut tree = node("leaf", vec![]);
    for i in 0..(MAX_FLOW_DEPTH - 1) {
        tree = node(&format!("level{i}"), vec![tree]);
    }
    assert_eq!(tree.validate(), Ok(()));
}

#[test]
fn validate_rejects_empty_names() {
    let tree = node("parent", vec![node("", vec![])]);
    assert_eq!(tree.validate(), Err(FlowTreeError::EmptyJobName(1)));
}

#[test]
fn inject_metadata_reaches_every_node() {
    let mut root = three_job_request().root;
    let flow_id = FlowId::from_string("flow_1_abc");
    root.inject_metadata(&flow_id, "nightly-export", UserId(7), 999);

    fn check(node: &FlowNodeSpec) {
        assert_eq!(node.data["userId"], json!(7));
        assert_eq!(node.data["_flowMetadata"]["flowId"], json!("flow_1_abc"));
        assert_eq!(node.data["_flowMetadata"]["parentFlowName"], json!("nightly-export"));
        assert_eq!(node.data["_flowMetadata"]["injectedAt"], json!(999));
        for child in &node.children {
            check(child);
        }
    }
    check(&root);
}

#[test]
fn inject_metadata_replaces_non_object_data() {
    let mut spec = node("x", vec![]);
    spec.data = json!("scalar");
    spec.inject_metadata(&FlowId::from_string("flow_1_a"), "f", UserId(1), 1);
    assert!(spec.data.is_object());
    assert_eq!(spec.data["userId"], json!(1));
}

#[test]
fn initialize_counts_root_as_active() {
    let progress = FlowProgress::initialize(3);
    assert_eq!(progress.summary.total, 3);
    assert_eq!(progress.summary.active, 1);
    assert_eq!(progress.summary.waiting, 2);
    assert_eq!(progress.summary.completed, 0);
    assert_eq!(progress.summary.percentage, 0);
    assert!(progress.jobs.is_empty());
}

#[test]
fn initialize_single_job_flow() {
    let progress = FlowProgress::initialize(1);
    assert_eq!(progress.summary.active, 1);
    assert_eq!(progress.summary.waiting, 0);
}

#[test]
fn apply_tracks_job_and_recounts() {
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Active), 100);
    assert_eq!(progress.jobs.len(), 1);
    assert_eq!(progress.summary.active, 1);
    assert_eq!(progress.summary.waiting, 2);
    assert_eq!(progress.derive_status(), FlowStatus::Running);
}

#[test]
fn apply_completed_sets_percentage() {
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Completed), 100);
    assert_eq!(progress.summary.completed, 1);
    assert_eq!(progress.summary.percentage, 33);
    assert_eq!(progress.summary.waiting, 2);
}

#[test]
fn premature_completion_guard() {
    // All tracked jobs completed but two jobs never reported: still running.
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Completed), 100);
    assert_eq!(progress.derive_status(), FlowStatus::Running);
}

#[test]
fn completes_only_when_all_reported_completed() {
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Completed), 100);
    progress.apply(&update("c2", JobState::Completed), 110);
    assert_eq!(progress.derive_status(), FlowStatus::Running);
    progress.apply(&update("parent", JobState::Completed), 120);
    assert_eq!(progress.summary.completed, 3);
    assert_eq!(progress.summary.waiting, 0);
    assert_eq!(progress.summary.percentage, 100);
    assert_eq!(progress.derive_status(), FlowStatus::Completed);
}

#[test]
fn failed_job_fails_the_flow() {
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Failed), 100);
    assert_eq!(progress.derive_status(), FlowStatus::Failed);
}

#[test]
fn stuck_job_fails_the_flow() {
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Stuck), 100);
    assert_eq!(progress.summary.stuck, 1);
    assert_eq!(progress.derive_status(), FlowStatus::Failed);
}

#[test]
fn last_writer_wins_per_job() {
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Active), 100);
    progress.apply(&update("c1", JobState::Completed), 200);
    assert_eq!(progress.jobs.len(), 1);
    assert_eq!(progress.summary.active, 0);
    assert_eq!(progress.summary.completed, 1);
}

#[test]
fn started_at_preserved_across_updates() {
    let mut progress = FlowProgress::initialize(2);
    let mut first = update("c1", JobState::Active);
    first.started_at = Some(50);
    progress.apply(&first, 100);
    progress.apply(&update("c1", JobState::Completed), 200);
    let entry = &progress.jobs[&JobId::from_string("c1")];
    assert_eq!(entry.started_at, Some(50));
    assert_eq!(entry.completed_at, Some(200));
}

#[test]
fn terminal_statuses_stamp_completed_at() {
    let mut progress = FlowProgress::initialize(2);
    progress.apply(&update("c1", JobState::Failed), 321);
    assert_eq!(progress.jobs[&JobId::from_string("c1")].completed_at, Some(321));

    progress.apply(&update("c2", JobState::Active), 400);
    assert_eq!(progress.jobs[&JobId::from_string("c2")].completed_at, None);
}

#[test]
fn name_and_queue_preserved_when_update_omits_them() {
    let mut progress = FlowProgress::initialize(2);
    progress.apply(&update("c1", JobState::Active), 100);
    let mut bare = ProgressUpdate {
        job_id: JobId::from_string("c1"),
        status: JobState::Completed,
        job_name: None,
        queue_name: None,
        result: None,
        error: None,
        progress: None,
        started_at: None,
    };
    bare.result = Some(json!({"ok": true}));
    progress.apply(&bare, 200);
    let entry = &progress.jobs[&JobId::from_string("c1")];
    assert_eq!(entry.name, "c1");
    assert_eq!(entry.queue_name, "jobQueue");
    assert_eq!(entry.result, Some(json!({"ok": true})));
}

#[test]
fn tracked_waiting_report_reduces_untracked_pool() {
    // A job that reports "waiting" is tracked, so it leaves the untracked
    // pool without joining any status counter; the sum invariant still holds.
    let mut progress = FlowProgress::initialize(3);
    progress.apply(&update("c1", JobState::Waiting), 100);
    assert_eq!(progress.jobs.len(), 1);
    assert_eq!(progress.summary.waiting, 2);
    assert_eq!(progress.summary.counted(), 2);
}

#[test]
fn summary_serializes_waiting_children_key() {
    let progress = FlowProgress::initialize(1);
    let value = serde_json::to_value(&progress.summary).unwrap();
    assert!(value.get("waiting-children").is_some());
}

#[test]
fn empty_flow_percentage_is_zero() {
    let progress = FlowProgress::initialize(0);
    assert_eq!(progress.summary.percentage, 0);
}

#[test]
fn flow_from_request_is_pending() {
    let clock = FakeClock::new();
    let flow = Flow::from_request(
        FlowId::mint(clock.epoch_ms()),
        &three_job_request(),
        UserId(1),
        &clock,
    );
    assert_eq!(flow.status, FlowStatus::Pending);
    assert_eq!(flow.name, "parent");
    assert_eq!(flow.queue_name, "jobQueue");
    assert_eq!(flow.progress.summary.total, 3);
    assert!(flow.root_job_id.is_none());
    assert!(flow.started_at.is_none());
}

#[test]
fn as_create_request_round_trip() {
    let clock = FakeClock::new();
    let request = three_job_request();
    let flow = Flow::from_request(FlowId::mint(1), &request, UserId(1), &clock);
    assert_eq!(flow.as_create_request(), request);
}

#[test]
fn flow_status_stickiness_flags() {
    assert!(FlowStatus::Completed.is_terminal());
    assert!(FlowStatus::Failed.is_terminal());
    assert!(!FlowStatus::Running.is_terminal());
    assert!(!FlowStatus::Pending.is_terminal());
}

fn arb_state() -> impl Strategy<Value = JobState> {
    prop_oneof![
        Just(JobState::Waiting),
        Just(JobState::Active),
        Just(JobState::Completed),
        Just(JobState::Failed),
        Just(JobState::Delayed),
        Just(JobState::WaitingChildren),
        Just(JobState::Paused),
        Just(JobState::Stuck),
    ]
}

proptest! {
    /// |jobs| + waiting == total after any sequence of updates.
    #[test]
    fn tracked_plus_waiting_equals_total(
        total in 1u32..12,
        updates in proptest::collection::vec((0u32..12, arb_state()), 0..40),
    ) {
        let mut progress = FlowProgress::initialize(total);
        for (slot, state) in updates {
            // Job ids drawn from the flow's population.
            let id = format!("job{}", slot % total);
            progress.apply(&update(&id, state), 100);
            prop_assert_eq!(
                progress.jobs.len() as u32 + progress.summary.waiting,
                progress.summary.total
            );
            prop_assert_eq!(progress.summary.counted(), progress.summary.total);
            let expected_pct =
                ((progress.summary.completed as f64 / total as f64) * 100.0).round() as u32;
            prop_assert_eq!(progress.summary.percentage, expected_pct);
        }
    }

    /// The flow completes iff every one of the N distinct jobs reported completed.
    #[test]
    fn completion_requires_all_jobs(
        total in 1u32..8,
        completed_slots in proptest::collection::btree_set(0u32..8, 0..8),
    ) {
        let mut progress = FlowProgress::initialize(total);
        let slots: Vec<u32> = completed_slots.into_iter().filter(|s| *s < total).collect();
        for slot in &slots {
            progress.apply(&update(&format!("job{slot}"), JobState::Completed), 100);
        }
        let expect_complete = slots.len() as u32 == total;
        prop_assert_eq!(
            progress.derive_status() == FlowStatus::Completed,
            expect_complete
        );
    }
}
