// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn base_hash() -> HashMap<String, String> {
    let mut hash = HashMap::new();
    hash.insert(F_NAME.into(), "export".into());
    hash.insert(F_STATE.into(), "waiting".into());
    hash.insert(F_TIMESTAMP.into(), "1000000".into());
    hash.insert(F_DATA.into(), r#"{"userId":1,"path":"/tmp"}"#.into());
    hash
}

#[test]
fn round_trip_through_fields() {
    let opts = JobOpts::default();
    let fields =
        new_job_fields("export", &json!({"userId": 1}), &opts, JobState::Waiting, 1_000_000)
            .unwrap();
    let hash: HashMap<String, String> = fields.into_iter().collect();
    let job = job_from_hash("jobQueue", &JobId::from_string("7"), &hash).unwrap();
    assert_eq!(job.name, "export");
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.timestamp, 1_000_000);
    assert_eq!(job.data, json!({"userId": 1}));
    assert_eq!(job.opts, opts);
    assert_eq!(job.attempts_made, 0);
}

#[test]
fn optional_fields_parse_when_present() {
    let mut hash = base_hash();
    hash.insert(F_STATE.into(), "completed".into());
    hash.insert(F_RETURNVALUE.into(), r#"{"ok":true}"#.into());
    hash.insert(F_PROCESSED_ON.into(), "1000100".into());
    hash.insert(F_FINISHED_ON.into(), "1000200".into());
    hash.insert(F_ATTEMPTS_MADE.into(), "2".into());
    let job = job_from_hash("jobQueue", &JobId::from_string("7"), &hash).unwrap();
    assert_eq!(job.returnvalue, Some(json!({"ok": true})));
    assert_eq!(job.processed_on, Some(1_000_100));
    assert_eq!(job.finished_on, Some(1_000_200));
    assert_eq!(job.attempts_made, 2);
}

#[test]
fn waiting_children_state_parses() {
    let mut hash = base_hash();
    hash.insert(F_STATE.into(), "waiting-children".into());
    let job = job_from_hash("jobQueue", &JobId::from_string("7"), &hash).unwrap();
    assert_eq!(job.state, JobState::WaitingChildren);
}

#[test]
fn missing_name_is_malformed() {
    let mut hash = base_hash();
    hash.remove(F_NAME);
    let err = job_from_hash("jobQueue", &JobId::from_string("7"), &hash).unwrap_err();
    assert!(matches!(err, BrokerError::MalformedJob { .. }));
}

#[test]
fn unknown_state_is_malformed() {
    let mut hash = base_hash();
    hash.insert(F_STATE.into(), "exploded".into());
    let err = job_from_hash("jobQueue", &JobId::from_string("7"), &hash).unwrap_err();
    assert!(matches!(err, BrokerError::MalformedJob { .. }));
}

#[test]
fn missing_data_defaults_to_null() {
    let mut hash = base_hash();
    hash.remove(F_DATA);
    let job = job_from_hash("jobQueue", &JobId::from_string("7"), &hash).unwrap();
    assert_eq!(job.data, Value::Null);
}
