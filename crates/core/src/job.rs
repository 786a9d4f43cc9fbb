// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker job records, submission options, and the client-facing job view.

use crate::id::{JobId, UserId};
use crate::status::JobState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data field injected into every job payload to mark the owner.
pub const USER_ID_FIELD: &str = "userId";

/// Data field carrying flow metadata on jobs that belong to a flow.
pub const FLOW_METADATA_FIELD: &str = "_flowMetadata";

/// Retention policy for finished jobs: keep the most recent `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepPolicy {
    pub count: u32,
}

/// Options accepted on job submission.
///
/// Known fields are typed; anything else a client sends rides along in the
/// opaque bag and is handed to the broker untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    /// Delay before the job becomes eligible, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_on_complete: Option<KeepPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_on_fail: Option<KeepPolicy>,

    /// Unknown fields, retained verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Default for JobOpts {
    fn default() -> Self {
        Self {
            attempts: None,
            delay: None,
            priority: None,
            remove_on_complete: Some(KeepPolicy { count: 3 }),
            remove_on_fail: Some(KeepPolicy { count: 5 }),
            extra: serde_json::Map::new(),
        }
    }
}

impl JobOpts {
    /// Validate client-supplied options by decoding them.
    ///
    /// `None`/`null` and anything that fails to decode as an options object
    /// fall back to the defaults; the submission itself still succeeds.
    pub fn sanitize(raw: Option<Value>) -> JobOpts {
        let value = match raw {
            Some(v) if !v.is_null() => v,
            _ => return JobOpts::default(),
        };
        if !value.is_object() {
            tracing::warn!(?value, "job opts is not an object, using defaults");
            return JobOpts::default();
        }
        match serde_json::from_value::<JobOpts>(value) {
            Ok(mut opts) => {
                if opts.remove_on_complete.is_none() {
                    opts.remove_on_complete = Some(KeepPolicy { count: 3 });
                }
                if opts.remove_on_fail.is_none() {
                    opts.remove_on_fail = Some(KeepPolicy { count: 5 });
                }
                opts
            }
            Err(err) => {
                tracing::warn!(error = %err, "invalid job opts, using defaults");
                JobOpts::default()
            }
        }
    }
}

/// A job as the broker stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub name: String,
    pub queue: String,
    pub data: Value,
    pub opts: JobOpts,
    pub state: JobState,
    #[serde(default)]
    pub progress: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returnvalue: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_on: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_on: Option<u64>,
    #[serde(default)]
    pub attempts_made: u32,
}

impl JobRecord {
    /// Owner injected into the payload at submission. Jobs without one are
    /// visible to nobody.
    pub fn user_id(&self) -> Option<UserId> {
        self.data
            .get(USER_ID_FIELD)
            .and_then(Value::as_u64)
            .map(UserId)
    }

    /// Flow this job belongs to, when flow metadata was injected at creation.
    pub fn flow_id(&self) -> Option<&str> {
        self.data
            .get(FLOW_METADATA_FIELD)
            .and_then(|m| m.get("flowId"))
            .and_then(Value::as_str)
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id() == Some(user)
    }
}

/// Job timestamps surfaced to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTimestamps {
    pub created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<u64>,
}

/// Client-facing projection of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub progress: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    pub timestamp: JobTimestamps,
}

impl From<&JobRecord> for JobView {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            state: job.state,
            progress: job.progress.clone(),
            result: job.returnvalue.clone(),
            failed_reason: job.failed_reason.clone(),
            timestamp: JobTimestamps {
                created: job.timestamp,
                started: job.processed_on,
                finished: job.finished_on,
            },
        }
    }
}

crate::builder! {
    pub struct JobRecordBuilder => JobRecord {
        into {
            id: JobId = "1",
            name: String = "test-job",
            queue: String = "jobQueue",
        }
        set {
            data: Value = serde_json::json!({"userId": 1}),
            opts: JobOpts = JobOpts::default(),
            state: JobState = JobState::Waiting,
            progress: Value = Value::Null,
            timestamp: u64 = 1_000_000,
            attempts_made: u32 = 0,
        }
        option {
            returnvalue: Value = None,
            failed_reason: String = None,
            processed_on: u64 = None,
            finished_on: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
