// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job hash ↔ record conversion.

use crate::error::BrokerError;
use jf_core::{JobId, JobOpts, JobRecord, JobState};
use serde_json::Value;
use std::collections::HashMap;

pub const F_NAME: &str = "name";
pub const F_DATA: &str = "data";
pub const F_OPTS: &str = "opts";
pub const F_STATE: &str = "state";
pub const F_PROGRESS: &str = "progress";
pub const F_RETURNVALUE: &str = "returnvalue";
pub const F_FAILED_REASON: &str = "failedReason";
pub const F_TIMESTAMP: &str = "timestamp";
pub const F_PROCESSED_ON: &str = "processedOn";
pub const F_FINISHED_ON: &str = "finishedOn";
pub const F_ATTEMPTS_MADE: &str = "attemptsMade";
pub const F_PARENT_ID: &str = "parentId";
pub const F_PARENT_QUEUE: &str = "parentQueue";
pub const F_PENDING_CHILDREN: &str = "pendingChildren";

/// Field pairs for a fresh job hash.
pub fn new_job_fields(
    name: &str,
    data: &Value,
    opts: &JobOpts,
    state: JobState,
    timestamp: u64,
) -> Result<Vec<(String, String)>, BrokerError> {
    Ok(vec![
        (F_NAME.into(), name.to_string()),
        (F_DATA.into(), serde_json::to_string(data)?),
        (F_OPTS.into(), serde_json::to_string(opts)?),
        (F_STATE.into(), state.to_string()),
        (F_TIMESTAMP.into(), timestamp.to_string()),
        (F_ATTEMPTS_MADE.into(), "0".into()),
    ])
}

fn parse_state(raw: &str) -> Option<JobState> {
    match raw {
        "stuck" => Some(JobState::Stuck),
        other => JobState::parse_filter(other),
    }
}

/// Decode a `HGETALL` result into a [`JobRecord`].
pub fn job_from_hash(
    queue: &str,
    id: &JobId,
    hash: &HashMap<String, String>,
) -> Result<JobRecord, BrokerError> {
    let malformed = |reason: &str| BrokerError::MalformedJob {
        queue: queue.to_string(),
        id: id.to_string(),
        reason: reason.to_string(),
    };

    let name = hash.get(F_NAME).ok_or_else(|| malformed("missing name"))?.clone();
    let state = hash
        .get(F_STATE)
        .and_then(|s| parse_state(s))
        .ok_or_else(|| malformed("missing or unknown state"))?;
    let timestamp = hash
        .get(F_TIMESTAMP)
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| malformed("missing timestamp"))?;

    let data = hash
        .get(F_DATA)
        .map(|raw| serde_json::from_str(raw))
        .transpose()?
        .unwrap_or(Value::Null);
    let opts = hash
        .get(F_OPTS)
        .map(|raw| serde_json::from_str(raw))
        .transpose()?
        .unwrap_or_default();
    let progress = hash
        .get(F_PROGRESS)
        .map(|raw| serde_json::from_str(raw))
        .transpose()?
        .unwrap_or(Value::Null);
    let returnvalue = hash
        .get(F_RETURNVALUE)
        .map(|raw| serde_json::from_str(raw))
        .transpose()?;

    Ok(JobRecord {
        id: id.clone(),
        name,
        queue: queue.to_string(),
        data,
        opts,
        state,
        progress,
        returnvalue,
        failed_reason: hash.get(F_FAILED_REASON).cloned(),
        timestamp,
        processed_on: hash.get(F_PROCESSED_ON).and_then(|s| s.parse().ok()),
        finished_on: hash.get(F_FINISHED_ON).and_then(|s| s.parse().ok()),
        attempts_made: hash
            .get(F_ATTEMPTS_MADE)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
    })
}

/// Reference to a child job, stored on the parent for cascade deletion.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChildRef {
    pub queue: String,
    pub id: String,
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod tests;
