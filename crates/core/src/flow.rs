// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow trees, aggregated progress, and the flow status machine.
//!
//! A flow is a tree of jobs across one or more queues tracked as a single
//! logical unit. The progress summary counts *tracked* jobs (those that have
//! reported at least once) by status; `waiting` is always derived from
//! tracked-vs-total, never from status counts.

use crate::clock::Clock;
use crate::id::{FlowId, JobId, UserId};
use crate::status::JobState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Maximum nesting depth of a flow tree.
pub const MAX_FLOW_DEPTH: usize = 32;

/// Errors from flow tree validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowTreeError {
    #[error("flow tree exceeds maximum depth of {MAX_FLOW_DEPTH}")]
    DepthExceeded,

    #[error("flow job at depth {0} has an empty name")]
    EmptyJobName(usize),
}

/// One job node in a flow creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNodeSpec {
    pub name: String,
    pub queue_name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FlowNodeSpec>,
}

impl FlowNodeSpec {
    /// Number of jobs in this subtree (the node itself plus all descendants).
    pub fn count_jobs(&self) -> u32 {
        1 + self.children.iter().map(FlowNodeSpec::count_jobs).sum::<u32>()
    }

    /// Validate tree shape: bounded depth, non-empty job names.
    pub fn validate(&self) -> Result<(), FlowTreeError> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> Result<(), FlowTreeError> {
        if depth >= MAX_FLOW_DEPTH {
            return Err(FlowTreeError::DepthExceeded);
        }
        if self.name.trim().is_empty() {
            return Err(FlowTreeError::EmptyJobName(depth));
        }
        for child in &self.children {
            child.validate_at(depth + 1)?;
        }
        Ok(())
    }

    /// Inject owner and flow metadata into every job's payload so downstream
    /// workers can report back against the right flow.
    pub fn inject_metadata(
        &mut self,
        flow_id: &FlowId,
        parent_flow_name: &str,
        user: UserId,
        injected_at_ms: u64,
    ) {
        if !self.data.is_object() {
            self.data = Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.data.as_object_mut() {
            obj.insert(crate::job::USER_ID_FIELD.into(), Value::from(user.as_u64()));
            obj.insert(
                crate::job::FLOW_METADATA_FIELD.into(),
                serde_json::json!({
                    "flowId": flow_id.as_str(),
                    "parentFlowName": parent_flow_name,
                    "injectedAt": injected_at_ms,
                }),
            );
        }
        for child in &mut self.children {
            child.inject_metadata(flow_id, parent_flow_name, user, injected_at_ms);
        }
    }
}

/// Request to create a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowCreateRequest {
    pub flowname: String,
    pub root: FlowNodeSpec,
}

/// Persisted tree structure of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStructure {
    pub root: FlowNodeSpec,
}

/// Aggregate status of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl FlowStatus {
    /// Terminal states are sticky; no resurrection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowStatus::Completed | FlowStatus::Failed)
    }
}

crate::simple_display! {
    FlowStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Tracked progress of one job inside a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub name: String,
    pub queue_name: String,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

/// Counts of tracked jobs by status, plus the untracked-waiting count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub delayed: u32,
    pub active: u32,
    /// Jobs in the tree that have not reported yet.
    pub waiting: u32,
    #[serde(rename = "waiting-children")]
    pub waiting_children: u32,
    pub paused: u32,
    pub stuck: u32,
    pub percentage: u32,
}

impl ProgressSummary {
    /// Sum of all per-status counters plus untracked waiting.
    pub fn counted(&self) -> u32 {
        self.completed
            + self.failed
            + self.delayed
            + self.active
            + self.waiting
            + self.waiting_children
            + self.paused
            + self.stuck
    }
}

/// A progress report for one job in a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
}

/// Aggregated flow progress: per-job entries plus the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowProgress {
    pub jobs: HashMap<JobId, JobProgress>,
    pub summary: ProgressSummary,
}

impl FlowProgress {
    /// Initial progress for a freshly created flow: the root counts as
    /// active, everything else as untracked waiting.
    pub fn initialize(total: u32) -> Self {
        Self {
            jobs: HashMap::new(),
            summary: ProgressSummary {
                total,
                active: 1,
                waiting: total.saturating_sub(1),
                ..ProgressSummary::default()
            },
        }
    }

    /// Apply one report: upsert the job entry (last writer wins per job id)
    /// and recompute the summary from the tracked set.
    pub fn apply(&mut self, update: &ProgressUpdate, now_ms: u64) {
        let previous = self.jobs.get(&update.job_id);
        let started_at = update
            .started_at
            .or_else(|| previous.and_then(|p| p.started_at));
        let completed_at = if matches!(update.status, JobState::Completed | JobState::Failed) {
            Some(now_ms)
        } else {
            previous.and_then(|p| p.completed_at)
        };
        let entry = JobProgress {
            name: update
                .job_name
                .clone()
                .or_else(|| previous.map(|p| p.name.clone()))
                .unwrap_or_default(),
            queue_name: update
                .queue_name
                .clone()
                .or_else(|| previous.map(|p| p.queue_name.clone()))
                .unwrap_or_default(),
            status: update.status,
            result: update.result.clone(),
            error: update.error.clone(),
            progress: update.progress.clone(),
            started_at,
            completed_at,
        };
        self.jobs.insert(update.job_id.clone(), entry);
        self.recount();
    }

    /// Recompute all counters from the tracked jobs map.
    ///
    /// `waiting` is always `total − tracked`, never a status count.
    fn recount(&mut self) {
        let total = self.summary.total;
        let mut summary = ProgressSummary { total, ..ProgressSummary::default() };
        for job in self.jobs.values() {
            match job.status {
                JobState::Completed => summary.completed += 1,
                JobState::Failed => summary.failed += 1,
                JobState::Delayed => summary.delayed += 1,
                JobState::Active => summary.active += 1,
                JobState::WaitingChildren => summary.waiting_children += 1,
                JobState::Paused => summary.paused += 1,
                JobState::Stuck => summary.stuck += 1,
                // A tracked job reporting "waiting" still counts against the
                // untracked pool below, not here.
                JobState::Waiting => {}
            }
        }
        summary.waiting = total.saturating_sub(self.jobs.len() as u32);
        summary.percentage = if total == 0 {
            0
        } else {
            ((summary.completed as f64 / total as f64) * 100.0).round() as u32
        };
        if summary.counted() != total {
            tracing::warn!(
                total,
                counted = summary.counted(),
                tracked = self.jobs.len(),
                "flow progress counters do not sum to total"
            );
        }
        self.summary = summary;
    }

    /// Derive the flow status from the current summary.
    ///
    /// Callers are responsible for terminal stickiness: a flow already
    /// `completed` or `failed` never leaves that state.
    pub fn derive_status(&self) -> FlowStatus {
        let s = &self.summary;
        if s.failed > 0 || s.stuck > 0 {
            return FlowStatus::Failed;
        }
        if s.total > 0 && s.completed == s.total && s.waiting == 0 {
            return FlowStatus::Completed;
        }
        if s.active > 0
            || s.delayed > 0
            || s.waiting_children > 0
            || s.paused > 0
            || !self.jobs.is_empty()
        {
            return FlowStatus::Running;
        }
        FlowStatus::Pending
    }
}

/// Persisted flow row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub flow_id: FlowId,
    pub flowname: String,
    /// Root job name.
    pub name: String,
    /// Root queue.
    pub queue_name: String,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_job_id: Option<JobId>,
    pub status: FlowStatus,
    pub job_structure: JobStructure,
    pub progress: FlowProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Flow {
    /// Build the pending row for a validated creation request.
    pub fn from_request(
        flow_id: FlowId,
        request: &FlowCreateRequest,
        user: UserId,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.now_utc();
        let total = request.root.count_jobs();
        Self {
            flow_id,
            flowname: request.flowname.clone(),
            name: request.root.name.clone(),
            queue_name: request.root.queue_name.clone(),
            user_id: user,
            root_job_id: None,
            status: FlowStatus::Pending,
            job_structure: JobStructure { root: request.root.clone() },
            progress: FlowProgress::initialize(total),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Reconstruct the creation request from the persisted structure.
    pub fn as_create_request(&self) -> FlowCreateRequest {
        FlowCreateRequest {
            flowname: self.flowname.clone(),
            root: self.job_structure.root.clone(),
        }
    }
}

/// Disposition of one job during cascade deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStatus {
    Success,
    NotFound,
    Failed,
}

crate::simple_display! {
    RemovalStatus {
        Success => "success",
        NotFound => "not_found",
        Failed => "failed",
    }
}

/// Per-job record produced while deleting a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedJob {
    pub job_id: JobId,
    pub queue_name: String,
    pub status: RemovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary returned from flow deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDeleteSummary {
    pub total: u32,
    pub successful: u32,
    pub failed: Vec<JobId>,
    pub details: Vec<RemovedJob>,
}

crate::builder! {
    pub struct FlowBuilder => Flow {
        into {
            flow_id: FlowId = "flow_1000000_abcdefghi",
            flowname: String = "test-flow",
            name: String = "parent",
            queue_name: String = "jobQueue",
        }
        set {
            user_id: UserId = UserId(1),
            status: FlowStatus = FlowStatus::Running,
            job_structure: JobStructure = JobStructure {
                root: FlowNodeSpec {
                    name: "parent".into(),
                    queue_name: "jobQueue".into(),
                    data: serde_json::json!({}),
                    opts: None,
                    children: Vec::new(),
                },
            },
            progress: FlowProgress = FlowProgress::initialize(1),
        }
        option {
            root_job_id: JobId = None,
            result: Value = None,
            error: String = None,
            started_at: DateTime<Utc> = None,
            completed_at: DateTime<Utc> = None,
        }
        computed {
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
