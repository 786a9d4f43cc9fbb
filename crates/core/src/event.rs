// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue events, push-channel messages, and rooms.
//!
//! Broker events carry only `{queue, jobId, kind, payload}`; anything richer
//! (job name, owner) is loaded by the consumer. Push messages are the wire
//! form delivered to subscribed clients; scoped variants embed the target id
//! in the event name.

use crate::flow::{Flow, FlowDeleteSummary, ProgressUpdate};
use crate::id::{FlowId, JobId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of queue event the broker emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEventKind {
    Progress,
    Completed,
    Failed,
}

crate::simple_display! {
    QueueEventKind {
        Progress => "progress",
        Completed => "completed",
        Failed => "failed",
    }
}

/// An event emitted by the broker for a job state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    pub queue: String,
    pub job_id: JobId,
    pub kind: QueueEventKind,
    /// Progress value, return value, or failure reason depending on `kind`.
    #[serde(default)]
    pub payload: Value,
}

/// A push-channel room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    User(UserId),
    Flow(FlowId),
    Job(JobId),
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{id}"),
            Room::Flow(id) => write!(f, "flow:{id}"),
            Room::Job(id) => write!(f, "job:{id}"),
        }
    }
}

/// Wire form of a push-channel event: `{event, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub event: String,
    pub data: Value,
}

impl PushMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }

    pub fn flow_created(flow: &Flow) -> Self {
        Self::new("flow:created", flow_payload(flow))
    }

    pub fn flow_updated(flow: &Flow) -> Self {
        Self::new("flow:updated", flow_payload(flow))
    }

    /// Scoped counterpart of `flow:updated`, delivered to the flow room.
    pub fn flow_progress(flow: &Flow) -> Self {
        Self::new("flow:progress", flow_payload(flow))
    }

    pub fn flow_job_updated(flow_id: &FlowId, update: &ProgressUpdate) -> Self {
        Self::new(
            "flow:job:updated",
            serde_json::json!({ "flowId": flow_id, "update": update }),
        )
    }

    /// Scoped counterpart of `flow:job:updated`, delivered to the flow room.
    pub fn flow_job_progress(flow_id: &FlowId, update: &ProgressUpdate) -> Self {
        Self::new(
            "flow:job:progress",
            serde_json::json!({ "flowId": flow_id, "update": update }),
        )
    }

    pub fn flow_completed(flow: &Flow) -> Self {
        Self::new("flow:completed", flow_payload(flow))
    }

    /// Scoped counterpart of `flow:completed`, delivered to the flow room.
    pub fn flow_finished(flow: &Flow) -> Self {
        Self::new("flow:finished", flow_payload(flow))
    }

    pub fn flow_deleted(flow_id: &FlowId, summary: &FlowDeleteSummary) -> Self {
        Self::new(
            "flow:deleted",
            serde_json::json!({ "flowId": flow_id, "summary": summary }),
        )
    }

    /// Per-user job event, e.g. `job:completed`.
    pub fn job_event(kind: QueueEventKind, job_id: &JobId, job_name: &str, payload: &Value) -> Self {
        Self::new(format!("job:{kind}"), job_payload(kind, job_id, job_name, payload))
    }

    /// Per-job scoped counterpart, e.g. `job:42:completed`.
    pub fn job_event_scoped(
        kind: QueueEventKind,
        job_id: &JobId,
        job_name: &str,
        payload: &Value,
    ) -> Self {
        Self::new(
            format!("job:{job_id}:{kind}"),
            job_payload(kind, job_id, job_name, payload),
        )
    }
}

fn flow_payload(flow: &Flow) -> Value {
    serde_json::json!({
        "flowId": flow.flow_id,
        "flowname": flow.flowname,
        "status": flow.status,
        "progress": flow.progress,
        "result": flow.result,
        "error": flow.error,
    })
}

fn job_payload(kind: QueueEventKind, job_id: &JobId, job_name: &str, payload: &Value) -> Value {
    let field = match kind {
        QueueEventKind::Progress => "progress",
        QueueEventKind::Completed => "result",
        QueueEventKind::Failed => "error",
    };
    serde_json::json!({
        "jobId": job_id,
        "jobName": job_name,
        field: payload,
    })
}

/// Fire-and-forget push fabric. Emission failures are the implementation's
/// problem to log; callers never observe them.
pub trait Push: Send + Sync {
    fn emit(&self, room: &Room, message: PushMessage);
}

/// Commands a connected push client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "join-flow")]
    JoinFlow {
        #[serde(rename = "flowId")]
        flow_id: FlowId,
    },

    #[serde(rename = "leave-flow")]
    LeaveFlow {
        #[serde(rename = "flowId")]
        flow_id: FlowId,
    },

    #[serde(rename = "subscribe:job")]
    SubscribeJob {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },

    #[serde(rename = "unsubscribe:job")]
    UnsubscribeJob {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
