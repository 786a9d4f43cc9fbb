// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event demultiplexer: projects primary-queue events onto push rooms, the
//! webhook-delivery queue, and flow progress reports.
//!
//! The broker event carries only the job id and payload; the originating job
//! is loaded to recover its name and owner. Events for jobs that are already
//! gone are logged and dropped. One malformed event never stops the loop.

use crate::error::ServiceError;
use crate::flows::FlowService;
use crate::registry::{QueueRegistry, PRIMARY_QUEUE, WEBHOOK_QUEUE};
use jf_core::{
    Clock, FlowId, JobOpts, JobRecord, JobState, KeepPolicy, ProgressUpdate, Push, PushMessage,
    QueueEvent, QueueEventKind, Room, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Payload enqueued on the webhook queue for each observed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDelivery {
    /// Id of the originating job (not the delivery job).
    pub id: String,
    pub jobname: String,
    pub user_id: UserId,
    pub event_type: QueueEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl WebhookDelivery {
    fn from_event(event: &QueueEvent, job: &JobRecord, user: UserId) -> Self {
        let mut delivery = Self {
            id: event.job_id.to_string(),
            jobname: job.name.clone(),
            user_id: user,
            event_type: event.kind,
            progress: None,
            result: None,
            error: None,
        };
        match event.kind {
            QueueEventKind::Progress => delivery.progress = Some(event.payload.clone()),
            QueueEventKind::Completed => delivery.result = Some(event.payload.clone()),
            QueueEventKind::Failed => delivery.error = Some(event.payload.clone()),
        }
        delivery
    }
}

pub struct EventDemux<C: Clock> {
    registry: Arc<QueueRegistry>,
    flows: Arc<FlowService<C>>,
    push: Arc<dyn Push>,
}

impl<C: Clock> EventDemux<C> {
    pub fn new(
        registry: Arc<QueueRegistry>,
        flows: Arc<FlowService<C>>,
        push: Arc<dyn Push>,
    ) -> Self {
        Self { registry, flows, push }
    }

    /// Consume primary-queue events until cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let handle = self.registry.queue(PRIMARY_QUEUE)?;
        let mut events = handle.subscribe().await?;
        info!(queue = PRIMARY_QUEUE, "event demux started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.handle_event(&event).await {
                        warn!(job_id = %event.job_id, error = %e, "event handling failed");
                    }
                }
            }
        }
        info!("event demux stopped");
        Ok(())
    }

    /// Project one event: push rooms, webhook queue, and (for flow jobs) a
    /// progress report into the owning flow.
    pub async fn handle_event(&self, event: &QueueEvent) -> Result<(), ServiceError> {
        let handle = self.registry.queue(&event.queue)?;
        let Some(job) = handle.job(&event.job_id).await? else {
            debug!(job_id = %event.job_id, "event for unknown job, dropping");
            return Ok(());
        };
        let Some(user) = job.user_id() else {
            warn!(job_id = %event.job_id, "event for ownerless job, dropping");
            return Ok(());
        };

        self.push.emit(
            &Room::Job(event.job_id.clone()),
            PushMessage::job_event_scoped(event.kind, &event.job_id, &job.name, &event.payload),
        );
        self.push.emit(
            &Room::User(user),
            PushMessage::job_event(event.kind, &event.job_id, &job.name, &event.payload),
        );

        let delivery = WebhookDelivery::from_event(event, &job, user);
        let webhook_queue = self.registry.queue(WEBHOOK_QUEUE)?;
        webhook_queue
            .add_job(
                "webhook-delivery",
                serde_json::to_value(&delivery).map_err(ServiceError::internal)?,
                delivery_opts(),
            )
            .await?;

        if let Some(flow_id) = job.flow_id().map(FlowId::from_string) {
            let update = flow_update(event, &job);
            if let Err(e) = self.flows.update_progress(&flow_id, update).await {
                warn!(flow_id = %flow_id, job_id = %event.job_id, error = %e,
                    "flow progress report failed");
            }
        }
        Ok(())
    }
}

/// Delivery jobs retry three times and keep the default 3/5 retention.
fn delivery_opts() -> JobOpts {
    JobOpts {
        attempts: Some(3),
        remove_on_complete: Some(KeepPolicy { count: 3 }),
        remove_on_fail: Some(KeepPolicy { count: 5 }),
        ..JobOpts::default()
    }
}

fn flow_update(event: &QueueEvent, job: &JobRecord) -> ProgressUpdate {
    let status = match event.kind {
        QueueEventKind::Progress => JobState::Active,
        QueueEventKind::Completed => JobState::Completed,
        QueueEventKind::Failed => JobState::Failed,
    };
    ProgressUpdate {
        job_id: event.job_id.clone(),
        status,
        job_name: Some(job.name.clone()),
        queue_name: Some(job.queue.clone()),
        result: (event.kind == QueueEventKind::Completed).then(|| event.payload.clone()),
        error: (event.kind == QueueEventKind::Failed)
            .then(|| event.payload.as_str().map(str::to_string))
            .flatten()
            .or_else(|| {
                (event.kind == QueueEventKind::Failed).then(|| event.payload.to_string())
            }),
        progress: (event.kind == QueueEventKind::Progress).then(|| event.payload.clone()),
        started_at: job.processed_on,
    }
}

#[cfg(test)]
#[path = "demux_tests.rs"]
mod tests;
