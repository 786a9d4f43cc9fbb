// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow service: composite job trees with aggregated progress.
//!
//! Progress updates are read-modify-write on the flow row; a per-flow async
//! mutex serializes them so concurrent child reports cannot lose updates.
//! Push emission is fire-and-forget; only persistence errors surface.

use crate::error::ServiceError;
use crate::registry::QueueRegistry;
use jf_core::{
    Caller, Clock, Flow, FlowCreateRequest, FlowDeleteSummary, FlowId, FlowNodeSpec, FlowStatus,
    ProgressUpdate, Push, PushMessage, RemovalStatus, RemovedJob, Room, UserId,
};
use jf_storage::FlowStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct FlowService<C: Clock> {
    store: Arc<dyn FlowStore>,
    registry: Arc<QueueRegistry>,
    push: Arc<dyn Push>,
    clock: C,
    /// Per-flow serializers for progress read-modify-write.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: Clock> FlowService<C> {
    pub fn new(
        store: Arc<dyn FlowStore>,
        registry: Arc<QueueRegistry>,
        push: Arc<dyn Push>,
        clock: C,
    ) -> Self {
        Self {
            store,
            registry,
            push,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn flow_lock(&self, flow_id: &FlowId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(flow_id.as_str().to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn drop_flow_lock(&self, flow_id: &FlowId) {
        self.locks.lock().remove(flow_id.as_str());
    }

    fn validate_queues(&self, node: &FlowNodeSpec) -> Result<(), ServiceError> {
        if !self.registry.is_allowed(&node.queue_name) {
            return Err(ServiceError::validation(format!(
                "unknown queue {:?}",
                node.queue_name
            )));
        }
        for child in &node.children {
            self.validate_queues(child)?;
        }
        Ok(())
    }

    /// Create a flow: persist the pending row, inject flow metadata into
    /// every job payload, submit the tree, and mark the flow running.
    pub async fn create_flow(
        &self,
        request: FlowCreateRequest,
        caller: &Caller,
    ) -> Result<Flow, ServiceError> {
        if request.flowname.trim().is_empty() {
            return Err(ServiceError::validation("flowname must not be empty"));
        }
        request
            .root
            .validate()
            .map_err(|e| ServiceError::validation(e.to_string()))?;
        self.validate_queues(&request.root)?;

        let now_ms = self.clock.epoch_ms();
        let flow_id = FlowId::mint(now_ms);
        let mut flow = Flow::from_request(flow_id.clone(), &request, caller.user_id, &self.clock);

        flow.job_structure
            .root
            .inject_metadata(&flow_id, &request.flowname, caller.user_id, now_ms);
        self.store.insert(&flow).await?;

        let handle = self.registry.queue(&flow.queue_name)?;
        let root_job_id = handle.add_flow(&flow.job_structure.root).await?;

        flow.root_job_id = Some(root_job_id);
        flow.status = FlowStatus::Running;
        flow.started_at = Some(self.clock.now_utc());
        flow.updated_at = self.clock.now_utc();
        self.store.update(&flow).await?;

        info!(flow_id = %flow.flow_id, total = flow.progress.summary.total, "flow created");
        self.push
            .emit(&Room::User(flow.user_id), PushMessage::flow_created(&flow));
        Ok(flow)
    }

    /// Apply one job report to a flow. Updates are serialized per flow; the
    /// last writer wins per job id.
    pub async fn update_progress(
        &self,
        flow_id: &FlowId,
        update: ProgressUpdate,
    ) -> Result<Flow, ServiceError> {
        let lock = self.flow_lock(flow_id);
        let _guard = lock.lock().await;

        let mut flow = self
            .store
            .get(flow_id)
            .await?
            .ok_or(ServiceError::NotFound("flow"))?;

        let was_completed = flow.status == FlowStatus::Completed;
        let now_ms = self.clock.epoch_ms();
        flow.progress.apply(&update, now_ms);

        if !flow.status.is_terminal() {
            let derived = flow.progress.derive_status();
            // A flow that already started never drops back to pending.
            if derived != FlowStatus::Pending {
                flow.status = derived;
            }
        }

        if flow.root_job_id.as_ref() == Some(&update.job_id) {
            flow.result = update.result.clone();
            flow.error = update.error.clone();
        }

        flow.updated_at = self.clock.now_utc();
        let newly_completed = !was_completed && flow.status == FlowStatus::Completed;
        if newly_completed {
            flow.completed_at = Some(self.clock.now_utc());
        }

        self.store.update(&flow).await?;

        let user_room = Room::User(flow.user_id);
        let flow_room = Room::Flow(flow.flow_id.clone());
        self.push
            .emit(&user_room, PushMessage::flow_job_updated(&flow.flow_id, &update));
        self.push
            .emit(&flow_room, PushMessage::flow_job_progress(&flow.flow_id, &update));
        self.push.emit(&user_room, PushMessage::flow_updated(&flow));
        self.push.emit(&flow_room, PushMessage::flow_progress(&flow));
        if newly_completed {
            self.push.emit(&user_room, PushMessage::flow_completed(&flow));
            self.push.emit(&flow_room, PushMessage::flow_finished(&flow));
        }

        Ok(flow)
    }

    /// Delete a flow: remove the root job (the broker cascades to children)
    /// and drop the row regardless of broker outcome.
    pub async fn delete_flow(
        &self,
        flow_id: &FlowId,
        caller: &Caller,
    ) -> Result<FlowDeleteSummary, ServiceError> {
        let flow = self
            .store
            .get(flow_id)
            .await?
            .ok_or(ServiceError::NotFound("flow"))?;
        if flow.user_id != caller.user_id {
            return Err(ServiceError::Forbidden);
        }

        let details: Vec<RemovedJob> = match &flow.root_job_id {
            Some(root_id) => {
                let handle = self.registry.queue(&flow.queue_name)?;
                match handle.remove_job_cascade(root_id).await {
                    Ok(details) => details,
                    Err(e) => {
                        warn!(flow_id = %flow_id, error = %e, "cascade removal failed");
                        vec![RemovedJob {
                            job_id: root_id.clone(),
                            queue_name: flow.queue_name.clone(),
                            status: RemovalStatus::Failed,
                            error: Some(e.to_string()),
                        }]
                    }
                }
            }
            None => Vec::new(),
        };

        // The row goes away even when the broker misbehaved; state must not leak.
        self.store.delete(flow_id).await?;
        self.drop_flow_lock(flow_id);

        let summary = FlowDeleteSummary {
            total: details.len() as u32,
            successful: details
                .iter()
                .filter(|d| d.status == RemovalStatus::Success)
                .count() as u32,
            failed: details
                .iter()
                .filter(|d| d.status == RemovalStatus::Failed)
                .map(|d| d.job_id.clone())
                .collect(),
            details,
        };

        let message = PushMessage::flow_deleted(flow_id, &summary);
        self.push.emit(&Room::User(flow.user_id), message.clone());
        self.push.emit(&Room::Flow(flow_id.clone()), message);
        Ok(summary)
    }

    pub async fn get_flow(&self, flow_id: &FlowId) -> Result<Flow, ServiceError> {
        self.store
            .get(flow_id)
            .await?
            .ok_or(ServiceError::NotFound("flow"))
    }

    pub async fn flows(&self, user: Option<UserId>) -> Result<Vec<Flow>, ServiceError> {
        Ok(self.store.list(user).await?)
    }

    /// Reconstruct the original creation request from the persisted
    /// structure (owner and flow metadata included, as injected).
    pub async fn flow_as_create_request(
        &self,
        flow_id: &FlowId,
    ) -> Result<FlowCreateRequest, ServiceError> {
        Ok(self.get_flow(flow_id).await?.as_create_request())
    }
}

#[cfg(test)]
#[path = "flows_tests.rs"]
mod tests;
