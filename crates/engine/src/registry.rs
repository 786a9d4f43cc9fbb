// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue registry: the fixed allow-list of queue names and the shared handles
//! onto the broker.
//!
//! Every externally supplied queue name passes through [`QueueRegistry::queue`];
//! unknown names fail validation at the boundary and never reach the broker.
//! Handles are lazily created on first use and shared process-wide.

use crate::error::ServiceError;
use jf_broker::{Broker, BrokerError};
use jf_core::{
    FlowNodeSpec, JobId, JobOpts, JobRecord, JobState, QueueEvent, RemovedJob, ScheduleRecord,
    SchedulerKey,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// The primary work queue.
pub const PRIMARY_QUEUE: &str = "jobQueue";
/// The dedicated webhook-delivery queue.
pub const WEBHOOK_QUEUE: &str = "webhooks";
/// The dedicated recurring-schedule queue.
pub const SCHEDULER_QUEUE: &str = "schedQueue";

/// Queue names allowed by default.
pub const DEFAULT_QUEUES: [&str; 3] = [PRIMARY_QUEUE, WEBHOOK_QUEUE, SCHEDULER_QUEUE];

pub struct QueueRegistry {
    allowed: Vec<String>,
    broker: Arc<dyn Broker>,
    handles: Mutex<HashMap<String, QueueHandle>>,
}

impl QueueRegistry {
    pub fn new(broker: Arc<dyn Broker>, allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            broker,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_queues(broker: Arc<dyn Broker>) -> Self {
        Self::new(broker, DEFAULT_QUEUES.iter().map(|s| s.to_string()))
    }

    /// The allow-list, in configuration order.
    pub fn queue_names(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.iter().any(|q| q == name)
    }

    /// Vend the shared handle for an allowed queue name.
    pub fn queue(&self, name: &str) -> Result<QueueHandle, ServiceError> {
        if !self.is_allowed(name) {
            return Err(ServiceError::validation(format!("unknown queue {name:?}")));
        }
        let mut handles = self.handles.lock();
        Ok(handles
            .entry(name.to_string())
            .or_insert_with(|| QueueHandle {
                name: Arc::from(name),
                broker: Arc::clone(&self.broker),
            })
            .clone())
    }
}

/// A shared handle onto one named queue. Cheap to clone; all operations are
/// safe to invoke concurrently.
#[derive(Clone)]
pub struct QueueHandle {
    name: Arc<str>,
    broker: Arc<dyn Broker>,
}

impl std::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle").field("name", &self.name).finish()
    }
}

impl QueueHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn add_job(
        &self,
        name: &str,
        data: Value,
        opts: JobOpts,
    ) -> Result<JobId, BrokerError> {
        self.broker.add_job(&self.name, name, data, opts).await
    }

    pub async fn job(&self, id: &JobId) -> Result<Option<JobRecord>, BrokerError> {
        self.broker.job(&self.name, id).await
    }

    pub async fn jobs_in_states(
        &self,
        states: &[JobState],
    ) -> Result<Vec<JobRecord>, BrokerError> {
        self.broker.jobs_in_states(&self.name, states).await
    }

    pub async fn remove_job(&self, id: &JobId) -> Result<bool, BrokerError> {
        self.broker.remove_job(&self.name, id).await
    }

    pub async fn upsert_scheduler(&self, record: ScheduleRecord) -> Result<(), BrokerError> {
        self.broker.upsert_scheduler(&self.name, record).await
    }

    pub async fn schedulers(&self) -> Result<Vec<ScheduleRecord>, BrokerError> {
        self.broker.schedulers(&self.name).await
    }

    pub async fn scheduler(
        &self,
        key: &SchedulerKey,
    ) -> Result<Option<ScheduleRecord>, BrokerError> {
        self.broker.scheduler(&self.name, key).await
    }

    pub async fn remove_scheduler(&self, key: &SchedulerKey) -> Result<bool, BrokerError> {
        self.broker.remove_scheduler(&self.name, key).await
    }

    pub async fn add_flow(&self, root: &FlowNodeSpec) -> Result<JobId, BrokerError> {
        self.broker.add_flow(root).await
    }

    pub async fn remove_job_cascade(&self, id: &JobId) -> Result<Vec<RemovedJob>, BrokerError> {
        self.broker.remove_job_cascade(&self.name, id).await
    }

    pub async fn subscribe(&self) -> Result<mpsc::Receiver<QueueEvent>, BrokerError> {
        self.broker.subscribe(&self.name).await
    }

    pub async fn fetch_next(
        &self,
        timeout: Duration,
    ) -> Result<Option<JobRecord>, BrokerError> {
        self.broker.fetch_next(&self.name, timeout).await
    }

    pub async fn complete_job(&self, id: &JobId, result: Value) -> Result<(), BrokerError> {
        self.broker.complete_job(&self.name, id, result).await
    }

    pub async fn fail_job(&self, id: &JobId, error: &str) -> Result<(), BrokerError> {
        self.broker.fail_job(&self.name, id, error).await
    }

    pub async fn report_progress(&self, id: &JobId, progress: Value) -> Result<(), BrokerError> {
        self.broker.report_progress(&self.name, id, progress).await
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
