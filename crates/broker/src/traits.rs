// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker contract the core consumes.
//!
//! The broker is an external Redis-compatible queue runtime; the core never
//! re-implements its primitives. Everything the services touch goes through
//! this trait so tests can drive a [`FakeBroker`](crate::FakeBroker) instead
//! of a live instance.

use crate::error::BrokerError;
use async_trait::async_trait;
use jf_core::{
    FlowNodeSpec, JobId, JobOpts, JobRecord, JobState, QueueEvent, RemovedJob, ScheduleRecord,
    SchedulerKey,
};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

#[async_trait]
pub trait Broker: Send + Sync {
    // -- jobs --

    /// Enqueue a job and return the broker-assigned id.
    async fn add_job(
        &self,
        queue: &str,
        name: &str,
        data: Value,
        opts: JobOpts,
    ) -> Result<JobId, BrokerError>;

    /// Load a single job. `None` when unknown (possibly already removed).
    async fn job(&self, queue: &str, id: &JobId) -> Result<Option<JobRecord>, BrokerError>;

    /// Enumerate jobs in any of the given states.
    async fn jobs_in_states(
        &self,
        queue: &str,
        states: &[JobState],
    ) -> Result<Vec<JobRecord>, BrokerError>;

    /// Remove a job. Returns `false` when the job does not exist.
    async fn remove_job(&self, queue: &str, id: &JobId) -> Result<bool, BrokerError>;

    // -- recurring schedules --

    /// Idempotent upsert keyed by `record.key`; an existing schedule with the
    /// same key is overridden.
    async fn upsert_scheduler(
        &self,
        queue: &str,
        record: ScheduleRecord,
    ) -> Result<(), BrokerError>;

    async fn schedulers(&self, queue: &str) -> Result<Vec<ScheduleRecord>, BrokerError>;

    async fn scheduler(
        &self,
        queue: &str,
        key: &SchedulerKey,
    ) -> Result<Option<ScheduleRecord>, BrokerError>;

    /// Returns `false` when no scheduler with that key exists.
    async fn remove_scheduler(&self, queue: &str, key: &SchedulerKey)
        -> Result<bool, BrokerError>;

    // -- flows --

    /// Submit a job tree. Children are enqueued before their parent; the
    /// parent waits on its children. Returns the root job id.
    async fn add_flow(&self, root: &FlowNodeSpec) -> Result<JobId, BrokerError>;

    /// Remove a job and cascade to its recorded children, reporting the
    /// per-job disposition.
    async fn remove_job_cascade(
        &self,
        queue: &str,
        id: &JobId,
    ) -> Result<Vec<RemovedJob>, BrokerError>;

    // -- events --

    /// Subscribe to the queue's event stream (progress/completed/failed).
    /// Per-job ordering matches emission order.
    async fn subscribe(&self, queue: &str) -> Result<mpsc::Receiver<QueueEvent>, BrokerError>;

    // -- consumers --

    /// Block up to `timeout` for the next job, moving it to `active`.
    async fn fetch_next(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobRecord>, BrokerError>;

    /// Mark an active job completed and publish the completion event.
    async fn complete_job(&self, queue: &str, id: &JobId, result: Value)
        -> Result<(), BrokerError>;

    /// Mark an active job failed. Retried with backoff while attempts remain,
    /// otherwise moved to the failed set and the failure event published.
    async fn fail_job(&self, queue: &str, id: &JobId, error: &str) -> Result<(), BrokerError>;

    /// Update a job's progress value and publish the progress event.
    async fn report_progress(
        &self,
        queue: &str,
        id: &JobId,
        progress: Value,
    ) -> Result<(), BrokerError>;
}
