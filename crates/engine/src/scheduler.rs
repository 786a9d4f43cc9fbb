// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler service: recurring jobs keyed by `"{userId}-{name}-{ms}"`.
//!
//! Ownership is decidable from the key alone, so get/remove check the prefix
//! before touching the broker. Removal does not cancel already-enqueued
//! concrete jobs.

use crate::error::ServiceError;
use crate::jobs::inject_user;
use crate::registry::QueueRegistry;
use jf_core::{
    Caller, Clock, JobOpts, ScheduleRecord, ScheduleSpec, ScheduleTemplate, SchedulerKey,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// A request to create or update a recurring schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSubmission {
    pub name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub opts: Option<Value>,
    pub schedule: ScheduleSpec,
}

pub struct SchedulerService<C: Clock> {
    registry: Arc<QueueRegistry>,
    clock: C,
}

impl<C: Clock> SchedulerService<C> {
    pub fn new(registry: Arc<QueueRegistry>, clock: C) -> Self {
        Self { registry, clock }
    }

    /// Create or override a schedule; idempotent per key.
    pub async fn schedule(
        &self,
        queue: &str,
        submission: ScheduleSubmission,
        caller: &Caller,
    ) -> Result<SchedulerKey, ServiceError> {
        if submission.name.trim().is_empty() {
            return Err(ServiceError::validation("schedule name must not be empty"));
        }
        let handle = self.registry.queue(queue)?;
        let repeat = submission.schedule.to_repeat_opts().ok_or_else(|| {
            ServiceError::validation("schedule requires a cron pattern or repeat.every")
        })?;

        let key = SchedulerKey::compose(caller.user_id, &submission.name, self.clock.epoch_ms());
        let record = ScheduleRecord {
            key: key.clone(),
            queue: queue.to_string(),
            job_name: submission.name,
            template: ScheduleTemplate {
                data: inject_user(submission.data, caller),
                opts: JobOpts::sanitize(submission.opts),
            },
            repeat,
            next: None,
            iteration_count: 0,
        };
        handle.upsert_scheduler(record).await?;
        Ok(key)
    }

    /// The caller's schedules on a queue. Broker failures degrade to an
    /// empty list.
    pub async fn list_for_user(
        &self,
        queue: &str,
        caller: &Caller,
    ) -> Result<Vec<ScheduleRecord>, ServiceError> {
        let handle = self.registry.queue(queue)?;
        let records = match handle.schedulers().await {
            Ok(records) => records,
            Err(e) => {
                warn!(queue, error = %e, "listing schedulers failed, returning empty");
                return Ok(Vec::new());
            }
        };
        Ok(records
            .into_iter()
            .filter(|r| r.key.is_owned_by(caller.user_id))
            .collect())
    }

    pub async fn get(
        &self,
        queue: &str,
        key: &SchedulerKey,
        caller: &Caller,
    ) -> Result<Option<ScheduleRecord>, ServiceError> {
        if !key.is_owned_by(caller.user_id) {
            return Ok(None);
        }
        let handle = self.registry.queue(queue)?;
        Ok(handle.scheduler(key).await?)
    }

    /// Idempotent removal; `false` when the key is not the caller's or does
    /// not exist.
    pub async fn remove(
        &self,
        queue: &str,
        key: &SchedulerKey,
        caller: &Caller,
    ) -> Result<bool, ServiceError> {
        if !key.is_owned_by(caller.user_id) {
            return Ok(false);
        }
        let handle = self.registry.queue(queue)?;
        Ok(handle.remove_scheduler(key).await?)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
