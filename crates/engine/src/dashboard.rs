// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard aggregator: on-demand per-queue counts and scheduler/webhook
//! stats, always scoped to the caller.
//!
//! Delivery metrics are documented placeholders until a delivery ledger
//! exists; they are constants, not measurements.

use crate::error::ServiceError;
use crate::registry::{QueueRegistry, PRIMARY_QUEUE, SCHEDULER_QUEUE};
use crate::scheduler::SchedulerService;
use jf_core::{Caller, Clock, JobId, JobState, ScheduleRecord, SchedulerKey};
use jf_storage::WebhookStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Placeholder delivery rate surfaced while no delivery ledger exists.
const PLACEHOLDER_DELIVERY_RATE: u32 = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue: String,
    /// Per-status counts of the caller's jobs.
    pub counts: BTreeMap<String, u32>,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentJob {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub timestamp: u64,
    /// `finishedOn − processedOn` when both exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStats {
    pub total_schedules: u32,
    pub active_schedules: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_scheduled_job: Option<NextScheduledJob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextScheduledJob {
    pub key: SchedulerKey,
    pub job_name: String,
    pub next: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStats {
    pub total_webhooks: u32,
    pub active_webhooks: u32,
    /// Placeholder until a delivery ledger exists.
    pub delivery_rate: u32,
    /// Placeholder until a delivery ledger exists.
    pub total_deliveries: u64,
    /// Placeholder until a delivery ledger exists.
    pub failed_deliveries: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub queues: Vec<QueueStats>,
    pub totals: BTreeMap<String, u32>,
    pub recent_jobs: Vec<RecentJob>,
    pub schedules: ScheduleStats,
    pub webhooks: WebhookStats,
}

pub struct DashboardService<C: Clock> {
    registry: Arc<QueueRegistry>,
    scheduler: Arc<SchedulerService<C>>,
    webhooks: Arc<dyn WebhookStore>,
}

impl<C: Clock> DashboardService<C> {
    pub fn new(
        registry: Arc<QueueRegistry>,
        scheduler: Arc<SchedulerService<C>>,
        webhooks: Arc<dyn WebhookStore>,
    ) -> Self {
        Self { registry, scheduler, webhooks }
    }

    pub async fn stats(&self, caller: &Caller) -> Result<DashboardStats, ServiceError> {
        let mut queues = Vec::new();
        let mut totals: BTreeMap<String, u32> = BTreeMap::new();
        for queue_name in self.registry.queue_names().to_vec() {
            let handle = self.registry.queue(&queue_name)?;
            let mut counts = BTreeMap::new();
            let mut total = 0;
            for state in JobState::ENUMERABLE {
                let count = handle
                    .jobs_in_states(&[state])
                    .await?
                    .iter()
                    .filter(|job| job.is_owned_by(caller.user_id))
                    .count() as u32;
                counts.insert(state.to_string(), count);
                *totals.entry(state.to_string()).or_insert(0) += count;
                total += count;
            }
            queues.push(QueueStats { queue: queue_name, counts, total });
        }

        let recent_jobs = self.recent_jobs(caller).await?;
        let schedules = self.schedule_stats(caller).await?;
        let webhooks = self.webhook_stats(caller).await?;

        Ok(DashboardStats { queues, totals, recent_jobs, schedules, webhooks })
    }

    /// The caller's five most recent jobs on the primary queue.
    async fn recent_jobs(&self, caller: &Caller) -> Result<Vec<RecentJob>, ServiceError> {
        let handle = self.registry.queue(PRIMARY_QUEUE)?;
        let mut jobs: Vec<_> = handle
            .jobs_in_states(&JobState::ENUMERABLE)
            .await?
            .into_iter()
            .filter(|job| job.is_owned_by(caller.user_id))
            .collect();
        jobs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(jobs
            .into_iter()
            .take(5)
            .map(|job| RecentJob {
                duration: match (job.finished_on, job.processed_on) {
                    (Some(finished), Some(started)) => Some(finished.saturating_sub(started)),
                    _ => None,
                },
                id: job.id,
                name: job.name,
                state: job.state,
                timestamp: job.timestamp,
            })
            .collect())
    }

    async fn schedule_stats(&self, caller: &Caller) -> Result<ScheduleStats, ServiceError> {
        let schedules: Vec<ScheduleRecord> = self
            .scheduler
            .list_for_user(SCHEDULER_QUEUE, caller)
            .await?;
        let active = schedules.iter().filter(|s| s.next.is_some()).count() as u32;
        let next_scheduled_job = schedules
            .iter()
            .filter_map(|s| s.next.map(|next| (s, next)))
            .min_by_key(|(_, next)| *next)
            .map(|(s, next)| NextScheduledJob {
                key: s.key.clone(),
                job_name: s.job_name.clone(),
                next,
            });
        Ok(ScheduleStats {
            total_schedules: schedules.len() as u32,
            active_schedules: active,
            next_scheduled_job,
        })
    }

    async fn webhook_stats(&self, caller: &Caller) -> Result<WebhookStats, ServiceError> {
        let hooks = self.webhooks.list(caller.user_id).await?;
        Ok(WebhookStats {
            total_webhooks: hooks.len() as u32,
            active_webhooks: hooks.iter().filter(|h| h.active).count() as u32,
            delivery_rate: PLACEHOLDER_DELIVERY_RATE,
            total_deliveries: 0,
            failed_deliveries: 0,
        })
    }
}

#[cfg(test)]
#[path = "dashboard_tests.rs"]
mod tests;
