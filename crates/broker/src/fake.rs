// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory broker for tests.
//!
//! Deterministic counterpart of the Redis binding: sequential numeric job
//! ids, controllable time, and the same event publication on completion,
//! failure, and progress. Tests drive job outcomes through the trait's
//! consumer methods (`complete_job`, `fail_job`, `report_progress`).

use crate::error::BrokerError;
use crate::traits::Broker;
use async_trait::async_trait;
use jf_core::{
    FlowNodeSpec, JobId, JobOpts, JobRecord, JobState, QueueEvent, QueueEventKind, RemovalStatus,
    RemovedJob, ScheduleRecord, SchedulerKey,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;

type JobRef = (String, String);

#[derive(Default)]
struct QueueState {
    next_id: u64,
    jobs: HashMap<String, JobRecord>,
    wait: VecDeque<String>,
    schedulers: BTreeMap<String, ScheduleRecord>,
}

#[derive(Default)]
struct FakeState {
    queues: HashMap<String, QueueState>,
    children: HashMap<JobRef, Vec<JobRef>>,
    parents: HashMap<JobRef, JobRef>,
    pending_children: HashMap<JobRef, usize>,
    subscribers: Vec<(String, mpsc::Sender<QueueEvent>)>,
    now_ms: u64,
}

/// In-memory [`Broker`] implementation for tests.
pub struct FakeBroker {
    state: Mutex<FakeState>,
}

impl Default for FakeBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState { now_ms: 1_000_000, ..FakeState::default() }),
        }
    }

    /// Move the fake clock used for job timestamps.
    pub fn set_now(&self, ms: u64) {
        self.state.lock().now_ms = ms;
    }

    /// Number of jobs currently stored in a queue.
    pub fn job_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue)
            .map(|q| q.jobs.len())
            .unwrap_or(0)
    }

    /// Ids currently sitting on the wait list, oldest first.
    pub fn waiting_ids(&self, queue: &str) -> Vec<String> {
        self.state
            .lock()
            .queues
            .get(queue)
            .map(|q| q.wait.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn create_job_locked(
        state: &mut FakeState,
        queue: &str,
        name: &str,
        data: Value,
        opts: JobOpts,
        initial_state: JobState,
    ) -> JobId {
        let now = state.now_ms;
        let q = state.queues.entry(queue.to_string()).or_default();
        q.next_id += 1;
        let id = JobId::from_string(q.next_id.to_string());
        let record = JobRecord {
            id: id.clone(),
            name: name.to_string(),
            queue: queue.to_string(),
            data,
            opts,
            state: initial_state,
            progress: Value::Null,
            returnvalue: None,
            failed_reason: None,
            timestamp: now,
            processed_on: None,
            finished_on: None,
            attempts_made: 0,
        };
        q.jobs.insert(id.to_string(), record);
        if initial_state == JobState::Waiting {
            q.wait.push_back(id.to_string());
        }
        id
    }

    fn add_flow_node_locked(
        state: &mut FakeState,
        node: &FlowNodeSpec,
        parent: Option<JobRef>,
    ) -> JobId {
        let initial = if node.children.is_empty() {
            JobState::Waiting
        } else {
            JobState::WaitingChildren
        };
        let id = Self::create_job_locked(
            state,
            &node.queue_name,
            &node.name,
            node.data.clone(),
            JobOpts::sanitize(node.opts.clone()),
            initial,
        );
        let me: JobRef = (node.queue_name.clone(), id.to_string());
        if let Some(parent) = parent {
            state.parents.insert(me.clone(), parent);
        }
        if !node.children.is_empty() {
            state.pending_children.insert(me.clone(), node.children.len());
            let mut refs = Vec::with_capacity(node.children.len());
            for child in &node.children {
                let child_id = Self::add_flow_node_locked(state, child, Some(me.clone()));
                refs.push((child.queue_name.clone(), child_id.to_string()));
            }
            state.children.insert(me, refs);
        }
        id
    }

    fn remove_cascade_locked(
        state: &mut FakeState,
        queue: &str,
        id: &str,
        removed: &mut Vec<RemovedJob>,
    ) {
        let me: JobRef = (queue.to_string(), id.to_string());
        if let Some(children) = state.children.remove(&me) {
            for (child_queue, child_id) in children {
                Self::remove_cascade_locked(state, &child_queue, &child_id, removed);
            }
        }
        let existed = state
            .queues
            .get_mut(queue)
            .map(|q| {
                q.wait.retain(|w| w != id);
                q.jobs.remove(id).is_some()
            })
            .unwrap_or(false);
        state.parents.remove(&me);
        state.pending_children.remove(&me);
        removed.push(RemovedJob {
            job_id: JobId::from_string(id),
            queue_name: queue.to_string(),
            status: if existed { RemovalStatus::Success } else { RemovalStatus::NotFound },
            error: None,
        });
    }

    /// Release a completed child's parent; returns the parent ref when it
    /// became ready to run.
    fn release_parent_locked(state: &mut FakeState, me: &JobRef) {
        let Some(parent) = state.parents.get(me).cloned() else { return };
        let Some(pending) = state.pending_children.get_mut(&parent) else { return };
        *pending = pending.saturating_sub(1);
        if *pending > 0 {
            return;
        }
        state.pending_children.remove(&parent);
        let (parent_queue, parent_id) = parent;
        if let Some(q) = state.queues.get_mut(&parent_queue) {
            if let Some(job) = q.jobs.get_mut(&parent_id) {
                if job.state == JobState::WaitingChildren {
                    job.state = JobState::Waiting;
                    q.wait.push_back(parent_id);
                }
            }
        }
    }

    async fn publish(&self, event: QueueEvent) {
        let senders: Vec<mpsc::Sender<QueueEvent>> = {
            let state = self.state.lock();
            state
                .subscribers
                .iter()
                .filter(|(queue, _)| *queue == event.queue)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in senders {
            let _ = tx.send(event.clone()).await;
        }
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn add_job(
        &self,
        queue: &str,
        name: &str,
        data: Value,
        opts: JobOpts,
    ) -> Result<JobId, BrokerError> {
        let mut state = self.state.lock();
        Ok(Self::create_job_locked(&mut state, queue, name, data, opts, JobState::Waiting))
    }

    async fn job(&self, queue: &str, id: &JobId) -> Result<Option<JobRecord>, BrokerError> {
        let state = self.state.lock();
        Ok(state
            .queues
            .get(queue)
            .and_then(|q| q.jobs.get(id.as_str()))
            .cloned())
    }

    async fn jobs_in_states(
        &self,
        queue: &str,
        states: &[JobState],
    ) -> Result<Vec<JobRecord>, BrokerError> {
        let state = self.state.lock();
        let Some(q) = state.queues.get(queue) else { return Ok(Vec::new()) };
        let mut jobs: Vec<JobRecord> = q
            .jobs
            .values()
            .filter(|job| states.contains(&job.state))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.id.as_str().parse::<u64>().unwrap_or(0));
        Ok(jobs)
    }

    async fn remove_job(&self, queue: &str, id: &JobId) -> Result<bool, BrokerError> {
        let mut state = self.state.lock();
        let existed = state
            .queues
            .get_mut(queue)
            .map(|q| {
                q.wait.retain(|w| w != id.as_str());
                q.jobs.remove(id.as_str()).is_some()
            })
            .unwrap_or(false);
        Ok(existed)
    }

    async fn upsert_scheduler(
        &self,
        queue: &str,
        mut record: ScheduleRecord,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if record.next.is_none() {
            let now = state.now_ms;
            record.next = crate::redis::next_fire(&record.repeat, now, record.iteration_count)?;
        }
        let q = state.queues.entry(queue.to_string()).or_default();
        q.schedulers.insert(record.key.to_string(), record);
        Ok(())
    }

    async fn schedulers(&self, queue: &str) -> Result<Vec<ScheduleRecord>, BrokerError> {
        let state = self.state.lock();
        Ok(state
            .queues
            .get(queue)
            .map(|q| q.schedulers.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn scheduler(
        &self,
        queue: &str,
        key: &SchedulerKey,
    ) -> Result<Option<ScheduleRecord>, BrokerError> {
        let state = self.state.lock();
        Ok(state
            .queues
            .get(queue)
            .and_then(|q| q.schedulers.get(key.as_str()))
            .cloned())
    }

    async fn remove_scheduler(
        &self,
        queue: &str,
        key: &SchedulerKey,
    ) -> Result<bool, BrokerError> {
        let mut state = self.state.lock();
        Ok(state
            .queues
            .get_mut(queue)
            .map(|q| q.schedulers.remove(key.as_str()).is_some())
            .unwrap_or(false))
    }

    async fn add_flow(&self, root: &FlowNodeSpec) -> Result<JobId, BrokerError> {
        let mut state = self.state.lock();
        Ok(Self::add_flow_node_locked(&mut state, root, None))
    }

    async fn remove_job_cascade(
        &self,
        queue: &str,
        id: &JobId,
    ) -> Result<Vec<RemovedJob>, BrokerError> {
        let mut state = self.state.lock();
        let mut removed = Vec::new();
        Self::remove_cascade_locked(&mut state, queue, id.as_str(), &mut removed);
        Ok(removed)
    }

    async fn subscribe(&self, queue: &str) -> Result<mpsc::Receiver<QueueEvent>, BrokerError> {
        let (tx, rx) = mpsc::channel(256);
        self.state.lock().subscribers.push((queue.to_string(), tx));
        Ok(rx)
    }

    async fn fetch_next(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobRecord>, BrokerError> {
        let popped = {
            let mut state = self.state.lock();
            let now = state.now_ms;
            state.queues.get_mut(queue).and_then(|q| {
                let id = q.wait.pop_front()?;
                let job = q.jobs.get_mut(&id)?;
                job.state = JobState::Active;
                job.processed_on = Some(now);
                Some(job.clone())
            })
        };
        if popped.is_none() {
            // Keep consumer loops from spinning hot against an empty fake.
            tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
        }
        Ok(popped)
    }

    async fn complete_job(
        &self,
        queue: &str,
        id: &JobId,
        result: Value,
    ) -> Result<(), BrokerError> {
        {
            let mut state = self.state.lock();
            let now = state.now_ms;
            let Some(job) = state
                .queues
                .get_mut(queue)
                .and_then(|q| q.jobs.get_mut(id.as_str()))
            else {
                return Ok(());
            };
            job.state = JobState::Completed;
            job.returnvalue = Some(result.clone());
            job.finished_on = Some(now);
            let me: JobRef = (queue.to_string(), id.to_string());
            Self::release_parent_locked(&mut state, &me);
        }
        self.publish(QueueEvent {
            queue: queue.to_string(),
            job_id: id.clone(),
            kind: QueueEventKind::Completed,
            payload: result,
        })
        .await;
        Ok(())
    }

    async fn fail_job(&self, queue: &str, id: &JobId, error: &str) -> Result<(), BrokerError> {
        {
            let mut state = self.state.lock();
            let now = state.now_ms;
            let Some(job) = state
                .queues
                .get_mut(queue)
                .and_then(|q| q.jobs.get_mut(id.as_str()))
            else {
                return Ok(());
            };
            job.attempts_made += 1;
            let allowed = job.opts.attempts.unwrap_or(1).max(1);
            if job.attempts_made < allowed {
                job.state = JobState::Waiting;
                let id = id.to_string();
                if let Some(q) = state.queues.get_mut(queue) {
                    q.wait.push_back(id);
                }
                return Ok(());
            }
            job.state = JobState::Failed;
            job.failed_reason = Some(error.to_string());
            job.finished_on = Some(now);
        }
        self.publish(QueueEvent {
            queue: queue.to_string(),
            job_id: id.clone(),
            kind: QueueEventKind::Failed,
            payload: Value::String(error.to_string()),
        })
        .await;
        Ok(())
    }

    async fn report_progress(
        &self,
        queue: &str,
        id: &JobId,
        progress: Value,
    ) -> Result<(), BrokerError> {
        {
            let mut state = self.state.lock();
            let Some(job) = state
                .queues
                .get_mut(queue)
                .and_then(|q| q.jobs.get_mut(id.as_str()))
            else {
                return Ok(());
            };
            job.progress = progress.clone();
        }
        self.publish(QueueEvent {
            queue: queue.to_string(),
            job_id: id.clone(),
            kind: QueueEventKind::Progress,
            payload: progress,
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
