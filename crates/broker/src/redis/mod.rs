// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis binding for the broker contract.
//!
//! Data model per queue: a hash per job, a wait list popped by consumers, an
//! active list for in-flight jobs, per-state membership containers (sorted
//! sets where an order matters), a scheduler hash plus a due-time sorted set,
//! and a pub/sub channel for job events.

mod convert;
mod keys;
mod repeat;

pub use repeat::next_fire;

use crate::error::BrokerError;
use crate::traits::Broker;
use async_trait::async_trait;
use convert::ChildRef;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use jf_core::{
    FlowNodeSpec, JobId, JobOpts, JobRecord, JobState, QueueEvent, QueueEventKind, RemovalStatus,
    RemovedJob, ScheduleRecord, SchedulerKey,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Base delay for exponential retry backoff, in milliseconds.
const BACKOFF_BASE_MS: u64 = 1_000;

/// How often the scheduler daemon scans for due schedules.
const SCHEDULER_TICK: Duration = Duration::from_secs(1);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Broker binding over a Redis-compatible runtime.
pub struct RedisBroker {
    pool: Pool,
    url: String,
}

impl RedisBroker {
    /// Connect a bounded pool to the given Redis URL.
    pub fn connect(url: impl Into<String>) -> Result<Self, BrokerError> {
        let url = url.into();
        let pool = Config::from_url(url.clone())
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                redis::RedisError::from((redis::ErrorKind::IoError, "pool", e.to_string()))
            })?;
        Ok(Self { pool, url })
    }

    async fn conn(&self) -> Result<Connection, BrokerError> {
        Ok(self.pool.get().await?)
    }

    /// Add a job id to its state's membership container.
    async fn enter_state(
        conn: &mut Connection,
        queue: &str,
        id: &str,
        state: JobState,
        score: u64,
    ) -> Result<(), BrokerError> {
        let key = keys::state(queue, state);
        if keys::is_zset_state(state) {
            let _: () = redis::cmd("ZADD")
                .arg(&key)
                .arg(score)
                .arg(id)
                .query_async(conn)
                .await?;
        } else {
            let _: () = redis::cmd("SADD").arg(&key).arg(id).query_async(conn).await?;
        }
        Ok(())
    }

    async fn leave_state(
        conn: &mut Connection,
        queue: &str,
        id: &str,
        state: JobState,
    ) -> Result<(), BrokerError> {
        let key = keys::state(queue, state);
        let cmd = if keys::is_zset_state(state) { "ZREM" } else { "SREM" };
        let _: () = redis::cmd(cmd).arg(&key).arg(id).query_async(conn).await?;
        Ok(())
    }

    /// Drop a job id from every container it could be in.
    async fn clear_membership(
        conn: &mut Connection,
        queue: &str,
        id: &str,
    ) -> Result<(), BrokerError> {
        for state in JobState::ENUMERABLE {
            Self::leave_state(conn, queue, id, state).await?;
        }
        let _: () = redis::cmd("LREM")
            .arg(keys::wait_list(queue))
            .arg(0)
            .arg(id)
            .query_async(conn)
            .await?;
        let _: () = redis::cmd("LREM")
            .arg(keys::active_list(queue))
            .arg(0)
            .arg(id)
            .query_async(conn)
            .await?;
        Ok(())
    }

    async fn publish(
        conn: &mut Connection,
        queue: &str,
        event: &QueueEvent,
    ) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(event)?;
        let _: () = redis::cmd("PUBLISH")
            .arg(keys::events_channel(queue))
            .arg(payload)
            .query_async(conn)
            .await?;
        Ok(())
    }

    async fn load_hash(
        conn: &mut Connection,
        queue: &str,
        id: &str,
    ) -> Result<Option<HashMap<String, String>>, BrokerError> {
        let hash: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(keys::job(queue, id))
            .query_async(conn)
            .await?;
        Ok(if hash.is_empty() { None } else { Some(hash) })
    }

    /// Create the job hash and place it in its initial container.
    #[allow(clippy::too_many_arguments)]
    async fn create_job(
        conn: &mut Connection,
        queue: &str,
        name: &str,
        data: &Value,
        opts: &JobOpts,
        parent: Option<&ChildRef>,
        pending_children: usize,
    ) -> Result<JobId, BrokerError> {
        let raw_id: i64 = redis::cmd("INCR")
            .arg(keys::id_counter(queue))
            .query_async(conn)
            .await?;
        let id = JobId::from_string(raw_id.to_string());
        let now = now_ms();

        let delay = opts.delay.unwrap_or(0);
        let state = if pending_children > 0 {
            JobState::WaitingChildren
        } else if delay > 0 {
            JobState::Delayed
        } else {
            JobState::Waiting
        };

        let mut fields = convert::new_job_fields(name, data, opts, state, now)?;
        if let Some(parent) = parent {
            fields.push((convert::F_PARENT_ID.into(), parent.id.clone()));
            fields.push((convert::F_PARENT_QUEUE.into(), parent.queue.clone()));
        }
        if pending_children > 0 {
            fields.push((convert::F_PENDING_CHILDREN.into(), pending_children.to_string()));
        }

        let mut cmd = redis::cmd("HSET");
        cmd.arg(keys::job(queue, &id));
        for (field, value) in &fields {
            cmd.arg(field).arg(value);
        }
        let _: () = cmd.query_async(conn).await?;

        match state {
            JobState::Waiting => {
                Self::enter_state(conn, queue, &id, state, now).await?;
                let _: () = redis::cmd("LPUSH")
                    .arg(keys::wait_list(queue))
                    .arg(id.as_str())
                    .query_async(conn)
                    .await?;
            }
            JobState::Delayed => {
                Self::enter_state(conn, queue, &id, state, now + delay).await?;
            }
            _ => {
                Self::enter_state(conn, queue, &id, state, now).await?;
            }
        }

        Ok(id)
    }

    /// Move due delayed jobs back onto the wait list.
    async fn promote_delayed(conn: &mut Connection, queue: &str) -> Result<(), BrokerError> {
        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(keys::state(queue, JobState::Delayed))
            .arg("-inf")
            .arg(now_ms())
            .query_async(conn)
            .await?;
        for id in due {
            Self::leave_state(conn, queue, &id, JobState::Delayed).await?;
            let _: () = redis::cmd("HSET")
                .arg(keys::job(queue, &id))
                .arg(convert::F_STATE)
                .arg(JobState::Waiting.to_string())
                .query_async(conn)
                .await?;
            Self::enter_state(conn, queue, &id, JobState::Waiting, now_ms()).await?;
            let _: () = redis::cmd("LPUSH")
                .arg(keys::wait_list(queue))
                .arg(&id)
                .query_async(conn)
                .await?;
        }
        Ok(())
    }

    /// Trim a finished-state sorted set to `keep` entries, deleting the
    /// trimmed job hashes.
    async fn trim_finished(
        conn: &mut Connection,
        queue: &str,
        state: JobState,
        keep: u32,
    ) -> Result<(), BrokerError> {
        let key = keys::state(queue, state);
        let stop = -(keep as i64) - 1;
        let trimmed: Vec<String> = redis::cmd("ZRANGE")
            .arg(&key)
            .arg(0)
            .arg(stop)
            .query_async(conn)
            .await?;
        for id in trimmed {
            let _: () = redis::cmd("ZREM").arg(&key).arg(&id).query_async(conn).await?;
            let _: () = redis::cmd("DEL")
                .arg(keys::job(queue, &id))
                .arg(keys::job_children(queue, &id))
                .query_async(conn)
                .await?;
        }
        Ok(())
    }

    /// Release the parent's dependency count; a parent with no pending
    /// children left moves from waiting-children onto the wait list.
    async fn release_parent(
        conn: &mut Connection,
        hash: &HashMap<String, String>,
    ) -> Result<(), BrokerError> {
        let (Some(parent_id), Some(parent_queue)) = (
            hash.get(convert::F_PARENT_ID),
            hash.get(convert::F_PARENT_QUEUE),
        ) else {
            return Ok(());
        };
        let remaining: i64 = redis::cmd("HINCRBY")
            .arg(keys::job(parent_queue, parent_id))
            .arg(convert::F_PENDING_CHILDREN)
            .arg(-1)
            .query_async(conn)
            .await?;
        if remaining > 0 {
            return Ok(());
        }
        Self::leave_state(conn, parent_queue, parent_id, JobState::WaitingChildren).await?;
        let _: () = redis::cmd("HSET")
            .arg(keys::job(parent_queue, parent_id))
            .arg(convert::F_STATE)
            .arg(JobState::Waiting.to_string())
            .query_async(conn)
            .await?;
        Self::enter_state(conn, parent_queue, parent_id, JobState::Waiting, now_ms()).await?;
        let _: () = redis::cmd("LPUSH")
            .arg(keys::wait_list(parent_queue))
            .arg(parent_id)
            .query_async(conn)
            .await?;
        Ok(())
    }

    fn add_flow_node<'a>(
        &'a self,
        node: &'a FlowNodeSpec,
        parent: Option<ChildRef>,
    ) -> BoxFuture<'a, Result<JobId, BrokerError>> {
        Box::pin(async move {
            let mut conn = self.conn().await?;
            let opts = JobOpts::sanitize(node.opts.clone());
            let id = Self::create_job(
                &mut conn,
                &node.queue_name,
                &node.name,
                &node.data,
                &opts,
                parent.as_ref(),
                node.children.len(),
            )
            .await?;
            drop(conn);

            if !node.children.is_empty() {
                let me = ChildRef { queue: node.queue_name.clone(), id: id.to_string() };
                let mut child_refs = Vec::with_capacity(node.children.len());
                for child in &node.children {
                    let child_id = self.add_flow_node(child, Some(me.clone())).await?;
                    child_refs.push(ChildRef {
                        queue: child.queue_name.clone(),
                        id: child_id.to_string(),
                    });
                }
                let mut conn = self.conn().await?;
                let _: () = redis::cmd("SET")
                    .arg(keys::job_children(&node.queue_name, &id))
                    .arg(serde_json::to_string(&child_refs)?)
                    .query_async(&mut conn)
                    .await?;
            }
            Ok(id)
        })
    }

    fn remove_cascade<'a>(
        &'a self,
        queue: &'a str,
        id: &'a JobId,
        removed: &'a mut Vec<RemovedJob>,
    ) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let children: Option<String> = {
                let mut conn = self.conn().await?;
                redis::cmd("GET")
                    .arg(keys::job_children(queue, id))
                    .query_async(&mut conn)
                    .await?
            };
            if let Some(raw) = children {
                let refs: Vec<ChildRef> = serde_json::from_str(&raw).unwrap_or_default();
                for child in refs {
                    let child_id = JobId::from_string(child.id.clone());
                    self.remove_cascade(&child.queue, &child_id, removed).await?;
                }
            }

            match self.remove_job(queue, id).await {
                Ok(true) => removed.push(RemovedJob {
                    job_id: id.clone(),
                    queue_name: queue.to_string(),
                    status: RemovalStatus::Success,
                    error: None,
                }),
                Ok(false) => removed.push(RemovedJob {
                    job_id: id.clone(),
                    queue_name: queue.to_string(),
                    status: RemovalStatus::NotFound,
                    error: None,
                }),
                Err(e) => removed.push(RemovedJob {
                    job_id: id.clone(),
                    queue_name: queue.to_string(),
                    status: RemovalStatus::Failed,
                    error: Some(e.to_string()),
                }),
            }
            Ok(())
        })
    }

    async fn store_scheduler(
        conn: &mut Connection,
        queue: &str,
        record: &ScheduleRecord,
    ) -> Result<(), BrokerError> {
        let _: () = redis::cmd("HSET")
            .arg(keys::schedulers(queue))
            .arg(record.key.as_str())
            .arg(serde_json::to_string(record)?)
            .query_async(conn)
            .await?;
        match record.next {
            Some(next) => {
                let _: () = redis::cmd("ZADD")
                    .arg(keys::schedulers_due(queue))
                    .arg(next)
                    .arg(record.key.as_str())
                    .query_async(conn)
                    .await?;
            }
            None => {
                let _: () = redis::cmd("ZREM")
                    .arg(keys::schedulers_due(queue))
                    .arg(record.key.as_str())
                    .query_async(conn)
                    .await?;
            }
        }
        Ok(())
    }

    /// Materialize every due schedule once. Returns the number fired.
    pub async fn run_due_schedules(&self, queue: &str) -> Result<u32, BrokerError> {
        let now = now_ms();
        let due: Vec<String> = {
            let mut conn = self.conn().await?;
            redis::cmd("ZRANGEBYSCORE")
                .arg(keys::schedulers_due(queue))
                .arg("-inf")
                .arg(now)
                .query_async(&mut conn)
                .await?
        };

        let mut fired = 0;
        for key in due {
            let raw: Option<String> = {
                let mut conn = self.conn().await?;
                redis::cmd("HGET")
                    .arg(keys::schedulers(queue))
                    .arg(&key)
                    .query_async(&mut conn)
                    .await?
            };
            let Some(raw) = raw else {
                let mut conn = self.conn().await?;
                let _: () = redis::cmd("ZREM")
                    .arg(keys::schedulers_due(queue))
                    .arg(&key)
                    .query_async(&mut conn)
                    .await?;
                continue;
            };
            let mut record: ScheduleRecord = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping malformed scheduler record");
                    continue;
                }
            };

            self.add_job(
                queue,
                &record.job_name,
                record.template.data.clone(),
                record.template.opts.clone(),
            )
            .await?;
            fired += 1;

            record.iteration_count += 1;
            record.next = next_fire(&record.repeat, now, record.iteration_count)?;
            let mut conn = self.conn().await?;
            Self::store_scheduler(&mut conn, queue, &record).await?;
        }
        Ok(fired)
    }

    /// Background task that materializes due recurring jobs until cancelled.
    pub async fn scheduler_daemon(
        self: Arc<Self>,
        queues: Vec<String>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(SCHEDULER_TICK) => {}
            }
            for queue in &queues {
                if let Err(e) = self.run_due_schedules(queue).await {
                    error!(queue = %queue, error = %e, "scheduler tick failed");
                }
            }
        }
        debug!("scheduler daemon stopped");
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn add_job(
        &self,
        queue: &str,
        name: &str,
        data: Value,
        opts: JobOpts,
    ) -> Result<JobId, BrokerError> {
        let mut conn = self.conn().await?;
        Self::create_job(&mut conn, queue, name, &data, &opts, None, 0).await
    }

    async fn job(&self, queue: &str, id: &JobId) -> Result<Option<JobRecord>, BrokerError> {
        let mut conn = self.conn().await?;
        match Self::load_hash(&mut conn, queue, id).await? {
            Some(hash) => Ok(Some(convert::job_from_hash(queue, id, &hash)?)),
            None => Ok(None),
        }
    }

    async fn jobs_in_states(
        &self,
        queue: &str,
        states: &[JobState],
    ) -> Result<Vec<JobRecord>, BrokerError> {
        let mut conn = self.conn().await?;
        let mut jobs = Vec::new();
        for &state in states {
            let key = keys::state(queue, state);
            let ids: Vec<String> = if keys::is_zset_state(state) {
                redis::cmd("ZRANGE").arg(&key).arg(0).arg(-1).query_async(&mut conn).await?
            } else {
                redis::cmd("SMEMBERS").arg(&key).query_async(&mut conn).await?
            };
            for raw in ids {
                let id = JobId::from_string(raw);
                let Some(hash) = Self::load_hash(&mut conn, queue, &id).await? else {
                    continue;
                };
                match convert::job_from_hash(queue, &id, &hash) {
                    Ok(job) => jobs.push(job),
                    Err(e) => warn!(queue, id = %id, error = %e, "skipping malformed job"),
                }
            }
        }
        Ok(jobs)
    }

    async fn remove_job(&self, queue: &str, id: &JobId) -> Result<bool, BrokerError> {
        let mut conn = self.conn().await?;
        let exists: bool = redis::cmd("EXISTS")
            .arg(keys::job(queue, id))
            .query_async(&mut conn)
            .await?;
        if !exists {
            return Ok(false);
        }
        Self::clear_membership(&mut conn, queue, id).await?;
        let _: () = redis::cmd("DEL")
            .arg(keys::job(queue, id))
            .arg(keys::job_children(queue, id))
            .query_async(&mut conn)
            .await?;
        Ok(true)
    }

    async fn upsert_scheduler(
        &self,
        queue: &str,
        mut record: ScheduleRecord,
    ) -> Result<(), BrokerError> {
        if record.next.is_none() {
            record.next = next_fire(&record.repeat, now_ms(), record.iteration_count)?;
        }
        let mut conn = self.conn().await?;
        Self::store_scheduler(&mut conn, queue, &record).await
    }

    async fn schedulers(&self, queue: &str) -> Result<Vec<ScheduleRecord>, BrokerError> {
        let mut conn = self.conn().await?;
        let raw: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(keys::schedulers(queue))
            .query_async(&mut conn)
            .await?;
        let mut records = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            match serde_json::from_str::<ScheduleRecord>(&value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key = %key, error = %e, "skipping malformed scheduler record"),
            }
        }
        records.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(records)
    }

    async fn scheduler(
        &self,
        queue: &str,
        key: &SchedulerKey,
    ) -> Result<Option<ScheduleRecord>, BrokerError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = redis::cmd("HGET")
            .arg(keys::schedulers(queue))
            .arg(key.as_str())
            .query_async(&mut conn)
            .await?;
        match raw {
            Some(raw) => {
                let record = serde_json::from_str(&raw).map_err(|source| {
                    BrokerError::MalformedScheduler { key: key.to_string(), source }
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn remove_scheduler(
        &self,
        queue: &str,
        key: &SchedulerKey,
    ) -> Result<bool, BrokerError> {
        let mut conn = self.conn().await?;
        let removed: i64 = redis::cmd("HDEL")
            .arg(keys::schedulers(queue))
            .arg(key.as_str())
            .query_async(&mut conn)
            .await?;
        let _: () = redis::cmd("ZREM")
            .arg(keys::schedulers_due(queue))
            .arg(key.as_str())
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn add_flow(&self, root: &FlowNodeSpec) -> Result<JobId, BrokerError> {
        self.add_flow_node(root, None).await
    }

    async fn remove_job_cascade(
        &self,
        queue: &str,
        id: &JobId,
    ) -> Result<Vec<RemovedJob>, BrokerError> {
        let mut removed = Vec::new();
        self.remove_cascade(queue, id, &mut removed).await?;
        Ok(removed)
    }

    async fn subscribe(&self, queue: &str) -> Result<mpsc::Receiver<QueueEvent>, BrokerError> {
        let client = redis::Client::open(self.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(keys::events_channel(queue)).await?;

        let (tx, rx) = mpsc::channel(256);
        let queue = queue.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(queue = %queue, error = %e, "undecodable event payload");
                        continue;
                    }
                };
                let event: QueueEvent = match serde_json::from_str(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(queue = %queue, error = %e, "malformed queue event");
                        continue;
                    }
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            debug!(queue = %queue, "event subscription closed");
        });
        Ok(rx)
    }

    async fn fetch_next(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobRecord>, BrokerError> {
        let mut conn = self.conn().await?;
        Self::promote_delayed(&mut conn, queue).await?;

        let popped: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(keys::wait_list(queue))
            .arg(keys::active_list(queue))
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        let Some(raw) = popped else { return Ok(None) };
        let id = JobId::from_string(raw);

        Self::leave_state(&mut conn, queue, &id, JobState::Waiting).await?;
        Self::enter_state(&mut conn, queue, &id, JobState::Active, now_ms()).await?;
        let _: () = redis::cmd("HSET")
            .arg(keys::job(queue, &id))
            .arg(convert::F_STATE)
            .arg(JobState::Active.to_string())
            .arg(convert::F_PROCESSED_ON)
            .arg(now_ms())
            .query_async(&mut conn)
            .await?;

        match Self::load_hash(&mut conn, queue, &id).await? {
            Some(hash) => Ok(Some(convert::job_from_hash(queue, &id, &hash)?)),
            None => Ok(None),
        }
    }

    async fn complete_job(
        &self,
        queue: &str,
        id: &JobId,
        result: Value,
    ) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        let Some(hash) = Self::load_hash(&mut conn, queue, id).await? else {
            warn!(queue, id = %id, "completing unknown job");
            return Ok(());
        };
        let finished = now_ms();

        let _: () = redis::cmd("LREM")
            .arg(keys::active_list(queue))
            .arg(0)
            .arg(id.as_str())
            .query_async(&mut conn)
            .await?;
        Self::leave_state(&mut conn, queue, id, JobState::Active).await?;
        let _: () = redis::cmd("HSET")
            .arg(keys::job(queue, id))
            .arg(convert::F_STATE)
            .arg(JobState::Completed.to_string())
            .arg(convert::F_RETURNVALUE)
            .arg(serde_json::to_string(&result)?)
            .arg(convert::F_FINISHED_ON)
            .arg(finished)
            .query_async(&mut conn)
            .await?;
        Self::enter_state(&mut conn, queue, id, JobState::Completed, finished).await?;

        let opts: JobOpts = hash
            .get(convert::F_OPTS)
            .map(|raw| serde_json::from_str(raw))
            .transpose()?
            .unwrap_or_default();
        if let Some(keep) = opts.remove_on_complete {
            Self::trim_finished(&mut conn, queue, JobState::Completed, keep.count).await?;
        }

        Self::release_parent(&mut conn, &hash).await?;

        Self::publish(
            &mut conn,
            queue,
            &QueueEvent {
                queue: queue.to_string(),
                job_id: id.clone(),
                kind: QueueEventKind::Completed,
                payload: result,
            },
        )
        .await
    }

    async fn fail_job(&self, queue: &str, id: &JobId, error: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        let Some(hash) = Self::load_hash(&mut conn, queue, id).await? else {
            warn!(queue, id = %id, "failing unknown job");
            return Ok(());
        };

        let _: () = redis::cmd("LREM")
            .arg(keys::active_list(queue))
            .arg(0)
            .arg(id.as_str())
            .query_async(&mut conn)
            .await?;
        Self::leave_state(&mut conn, queue, id, JobState::Active).await?;

        let opts: JobOpts = hash
            .get(convert::F_OPTS)
            .map(|raw| serde_json::from_str(raw))
            .transpose()?
            .unwrap_or_default();
        let allowed = opts.attempts.unwrap_or(1).max(1);
        let made: i64 = redis::cmd("HINCRBY")
            .arg(keys::job(queue, id))
            .arg(convert::F_ATTEMPTS_MADE)
            .arg(1)
            .query_async(&mut conn)
            .await?;

        if (made as u32) < allowed {
            // Retry with exponential backoff.
            let backoff = BACKOFF_BASE_MS.saturating_mul(1 << (made.max(1) as u32 - 1).min(16));
            let _: () = redis::cmd("HSET")
                .arg(keys::job(queue, id))
                .arg(convert::F_STATE)
                .arg(JobState::Delayed.to_string())
                .query_async(&mut conn)
                .await?;
            Self::enter_state(&mut conn, queue, id, JobState::Delayed, now_ms() + backoff).await?;
            return Ok(());
        }

        let finished = now_ms();
        let _: () = redis::cmd("HSET")
            .arg(keys::job(queue, id))
            .arg(convert::F_STATE)
            .arg(JobState::Failed.to_string())
            .arg(convert::F_FAILED_REASON)
            .arg(error)
            .arg(convert::F_FINISHED_ON)
            .arg(finished)
            .query_async(&mut conn)
            .await?;
        Self::enter_state(&mut conn, queue, id, JobState::Failed, finished).await?;
        if let Some(keep) = opts.remove_on_fail {
            Self::trim_finished(&mut conn, queue, JobState::Failed, keep.count).await?;
        }

        Self::publish(
            &mut conn,
            queue,
            &QueueEvent {
                queue: queue.to_string(),
                job_id: id.clone(),
                kind: QueueEventKind::Failed,
                payload: Value::String(error.to_string()),
            },
        )
        .await
    }

    async fn report_progress(
        &self,
        queue: &str,
        id: &JobId,
        progress: Value,
    ) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("HSET")
            .arg(keys::job(queue, id))
            .arg(convert::F_PROGRESS)
            .arg(serde_json::to_string(&progress)?)
            .query_async(&mut conn)
            .await?;
        Self::publish(
            &mut conn,
            queue,
            &QueueEvent {
                queue: queue.to_string(),
                job_id: id.clone(),
                kind: QueueEventKind::Progress,
                payload: progress,
            },
        )
        .await
    }
}
