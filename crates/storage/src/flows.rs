// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow row persistence. `job_structure` and `progress` are stored as JSONB.

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jf_core::{Flow, FlowId, FlowProgress, FlowStatus, JobId, JobStructure, UserId};
use sqlx::PgPool;

#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn insert(&self, flow: &Flow) -> Result<(), StorageError>;

    /// Write the whole row back; a single transactional write per update.
    async fn update(&self, flow: &Flow) -> Result<(), StorageError>;

    async fn get(&self, id: &FlowId) -> Result<Option<Flow>, StorageError>;

    /// All flows, newest first, optionally scoped to one owner.
    async fn list(&self, user: Option<UserId>) -> Result<Vec<Flow>, StorageError>;

    async fn delete(&self, id: &FlowId) -> Result<bool, StorageError>;
}

fn status_to_str(status: FlowStatus) -> String {
    status.to_string()
}

fn status_from_str(raw: &str) -> Result<FlowStatus, StorageError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| StorageError::Corrupt(format!("unknown flow status {raw:?}")))
}

#[derive(sqlx::FromRow)]
struct FlowRow {
    flow_id: String,
    flowname: String,
    name: String,
    queue_name: String,
    user_id: i64,
    root_job_id: Option<String>,
    status: String,
    job_structure: serde_json::Value,
    progress: serde_json::Value,
    result: Option<serde_json::Value>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<FlowRow> for Flow {
    type Error = StorageError;

    fn try_from(row: FlowRow) -> Result<Self, StorageError> {
        let job_structure: JobStructure = serde_json::from_value(row.job_structure)
            .map_err(|e| StorageError::Corrupt(format!("job_structure: {e}")))?;
        let progress: FlowProgress = serde_json::from_value(row.progress)
            .map_err(|e| StorageError::Corrupt(format!("progress: {e}")))?;
        Ok(Flow {
            flow_id: FlowId::from_string(row.flow_id),
            flowname: row.flowname,
            name: row.name,
            queue_name: row.queue_name,
            user_id: UserId(row.user_id as u64),
            root_job_id: row.root_job_id.map(JobId::from_string),
            status: status_from_str(&row.status)?,
            job_structure,
            progress,
            result: row.result,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// Postgres-backed flow store.
pub struct PgFlowStore {
    pool: PgPool,
}

impl PgFlowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlowStore for PgFlowStore {
    async fn insert(&self, flow: &Flow) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO flows \
             (flow_id, flowname, name, queue_name, user_id, root_job_id, status, \
              job_structure, progress, result, error, created_at, updated_at, \
              started_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(flow.flow_id.as_str())
        .bind(&flow.flowname)
        .bind(&flow.name)
        .bind(&flow.queue_name)
        .bind(flow.user_id.as_u64() as i64)
        .bind(flow.root_job_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(status_to_str(flow.status))
        .bind(serde_json::to_value(&flow.job_structure)?)
        .bind(serde_json::to_value(&flow.progress)?)
        .bind(&flow.result)
        .bind(&flow.error)
        .bind(flow.created_at)
        .bind(flow.updated_at)
        .bind(flow.started_at)
        .bind(flow.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, flow: &Flow) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE flows SET \
             root_job_id = $2, status = $3, job_structure = $4, progress = $5, \
             result = $6, error = $7, updated_at = $8, started_at = $9, completed_at = $10 \
             WHERE flow_id = $1",
        )
        .bind(flow.flow_id.as_str())
        .bind(flow.root_job_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(status_to_str(flow.status))
        .bind(serde_json::to_value(&flow.job_structure)?)
        .bind(serde_json::to_value(&flow.progress)?)
        .bind(&flow.result)
        .bind(&flow.error)
        .bind(flow.updated_at)
        .bind(flow.started_at)
        .bind(flow.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &FlowId) -> Result<Option<Flow>, StorageError> {
        let row: Option<FlowRow> = sqlx::query_as("SELECT * FROM flows WHERE flow_id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, user: Option<UserId>) -> Result<Vec<Flow>, StorageError> {
        let rows: Vec<FlowRow> = match user {
            Some(user) => {
                sqlx::query_as(
                    "SELECT * FROM flows WHERE user_id = $1 ORDER BY created_at DESC",
                )
                .bind(user.as_u64() as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM flows ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete(&self, id: &FlowId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM flows WHERE flow_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory flow store for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct MemoryFlowStore {
    flows: parking_lot::Mutex<Vec<Flow>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn insert(&self, flow: &Flow) -> Result<(), StorageError> {
        self.flows.lock().push(flow.clone());
        Ok(())
    }

    async fn update(&self, flow: &Flow) -> Result<(), StorageError> {
        let mut flows = self.flows.lock();
        if let Some(existing) = flows.iter_mut().find(|f| f.flow_id == flow.flow_id) {
            *existing = flow.clone();
        }
        Ok(())
    }

    async fn get(&self, id: &FlowId) -> Result<Option<Flow>, StorageError> {
        Ok(self.flows.lock().iter().find(|f| f.flow_id == *id).cloned())
    }

    async fn list(&self, user: Option<UserId>) -> Result<Vec<Flow>, StorageError> {
        let mut flows: Vec<Flow> = self
            .flows
            .lock()
            .iter()
            .filter(|f| user.map(|u| f.user_id == u).unwrap_or(true))
            .cloned()
            .collect();
        flows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(flows)
    }

    async fn delete(&self, id: &FlowId) -> Result<bool, StorageError> {
        let mut flows = self.flows.lock();
        let before = flows.len();
        flows.retain(|f| f.flow_id != *id);
        Ok(flows.len() < before)
    }
}

#[cfg(test)]
#[path = "flows_tests.rs"]
mod tests;
