// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job service: submit, fetch, list, delete — always scoped to the caller.
//!
//! The broker has no per-user index, so listing filters by owner *after*
//! retrieval and paginates after filtering.

use crate::error::ServiceError;
use crate::registry::QueueRegistry;
use jf_core::{Caller, JobId, JobOpts, JobRecord, JobState, JobView, USER_ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Listing parameters. Pages are 1-based.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl Default for ListQuery {
    fn default() -> Self {
        Self { status: None, page: 1, limit: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u32,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<JobView>,
    pub pagination: Pagination,
}

pub struct JobService {
    registry: Arc<QueueRegistry>,
}

impl JobService {
    pub fn new(registry: Arc<QueueRegistry>) -> Self {
        Self { registry }
    }

    /// Submit a job. `opts` that fail to decode are logged and replaced with
    /// defaults; the call still succeeds. The caller's id is injected into
    /// the payload.
    pub async fn submit(
        &self,
        queue: &str,
        name: &str,
        data: Value,
        opts: Option<Value>,
        caller: &Caller,
    ) -> Result<JobId, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::validation("job name must not be empty"));
        }
        let handle = self.registry.queue(queue)?;
        let opts = JobOpts::sanitize(opts);
        let data = inject_user(data, caller);
        Ok(handle.add_job(name, data, opts).await?)
    }

    pub async fn get(
        &self,
        queue: &str,
        id: &JobId,
        caller: &Caller,
    ) -> Result<JobView, ServiceError> {
        let handle = self.registry.queue(queue)?;
        let job = handle
            .job(id)
            .await?
            .ok_or(ServiceError::NotFound("job"))?;
        if !job.is_owned_by(caller.user_id) {
            return Err(ServiceError::Forbidden);
        }
        Ok(JobView::from(&job))
    }

    pub async fn list(
        &self,
        queue: &str,
        caller: &Caller,
        query: &ListQuery,
    ) -> Result<JobPage, ServiceError> {
        let handle = self.registry.queue(queue)?;
        let states: Vec<JobState> = match &query.status {
            Some(raw) => {
                let state = JobState::parse_filter(raw).ok_or_else(|| {
                    ServiceError::validation(format!("invalid status filter {raw:?}"))
                })?;
                vec![state]
            }
            None => JobState::ENUMERABLE.to_vec(),
        };

        let mut jobs: Vec<JobRecord> = handle
            .jobs_in_states(&states)
            .await?
            .into_iter()
            .filter(|job| job.is_owned_by(caller.user_id))
            .collect();
        jobs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = jobs.len() as u32;
        let limit = query.limit.max(1);
        let page = query.page.max(1);
        let pages = total.div_ceil(limit);
        let start = ((page - 1) * limit) as usize;
        let selected: Vec<JobView> = jobs
            .iter()
            .skip(start)
            .take(limit as usize)
            .map(JobView::from)
            .collect();

        Ok(JobPage {
            jobs: selected,
            pagination: Pagination { total, page, limit, pages },
        })
    }

    pub async fn delete(
        &self,
        queue: &str,
        id: &JobId,
        caller: &Caller,
    ) -> Result<(), ServiceError> {
        let handle = self.registry.queue(queue)?;
        let job = handle
            .job(id)
            .await?
            .ok_or(ServiceError::NotFound("job"))?;
        if !job.is_owned_by(caller.user_id) {
            return Err(ServiceError::Forbidden);
        }
        if !handle.remove_job(id).await? {
            return Err(ServiceError::NotFound("job"));
        }
        Ok(())
    }
}

/// Set `data.userId` to the caller, wrapping non-object payloads.
pub(crate) fn inject_user(data: Value, caller: &Caller) -> Value {
    let mut obj = match data {
        Value::Object(obj) => obj,
        Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".into(), other);
            map
        }
    };
    obj.insert(USER_ID_FIELD.into(), Value::from(caller.user_id.as_u64()));
    Value::Object(obj)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
