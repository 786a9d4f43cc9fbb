// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring-job schedules and the structured scheduler key.

use crate::id::UserId;
use crate::job::JobOpts;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scheduler key structured as `"{userId}-{jobName}-{createdMs}"`.
///
/// Ownership is decidable from the key alone: a key belongs to user `U`
/// iff it starts with `"{U}-"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchedulerKey(String);

impl SchedulerKey {
    pub fn compose(user: UserId, job_name: &str, created_ms: u64) -> Self {
        Self(format!("{}-{}-{}", user, job_name, created_ms))
    }

    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.0.starts_with(&format!("{}-", user))
    }
}

impl std::fmt::Display for SchedulerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchedulerKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for SchedulerKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// How a schedule repeats: a cron pattern or a fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Interval in milliseconds (mutually exclusive with `pattern`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<u64>,

    /// Maximum number of iterations to produce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
}

/// Client-supplied schedule block on a scheduled submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<u64>,
}

/// Interval repeat block on a scheduled submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatSpec {
    pub every: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ScheduleSpec {
    /// Build the broker repeat options: `cron` wins over `repeat.every`.
    /// Returns `None` when neither is present.
    pub fn to_repeat_opts(&self) -> Option<RepeatOpts> {
        let mut opts = if let Some(pattern) = &self.cron {
            RepeatOpts {
                pattern: Some(pattern.clone()),
                every: None,
                limit: None,
                start_date: None,
                end_date: None,
                tz: self.tz.clone(),
            }
        } else if let Some(repeat) = &self.repeat {
            RepeatOpts {
                pattern: None,
                every: Some(repeat.every),
                limit: repeat.limit,
                start_date: None,
                end_date: None,
                tz: None,
            }
        } else {
            return None;
        };
        opts.start_date = self.start_date;
        opts.end_date = self.end_date;
        Some(opts)
    }
}

/// Job template materialized on each iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub data: Value,
    pub opts: JobOpts,
}

/// A registered recurring schedule as the broker reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub key: SchedulerKey,
    pub queue: String,
    pub job_name: String,
    pub template: ScheduleTemplate,
    pub repeat: RepeatOpts,
    /// Next fire time, epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    #[serde(default)]
    pub iteration_count: u64,
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
