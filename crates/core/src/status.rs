// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job states as the broker enumerates them, plus the synthetic `stuck`.
//!
//! `stuck` is reported-only: it can arrive in a flow progress report but the
//! broker never produces it, so listing and dashboard tallies use
//! [`JobState::ENUMERABLE`].

use serde::{Deserialize, Serialize};

/// State of a single broker job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
    WaitingChildren,
    Paused,
    /// Reported-only; never returned by broker enumeration.
    Stuck,
}

impl JobState {
    /// Every state the broker can enumerate jobs by (excludes `stuck`).
    pub const ENUMERABLE: [JobState; 7] = [
        JobState::Waiting,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
        JobState::Delayed,
        JobState::WaitingChildren,
        JobState::Paused,
    ];

    /// Parse a status filter supplied by a client. `stuck` is not accepted.
    pub fn parse_filter(s: &str) -> Option<JobState> {
        let state = match s {
            "waiting" => JobState::Waiting,
            "active" => JobState::Active,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            "delayed" => JobState::Delayed,
            "waiting-children" => JobState::WaitingChildren,
            "paused" => JobState::Paused,
            _ => return None,
        };
        Some(state)
    }

    /// A job in this state has reached its final disposition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Stuck)
    }
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Waiting
    }
}

crate::simple_display! {
    JobState {
        Waiting => "waiting",
        Active => "active",
        Completed => "completed",
        Failed => "failed",
        Delayed => "delayed",
        WaitingChildren => "waiting-children",
        Paused => "paused",
        Stuck => "stuck",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
