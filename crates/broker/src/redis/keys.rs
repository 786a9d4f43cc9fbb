// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis key scheme. Everything lives under `jf:{queue}:*`; the events
//! channel is `jf:events:{queue}`.

use jf_core::JobState;

pub fn job(queue: &str, id: &str) -> String {
    format!("jf:{queue}:job:{id}")
}

pub fn job_children(queue: &str, id: &str) -> String {
    format!("jf:{queue}:job:{id}:children")
}

pub fn id_counter(queue: &str) -> String {
    format!("jf:{queue}:id")
}

pub fn wait_list(queue: &str) -> String {
    format!("jf:{queue}:wait")
}

pub fn active_list(queue: &str) -> String {
    format!("jf:{queue}:active")
}

/// Per-state membership container. Sorted sets for the states that need an
/// order (retention trims, delayed promotion); plain sets otherwise.
pub fn state(queue: &str, state: JobState) -> String {
    format!("jf:{queue}:state:{state}")
}

/// States stored as sorted sets (score: finish time or eligibility time).
pub fn is_zset_state(state: JobState) -> bool {
    matches!(state, JobState::Completed | JobState::Failed | JobState::Delayed)
}

pub fn schedulers(queue: &str) -> String {
    format!("jf:{queue}:schedulers")
}

pub fn schedulers_due(queue: &str) -> String {
    format!("jf:{queue}:schedulers:due")
}

pub fn events_channel(queue: &str) -> String {
    format!("jf:events:{queue}")
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
