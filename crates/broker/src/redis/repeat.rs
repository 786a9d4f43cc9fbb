// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Next-fire computation for recurring schedules.
//!
//! Cron patterns are parsed by the `cron` crate. Five-field patterns (the
//! common crontab form) get a seconds column prepended; six- and seven-field
//! patterns pass through.

use crate::error::BrokerError;
use chrono::{DateTime, Utc};
use cron::Schedule;
use jf_core::RepeatOpts;
use std::str::FromStr;

/// Compute the next fire time in epoch milliseconds.
///
/// Returns `None` when the schedule is exhausted: its iteration `limit` is
/// reached, its `end_date` has passed, or the pattern has no future match.
pub fn next_fire(
    repeat: &RepeatOpts,
    now_ms: u64,
    iteration_count: u64,
) -> Result<Option<u64>, BrokerError> {
    if let Some(limit) = repeat.limit {
        if iteration_count >= limit {
            return Ok(None);
        }
    }

    let base_ms = match repeat.start_date {
        Some(start) if start > now_ms => start,
        _ => now_ms,
    };

    let next = if let Some(pattern) = &repeat.pattern {
        next_cron_fire(pattern, base_ms)?
    } else if let Some(every) = repeat.every {
        Some(base_ms + every)
    } else {
        None
    };

    Ok(next.filter(|n| repeat.end_date.map(|end| *n <= end).unwrap_or(true)))
}

fn next_cron_fire(pattern: &str, base_ms: u64) -> Result<Option<u64>, BrokerError> {
    let normalized = normalize_pattern(pattern);
    let schedule = Schedule::from_str(&normalized).map_err(|e| BrokerError::InvalidCronPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let base = DateTime::<Utc>::from_timestamp_millis(base_ms as i64).unwrap_or_default();
    Ok(schedule
        .after(&base)
        .next()
        .map(|dt| dt.timestamp_millis() as u64))
}

/// Prepend a seconds column to five-field crontab patterns.
fn normalize_pattern(pattern: &str) -> String {
    let fields = pattern.split_whitespace().count();
    if fields == 5 {
        format!("0 {pattern}")
    } else {
        pattern.to_string()
    }
}

#[cfg(test)]
#[path = "repeat_tests.rs"]
mod tests;
