// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn enumerable_excludes_stuck() {
    assert!(!JobState::ENUMERABLE.contains(&JobState::Stuck));
    assert_eq!(JobState::ENUMERABLE.len(), 7);
}

#[parameterized(
    waiting = { "waiting", JobState::Waiting },
    active = { "active", JobState::Active },
    completed = { "completed", JobState::Completed },
    failed = { "failed", JobState::Failed },
    delayed = { "delayed", JobState::Delayed },
    waiting_children = { "waiting-children", JobState::WaitingChildren },
    paused = { "paused", JobState::Paused },
)]
fn parse_filter_accepts(input: &str, expected: JobState) {
    assert_eq!(JobState::parse_filter(input), Some(expected));
}

#[parameterized(
    stuck = { "stuck" },
    unknown = { "done" },
    empty = { "" },
)]
fn parse_filter_rejects(input: &str) {
    assert_eq!(JobState::parse_filter(input), None);
}

#[test]
fn display_matches_wire_names() {
    assert_eq!(JobState::WaitingChildren.to_string(), "waiting-children");
    assert_eq!(JobState::Stuck.to_string(), "stuck");
}

#[test]
fn serde_uses_kebab_case() {
    let json = serde_json::to_string(&JobState::WaitingChildren).unwrap();
    assert_eq!(json, "\"waiting-children\"");
    let parsed: JobState = serde_json::from_str("\"waiting-children\"").unwrap();
    assert_eq!(parsed, JobState::WaitingChildren);
}

#[test]
fn terminal_states() {
    assert!(JobState::Completed.is_terminal());
    assert!(JobState::Failed.is_terminal());
    assert!(JobState::Stuck.is_terminal());
    assert!(!JobState::Active.is_terminal());
    assert!(!JobState::Waiting.is_terminal());
}
