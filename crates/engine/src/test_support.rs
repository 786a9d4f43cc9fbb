// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for service tests.

use jf_broker::FakeBroker;
use jf_core::{Caller, Push, PushMessage, Room, UserId};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::registry::QueueRegistry;

/// Push fabric that records every emission for assertions.
#[derive(Default)]
pub struct RecordingPush {
    emitted: Mutex<Vec<(String, PushMessage)>>,
}

impl RecordingPush {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `(room, event-name)` pairs in emission order.
    pub fn events(&self) -> Vec<(String, String)> {
        self.emitted
            .lock()
            .iter()
            .map(|(room, msg)| (room.clone(), msg.event.clone()))
            .collect()
    }

    pub fn count_event(&self, event: &str) -> usize {
        self.emitted
            .lock()
            .iter()
            .filter(|(_, msg)| msg.event == event)
            .count()
    }

    pub fn messages_for(&self, room: &str) -> Vec<PushMessage> {
        self.emitted
            .lock()
            .iter()
            .filter(|(r, _)| r == room)
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

impl Push for RecordingPush {
    fn emit(&self, room: &Room, message: PushMessage) {
        self.emitted.lock().push((room.to_string(), message));
    }
}

pub fn fake_registry() -> (Arc<QueueRegistry>, Arc<FakeBroker>) {
    let broker = Arc::new(FakeBroker::new());
    let registry = Arc::new(QueueRegistry::with_default_queues(broker.clone()));
    (registry, broker)
}

pub fn alice() -> Caller {
    Caller::new(UserId(1))
}

pub fn bob() -> Caller {
    Caller::new(UserId(2))
}
