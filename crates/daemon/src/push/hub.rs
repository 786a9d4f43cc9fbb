// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push hub: fan-out of push messages to connected clients by room.
//!
//! Emission is fire-and-forget over a broadcast channel; each connection
//! filters by its joined rooms. A hub with no listeners drops messages
//! silently, which is the contract.

use jf_core::{Push, PushMessage, Room};
use tokio::sync::broadcast;

const HUB_CAPACITY: usize = 1024;

/// One routed message on the hub.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub room: String,
    pub message: PushMessage,
}

pub struct Hub {
    tx: broadcast::Sender<Envelope>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Number of live subscribers (connections).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Push for Hub {
    fn emit(&self, room: &Room, message: PushMessage) {
        // A send error just means nobody is listening.
        let _ = self.tx.send(Envelope { room: room.to_string(), message });
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
