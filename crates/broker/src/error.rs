// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from broker operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("malformed job record for {id} in {queue}: {reason}")]
    MalformedJob {
        queue: String,
        id: String,
        reason: String,
    },

    #[error("malformed scheduler record {key}")]
    MalformedScheduler {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid cron pattern {pattern:?}: {reason}")]
    InvalidCronPattern { pattern: String, reason: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
