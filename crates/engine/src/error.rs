// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-level errors, one variant per outcome kind the HTTP layer maps
//! onto a status code.

use jf_broker::BrokerError;
use jf_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input: unknown queue, bad status filter, invalid body.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid, or expired credential.
    #[error("invalid credentials")]
    Unauthenticated,

    /// Valid credential, but the caller does not own the resource.
    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate username, webhook tuple, or API-key name.
    #[error("duplicate {0}")]
    Conflict(String),

    /// Broker unavailable or misbehaving; the caller may retry.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Relational store unavailable or misbehaving; the caller may retry.
    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(what) => ServiceError::Conflict(what),
            other => ServiceError::Storage(other),
        }
    }
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        ServiceError::Internal(msg.to_string())
    }
}
