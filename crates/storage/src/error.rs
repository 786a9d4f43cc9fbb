// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from the relational store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Unique-constraint violation, e.g. a duplicate username or webhook tuple.
    #[error("duplicate {0}")]
    Conflict(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Map an insert/update error, turning unique violations into [`StorageError::Conflict`].
pub(crate) fn map_constraint(e: sqlx::Error, what: &str) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StorageError::Conflict(what.to_string());
        }
    }
    StorageError::Sqlx(e)
}
