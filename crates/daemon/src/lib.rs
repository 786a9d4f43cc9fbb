// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jf-daemon: HTTP surface, push channel, and lifecycle for the Jobforge
//! orchestration core.

pub mod env;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod push;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use push::Hub;
pub use state::{AppState, Deps};
