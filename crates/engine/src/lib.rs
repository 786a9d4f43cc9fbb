// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jf-engine: the orchestration services — queue registry, jobs, schedules,
//! flows, event demultiplexing, webhook delivery, credentials, and the
//! dashboard aggregator.

pub mod auth;
pub mod dashboard;
pub mod demux;
pub mod error;
pub mod flows;
pub mod jobs;
pub mod registry;
pub mod scheduler;
pub mod webhook_worker;
pub mod webhooks;

pub use auth::{AuthConfig, AuthService, CreateApiKeyRequest, CreatedApiKey, TokenPair};
pub use dashboard::{DashboardService, DashboardStats};
pub use demux::{EventDemux, WebhookDelivery};
pub use error::ServiceError;
pub use flows::FlowService;
pub use jobs::{JobPage, JobService, ListQuery, Pagination};
pub use registry::{
    QueueHandle, QueueRegistry, DEFAULT_QUEUES, PRIMARY_QUEUE, SCHEDULER_QUEUE, WEBHOOK_QUEUE,
};
pub use scheduler::{SchedulerService, ScheduleSubmission};
pub use webhook_worker::WebhookWorker;
pub use webhooks::{CreateWebhookRequest, WebhookService};

#[cfg(test)]
mod test_support;
