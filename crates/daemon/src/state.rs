// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state handed to every request handler.

use crate::push::Hub;
use jf_broker::Broker;
use jf_core::SystemClock;
use jf_engine::{
    AuthConfig, AuthService, DashboardService, FlowService, JobService, QueueRegistry,
    SchedulerService, WebhookService,
};
use jf_storage::{ApiKeyStore, FlowStore, UserStore, WebhookStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService<SystemClock>>,
    pub jobs: Arc<JobService>,
    pub scheduler: Arc<SchedulerService<SystemClock>>,
    pub flows: Arc<FlowService<SystemClock>>,
    pub webhooks: Arc<WebhookService<SystemClock>>,
    pub dashboard: Arc<DashboardService<SystemClock>>,
    pub registry: Arc<QueueRegistry>,
    pub hub: Arc<Hub>,
}

/// Backing stores and the broker, wired together into the service graph.
pub struct Deps {
    pub broker: Arc<dyn Broker>,
    pub users: Arc<dyn UserStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub webhooks: Arc<dyn WebhookStore>,
    pub flows: Arc<dyn FlowStore>,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn build(deps: Deps) -> Self {
        let clock = SystemClock;
        let hub = Arc::new(Hub::new());
        let registry = Arc::new(QueueRegistry::with_default_queues(deps.broker));
        let auth = Arc::new(AuthService::new(
            deps.users,
            deps.api_keys,
            deps.auth_config,
            clock.clone(),
        ));
        let jobs = Arc::new(JobService::new(registry.clone()));
        let scheduler = Arc::new(SchedulerService::new(registry.clone(), clock.clone()));
        let flows = Arc::new(FlowService::new(
            deps.flows,
            registry.clone(),
            hub.clone(),
            clock.clone(),
        ));
        let webhook_service = Arc::new(WebhookService::new(deps.webhooks.clone(), clock));
        let dashboard = Arc::new(DashboardService::new(
            registry.clone(),
            scheduler.clone(),
            deps.webhooks,
        ));
        Self {
            auth,
            jobs,
            scheduler,
            flows,
            webhooks: webhook_service,
            dashboard,
            registry,
            hub,
        }
    }
}
