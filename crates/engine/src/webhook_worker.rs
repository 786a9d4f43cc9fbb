// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery worker: drains the webhook queue and POSTs payloads to
//! the owner's registered endpoints.
//!
//! Delivery is decoupled from queue events, so a slow endpoint cannot stall
//! the producing queue. Each target gets a bounded number of attempts with
//! exponential backoff; an item fails only when every delivery failed.

use crate::demux::WebhookDelivery;
use crate::error::ServiceError;
use crate::registry::{QueueRegistry, WEBHOOK_QUEUE};
use jf_core::{JobRecord, QueueEventKind};
use jf_storage::{UserStore, WebhookStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-attempt request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Attempts per delivery target.
const MAX_ATTEMPTS: u32 = 3;
/// Base delay between attempts, doubled each retry.
const RETRY_BASE: Duration = Duration::from_secs(1);
/// How long one fetch blocks waiting for work.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WebhookWorker {
    registry: Arc<QueueRegistry>,
    webhooks: Arc<dyn WebhookStore>,
    users: Arc<dyn UserStore>,
    http: reqwest::Client,
}

impl WebhookWorker {
    pub fn new(
        registry: Arc<QueueRegistry>,
        webhooks: Arc<dyn WebhookStore>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ServiceError::internal)?;
        Ok(Self { registry, webhooks, users, http })
    }

    /// Drain the webhook queue until cancelled. Transient errors are logged
    /// and the loop continues; one malformed item never kills the worker.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let handle = self.registry.queue(WEBHOOK_QUEUE)?;
        info!(queue = WEBHOOK_QUEUE, "webhook worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                fetched = handle.fetch_next(FETCH_TIMEOUT) => {
                    let job = match fetched {
                        Ok(Some(job)) => job,
                        Ok(None) => continue,
                        Err(e) => {
                            warn!(error = %e, "webhook fetch failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    };
                    let job_id = job.id.clone();
                    match self.process(&job).await {
                        Ok(results) => {
                            if let Err(e) = handle.complete_job(&job_id, json!(results)).await {
                                warn!(job_id = %job_id, error = %e, "completing delivery job failed");
                            }
                        }
                        Err(reason) => {
                            if let Err(e) = handle.fail_job(&job_id, &reason).await {
                                warn!(job_id = %job_id, error = %e, "failing delivery job failed");
                            }
                        }
                    }
                }
            }
        }
        info!("webhook worker stopped");
        Ok(())
    }

    /// Deliver one queue item to every matching target.
    ///
    /// Returns the per-target outcomes, or an error message when all
    /// deliveries failed (so the broker retries the item).
    pub async fn process(&self, job: &JobRecord) -> Result<Vec<bool>, String> {
        let delivery: WebhookDelivery = serde_json::from_value(job.data.clone())
            .map_err(|e| format!("malformed delivery payload: {e}"))?;

        let targets = self.resolve_targets(&delivery).await;
        if targets.is_empty() {
            debug!(job_id = %job.id, user = %delivery.user_id, "no webhook targets");
            return Ok(Vec::new());
        }

        let payload = serde_json::to_value(&delivery)
            .map_err(|e| format!("unserializable payload: {e}"))?;
        let mut results = Vec::with_capacity(targets.len());
        for url in &targets {
            let delivered = self.post_with_retry(url, &payload).await;
            if !delivered {
                warn!(url = %url, job_id = %job.id, "webhook delivery exhausted retries");
            }
            results.push(delivered);
        }

        if results.iter().all(|ok| !ok) {
            return Err(format!("all {} webhook deliveries failed", results.len()));
        }
        Ok(results)
    }

    /// Registered endpoints for the delivery, falling back to the user's
    /// legacy `webhookUrl` for completion events.
    async fn resolve_targets(&self, delivery: &WebhookDelivery) -> Vec<String> {
        let mut targets: Vec<String> = match self
            .webhooks
            .for_event(delivery.user_id, delivery.event_type)
            .await
        {
            Ok(hooks) => hooks.into_iter().map(|h| h.url).collect(),
            Err(e) => {
                warn!(user = %delivery.user_id, error = %e, "webhook lookup failed");
                Vec::new()
            }
        };

        if targets.is_empty() && delivery.event_type == QueueEventKind::Completed {
            if let Ok(Some(user)) = self.users.by_id(delivery.user_id).await {
                if let Some(url) = user.webhook_url {
                    targets.push(url);
                }
            }
        }
        targets
    }

    async fn post_with_retry(&self, url: &str, payload: &serde_json::Value) -> bool {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.http.post(url).json(payload).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => {
                    debug!(url, attempt, status = %response.status(), "webhook POST rejected");
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "webhook POST failed");
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BASE * 2u32.pow(attempt - 1)).await;
            }
        }
        false
    }
}

#[cfg(test)]
#[path = "webhook_worker_tests.rs"]
mod tests;
