// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: wire the stores and broker into the service graph,
//! spawn the background consumers, serve HTTP, and drain on shutdown.
//!
//! In-flight broker writes are allowed to complete; the broker is the
//! source of truth.

use crate::env::{Config, ConfigError};
use crate::routes;
use crate::state::{AppState, Deps};
use jf_broker::{BrokerError, RedisBroker};
use jf_engine::{
    AuthConfig, EventDemux, ServiceError, WebhookWorker, DEFAULT_QUEUES, SCHEDULER_QUEUE,
};
use jf_storage::{
    PgApiKeyStore, PgFlowStore, PgUserStore, PgWebhookStore, StorageError, UserStore, WebhookStore,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long shutdown waits for background consumers to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the daemon until interrupted.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let pool = jf_storage::connect(&config.database_url).await?;
    jf_storage::bootstrap(&pool).await?;
    info!("relational store ready");

    let broker = Arc::new(RedisBroker::connect(config.redis_url.clone())?);

    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let webhook_store: Arc<dyn WebhookStore> = Arc::new(PgWebhookStore::new(pool.clone()));

    let mut auth_config =
        AuthConfig::new(&config.token_secret, &config.refresh_token_secret);
    auth_config.token_expiry = config.token_expiry;
    auth_config.refresh_expiry = config.refresh_token_expiry;

    let state = AppState::build(Deps {
        broker: broker.clone(),
        users: users.clone(),
        api_keys: Arc::new(PgApiKeyStore::new(pool.clone())),
        webhooks: webhook_store.clone(),
        flows: Arc::new(PgFlowStore::new(pool)),
        auth_config,
    });

    let cancel = CancellationToken::new();
    let mut workers = Vec::new();

    let demux = EventDemux::new(
        state.registry.clone(),
        state.flows.clone(),
        state.hub.clone(),
    );
    let demux_cancel = cancel.clone();
    workers.push(tokio::spawn(async move {
        if let Err(e) = demux.run(demux_cancel).await {
            error!(error = %e, "event demux exited");
        }
    }));

    let webhook_worker = WebhookWorker::new(state.registry.clone(), webhook_store, users)?;
    let worker_cancel = cancel.clone();
    workers.push(tokio::spawn(async move {
        if let Err(e) = webhook_worker.run(worker_cancel).await {
            error!(error = %e, "webhook worker exited");
        }
    }));

    // The scheduler primitive lives broker-side; the daemon just ticks it.
    workers.push(tokio::spawn(broker.clone().scheduler_daemon(
        vec![SCHEDULER_QUEUE.to_string()],
        cancel.clone(),
    )));
    info!(queues = ?DEFAULT_QUEUES, "background consumers started");

    let app = routes::router(state);
    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "listening");

    let serve_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            serve_cancel.cancel();
        })
        .await?;

    cancel.cancel();
    drain(workers).await;
    info!("shutdown complete");
    Ok(())
}

async fn drain(workers: Vec<tokio::task::JoinHandle<()>>) {
    let joined = async {
        for worker in workers {
            let _ = worker.await;
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, joined).await.is_err() {
        warn!("background consumers did not drain in time");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "sigterm handler unavailable");
                ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
