// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoint for the push channel.
//!
//! A connection authenticates on upgrade, joins its own `user:{id}` room,
//! and can join flow/job rooms via client commands. Room joins are subject
//! to the same ownership rules as the HTTP surface: foreign flows and jobs
//! are silently skipped.

use crate::error::ApiError;
use crate::push::hub::Envelope;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use jf_core::{Caller, ClientCommand, Room};
use jf_engine::{ServiceError, PRIMARY_QUEUE};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "apiKey")]
    api_key: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let caller = match (&query.token, &query.api_key) {
        (Some(token), _) => state.auth.verify_bearer(token).await?,
        (None, Some(key)) => state.auth.verify_api_key(key).await?,
        (None, None) => return Err(ApiError(ServiceError::Unauthenticated)),
    };
    Ok(ws.on_upgrade(move |socket| client_loop(socket, state, caller)))
}

async fn client_loop(mut socket: WebSocket, state: AppState, caller: Caller) {
    let mut rooms: HashSet<String> = HashSet::new();
    rooms.insert(Room::User(caller.user_id).to_string());
    let mut events = state.hub.subscribe();
    debug!(user = %caller.user_id, "push client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_command(&state, &caller, &mut rooms, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(user = %caller.user_id, error = %e, "push client read error");
                        break;
                    }
                }
            }
            envelope = events.recv() => {
                match envelope {
                    Ok(Envelope { room, message }) if rooms.contains(&room) => {
                        let text = match serde_json::to_string(&message) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "unserializable push message");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(user = %caller.user_id, missed, "push client lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
    debug!(user = %caller.user_id, "push client disconnected");
}

/// Apply one client command to the connection's room set.
async fn handle_command(
    state: &AppState,
    caller: &Caller,
    rooms: &mut HashSet<String>,
    text: &str,
) {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            debug!(error = %e, "ignoring malformed push command");
            return;
        }
    };

    match command {
        ClientCommand::JoinFlow { flow_id } => {
            match state.flows.get_flow(&flow_id).await {
                Ok(flow) if flow.user_id == caller.user_id => {
                    rooms.insert(Room::Flow(flow_id).to_string());
                }
                Ok(_) => debug!(flow = %flow_id, "join-flow denied: not the owner"),
                Err(e) => debug!(flow = %flow_id, error = %e, "join-flow failed"),
            }
        }
        ClientCommand::LeaveFlow { flow_id } => {
            rooms.remove(&Room::Flow(flow_id).to_string());
        }
        ClientCommand::SubscribeJob { job_id } => {
            let owned = match state.registry.queue(PRIMARY_QUEUE) {
                Ok(handle) => matches!(
                    handle.job(&job_id).await,
                    Ok(Some(job)) if job.is_owned_by(caller.user_id)
                ),
                Err(_) => false,
            };
            if owned {
                rooms.insert(Room::Job(job_id).to_string());
            } else {
                debug!(job = %job_id, "subscribe:job denied");
            }
        }
        ClientCommand::UnsubscribeJob { job_id } => {
            rooms.remove(&Room::Job(job_id).to_string());
        }
    }
}
