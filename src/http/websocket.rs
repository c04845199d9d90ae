//! WebSocket endpoint.
//!
//! # Responsibilities
//! - Accept upgrade requests on the configured path
//! - Pull the credential out of the query string and hand the connection to admission
//! - Answer client heartbeats (`ping` → `pong`)
//! - Remove the session when the peer goes away
//!
//! # Data Flow
//! ```text
//! Client ──upgrade──▶ ws_handler ──▶ AdmissionController::admit
//!                                         │
//!                     read loop ◀─────────┘ (admitted)
//!
//! DeliveryEngine ──send()──▶ outbound queue ──▶ writer task ──▶ Client
//! ```
//!
//! # Design Decisions
//! - One writer task owns the sink; everyone else enqueues frames
//! - The outbound queue is bounded, so a stalled peer makes `send` wait and
//!   the caller's timeout decides
//! - `close` never blocks: it flips state and signals the writer, which
//!   flushes what was already queued before the close frame
//! - After a server-initiated close the read loop waits at most the close
//!   grace for the peer's reply, then drops the socket and its slot

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit};
use tokio::time::{sleep_until, Instant};

use crate::admission::AdmissionOutcome;
use crate::delivery::Envelope;
use crate::http::server::AppState;
use crate::net::connection::{ConnectionId, ConnectionState, StateCell};
use crate::session::{CloseReason, ConnectionError, ConnectionHandle};

/// Literal heartbeat request and reply.
const PING: &str = "ping";
const PONG: &str = "pong";

/// Server side of one upgraded WebSocket.
pub struct WsConnection {
    id: ConnectionId,
    outbound: mpsc::Sender<Message>,
    close_signal: watch::Sender<Option<CloseReason>>,
    state: Arc<StateCell>,
}

impl WsConnection {
    /// Split the socket, spawn its writer task and return the handle plus the
    /// read half.
    pub fn spawn(socket: WebSocket, buffer: usize) -> (Arc<Self>, SplitStream<WebSocket>) {
        let id = ConnectionId::new();
        let (sink, stream) = socket.split();
        let (outbound, queue) = mpsc::channel(buffer.max(1));
        let (close_signal, close_rx) = watch::channel(None);
        let state = Arc::new(StateCell::new());

        tokio::spawn(write_loop(id, sink, queue, close_rx, state.clone()));

        let connection = Arc::new(Self {
            id,
            outbound,
            close_signal,
            state,
        });
        (connection, stream)
    }

    /// Fires once a close has been requested.
    fn closing(&self) -> watch::Receiver<Option<CloseReason>> {
        self.close_signal.subscribe()
    }

    /// Record that the peer is gone; later sends fail fast.
    fn mark_closed(&self) {
        self.state.advance(ConnectionState::Closed);
    }
}

#[async_trait]
impl ConnectionHandle for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, text: String) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }
        self.outbound
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    fn close(&self, reason: CloseReason) -> Result<(), ConnectionError> {
        if self.state.advance(ConnectionState::Closing) != ConnectionState::Open {
            return Err(ConnectionError::Closed);
        }
        self.close_signal.send_replace(Some(reason));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.get() == ConnectionState::Open
    }
}

async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Message>,
    mut close_rx: watch::Receiver<Option<CloseReason>>,
    state: Arc<StateCell>,
) {
    loop {
        tokio::select! {
            biased;

            frame = queue.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        tracing::debug!(connection_id = %id, error = %e, "Write failed");
                        break;
                    }
                }
                None => break,
            },

            changed = close_rx.changed() => {
                if changed.is_err() || close_rx.borrow().is_some() {
                    break;
                }
            }
        }
    }

    let reason = close_rx.borrow_and_update().clone();
    if let Some(reason) = reason {
        while let Ok(frame) = queue.try_recv() {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
        tracing::debug!(connection_id = %id, code = reason.code, reason = %reason.reason, "Sending close frame");
        let frame = CloseFrame {
            code: reason.code,
            reason: reason.reason.into_owned().into(),
        };
        let _ = sink.send(Message::Close(Some(frame))).await;
    }

    state.advance(ConnectionState::Closed);
    let _ = sink.close().await;
}

/// Upgrade handler for the push endpoint.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let permit = match state.connection_slots.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Connection limit reached, refusing upgrade");
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    let websocket = state.websocket.load_full();
    let credential = params.get(&websocket.token_param).cloned();
    let buffer = websocket.outbound_buffer;
    let grace = websocket.close_grace();

    ws.on_upgrade(move |socket| handle_socket(socket, credential, buffer, grace, state, permit))
}

async fn handle_socket(
    socket: WebSocket,
    credential: Option<String>,
    buffer: usize,
    grace: Duration,
    state: AppState,
    _permit: OwnedSemaphorePermit,
) {
    let (connection, mut stream) = WsConnection::spawn(socket, buffer);
    let id = connection.id();
    tracing::debug!(connection_id = %id, "WebSocket upgraded");

    let handle: Arc<dyn ConnectionHandle> = connection.clone();
    let identity = match state.admission.admit(credential.as_deref(), handle).await {
        AdmissionOutcome::Admitted(identity) => identity,
        AdmissionOutcome::Rejected { .. } => return,
    };

    let mut closing = connection.closing();
    let mut deadline = closing
        .borrow_and_update()
        .is_some()
        .then(|| Instant::now() + grace);

    loop {
        let msg = tokio::select! {
            msg = stream.next() => match msg {
                Some(msg) => msg,
                None => break,
            },

            changed = closing.changed(), if deadline.is_none() => {
                if changed.is_err() || closing.borrow_and_update().is_some() {
                    deadline = Some(Instant::now() + grace);
                }
                continue;
            }

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                tracing::debug!(connection_id = %id, "Close not acknowledged, dropping connection");
                break;
            }
        };

        match msg {
            Ok(Message::Text(text)) => {
                if let Some(reply) = reply_to(text.as_str()) {
                    if let Err(e) = connection.send(reply).await {
                        tracing::debug!(connection_id = %id, error = %e, "Heartbeat reply failed");
                        break;
                    }
                } else {
                    tracing::debug!(connection_id = %id, identity_id = %identity.id, "Ignoring client message");
                }
            }
            Ok(Message::Close(frame)) => {
                tracing::debug!(connection_id = %id, frame = ?frame, "Client sent close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    connection.mark_closed();
    if state.registry.unregister(id).is_some() {
        tracing::info!(connection_id = %id, identity_id = %identity.id, "Session closed");
    }
}

#[derive(Deserialize)]
struct ClientFrame<'a> {
    #[serde(rename = "type", borrow)]
    kind: &'a str,
}

/// Reply for a client text frame, if it is a heartbeat.
fn reply_to(text: &str) -> Option<String> {
    let text = text.trim();
    if text.eq_ignore_ascii_case(PING) {
        return Some(PONG.to_string());
    }
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) if frame.kind.eq_ignore_ascii_case(PING) => Envelope::pong().to_json().ok(),
        _ => None,
    }
}
