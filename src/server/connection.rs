//! Per-socket connection handler
//!
//! Owns one WebSocket for its whole life: admits the session to the
//! registry, forwards inbound frames to it and drains the session's outbound
//! queue back onto the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::protocol::{ClientMessage, ServerMessage, SessionId};
use crate::registry::{RegistryError, SessionRegistry};

/// Why the socket loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    /// The client closed or the socket failed
    Client,
    /// The registry dropped the session (eviction or shutdown)
    Registry,
}

pub(crate) struct Connection {
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
}

impl Connection {
    pub(crate) fn new(socket: WebSocket, registry: Arc<SessionRegistry>) -> Self {
        Self { socket, registry }
    }

    pub(crate) async fn run(self) {
        let Connection { socket, registry } = self;

        let (id, mut outbound) = match registry.connect().await {
            Ok(admitted) => admitted,
            Err(e) => {
                tracing::debug!(error = %e, "Refusing WebSocket session");
                return;
            }
        };
        let (mut sink, mut stream) = socket.split();

        tracing::debug!(session_id = %id, "WebSocket session open");

        let reason = if send(&mut sink, &ServerMessage::welcome(id.clone())).await {
            loop {
                tokio::select! {
                    inbound = stream.next() => match inbound {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = dispatch(&registry, &id, text.as_str()).await {
                                if !send(&mut sink, &reply).await {
                                    break CloseReason::Client;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break CloseReason::Client,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(session_id = %id, error = %e, "WebSocket read failed");
                            break CloseReason::Client;
                        }
                    },
                    queued = outbound.recv() => match queued {
                        Some(message) => {
                            if !send(&mut sink, &message).await {
                                break CloseReason::Client;
                            }
                        }
                        None => break CloseReason::Registry,
                    },
                }
            }
        } else {
            CloseReason::Client
        };

        if reason == CloseReason::Registry {
            let _ = sink.send(Message::Close(None)).await;
        }
        registry.disconnect(&id).await;

        tracing::debug!(session_id = %id, reason = ?reason, "WebSocket session closed");
    }
}

/// Route one inbound text frame
///
/// Returns a reply to write straight back to the socket, used for frames the
/// registry never sees.
async fn dispatch(registry: &SessionRegistry, id: &SessionId, text: &str) -> Option<ServerMessage> {
    let message = match ClientMessage::decode(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(session_id = %id, error = %e, "Malformed frame");
            return Some(ServerMessage::error(format!("malformed message: {e}")));
        }
    };

    let result = match message {
        ClientMessage::RegisterRole(request) => {
            registry.register_role(id, &request.role).await.map(drop)
        }
        ClientMessage::Signal(payload) => registry.relay_signal(id, payload).await.map(drop),
        ClientMessage::Telemetry(sample) => registry.relay_telemetry(id, sample).await.map(drop),
    };

    match result {
        Ok(()) => None,
        Err(RegistryError::InvalidTelemetry(e)) => {
            Some(ServerMessage::error(format!("invalid telemetry: {e}")))
        }
        // Everything else is logged by the registry, which also queues any
        // error notice the client should see
        Err(_) => None,
    }
}

async fn send<S>(sink: &mut S, message: &ServerMessage) -> bool
where
    S: futures_util::Sink<Message> + Unpin,
{
    let text = match message.encode() {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode server message");
            return true;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}
