//! WebSocket signaling client

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use crate::protocol::{
    ClientMessage, ProtocolError, Role, RoleRequest, ServerMessage, SessionId, SignalPayload,
};
use crate::telemetry::TelemetrySample;

/// Errors raised by [`SignalingClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection closed")]
    Closed,
}

/// Events from the signaling server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Server assigned our session id
    Welcome(SessionId),

    /// Whether a publisher is connected
    PublisherStatus(bool),

    /// Signal relayed from the other side
    Signal(SignalPayload),

    /// Telemetry broadcast by the registry
    Telemetry(TelemetrySample),

    /// We were evicted
    ForceDisconnect(String),

    /// Error notice from the server
    Error(String),

    /// Connection closed
    Disconnected,
}

impl From<ServerMessage> for ClientEvent {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Welcome(welcome) => ClientEvent::Welcome(welcome.session_id),
            ServerMessage::PublisherStatus(status) => ClientEvent::PublisherStatus(status.connected),
            ServerMessage::Signal(payload) => ClientEvent::Signal(payload),
            ServerMessage::Telemetry(sample) => ClientEvent::Telemetry(sample),
            ServerMessage::ForceDisconnect(notice) => ClientEvent::ForceDisconnect(notice.reason),
            ServerMessage::Error(notice) => ClientEvent::Error(notice.message),
        }
    }
}

/// Handle for sending to the signaling server
///
/// Cheap to clone; every clone feeds the same connection. Sends never block.
///
/// # Example
/// ```no_run
/// use perch::client::{ClientConfig, ClientEvent, SignalingClient};
/// use perch::Role;
///
/// # async fn example() -> Result<(), perch::client::ClientError> {
/// let config = ClientConfig::new("ws://localhost:3000/ws").role(Role::Subscriber);
/// let (_client, mut events) = SignalingClient::connect(config).await?;
///
/// while let Some(event) = events.recv().await {
///     if event == ClientEvent::Disconnected {
///         break;
///     }
///     println!("Event: {:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SignalingClient {
    tx: mpsc::UnboundedSender<Message>,
}

impl SignalingClient {
    /// Connect to the server
    ///
    /// Returns the client and a receiver for server events. The receiver
    /// yields [`ClientEvent::Disconnected`] once and then ends.
    pub async fn connect(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), ClientError> {
        let (ws, _) = connect_async(config.url.as_str()).await?;
        info!(url = %config.url, "Connected to signaling server");

        let (mut write, mut read) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    debug!(error = %e, "Signaling write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerMessage::decode(&text) {
                        Ok(message) => {
                            if event_tx.send(message.into()).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Ignoring malformed server frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Signaling read failed");
                        break;
                    }
                }
            }
            let _ = event_tx.send(ClientEvent::Disconnected).await;
        });

        let client = Self { tx };
        if let Some(role) = config.role {
            client.register(role)?;
        }
        Ok((client, event_rx))
    }

    pub fn send(&self, message: &ClientMessage) -> Result<(), ClientError> {
        let text = message.encode()?;
        self.tx
            .send(Message::Text(text))
            .map_err(|_| ClientError::Closed)
    }

    pub fn register(&self, role: Role) -> Result<(), ClientError> {
        self.send(&ClientMessage::RegisterRole(RoleRequest::new(role)))
    }

    /// Request an arbitrary role string; the server answers unknown ones
    /// with an error notice
    pub fn register_raw(&self, role: impl Into<String>) -> Result<(), ClientError> {
        self.send(&ClientMessage::RegisterRole(RoleRequest { role: role.into() }))
    }

    pub fn send_signal(&self, payload: SignalPayload) -> Result<(), ClientError> {
        self.send(&ClientMessage::Signal(payload))
    }

    pub fn send_telemetry(&self, sample: TelemetrySample) -> Result<(), ClientError> {
        self.send(&ClientMessage::Telemetry(sample))
    }

    /// Send a raw text frame, bypassing the envelope encoder
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.tx
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::Closed)
    }

    /// Close the connection
    pub fn close(&self) {
        let _ = self.tx.send(Message::Close(None));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SessionDescription;

    #[test]
    fn test_event_from_server_message() {
        assert_eq!(
            ClientEvent::from(ServerMessage::publisher_status(true)),
            ClientEvent::PublisherStatus(true)
        );
        assert_eq!(
            ClientEvent::from(ServerMessage::force_disconnect("replaced")),
            ClientEvent::ForceDisconnect("replaced".into())
        );
        assert_eq!(
            ClientEvent::from(ServerMessage::welcome(SessionId::from("abc"))),
            ClientEvent::Welcome(SessionId::from("abc"))
        );

        let payload = SignalPayload::description(SessionDescription::offer("o"));
        assert_eq!(
            ClientEvent::from(ServerMessage::Signal(payload.clone())),
            ClientEvent::Signal(payload)
        );
    }
}
