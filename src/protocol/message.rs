//! Message envelopes exchanged between sessions and the server

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::signal::SignalPayload;
use super::ProtocolError;
use crate::telemetry::TelemetrySample;

/// Opaque identifier of a connected session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Allocate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role a session registers under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single producer of media and telemetry
    Publisher,
    /// A consumer of relayed media and telemetry
    Subscriber,
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publisher" => Ok(Role::Publisher),
            "subscriber" => Ok(Role::Subscriber),
            other => Err(ProtocolError::UnknownRole(other.to_owned())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Publisher => write!(f, "publisher"),
            Role::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// Body of a `register-role` event
///
/// The role stays a plain string on the wire so that an unknown value can be
/// answered with an error notice instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

impl RoleRequest {
    pub fn new(role: Role) -> Self {
        Self {
            role: role.to_string(),
        }
    }

    pub fn parse(&self) -> Result<Role, ProtocolError> {
        self.role.parse()
    }
}

/// Body of a `publisher-status` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherStatus {
    pub connected: bool,
}

/// Body of a `force-disconnect` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceDisconnect {
    pub reason: String,
}

/// Body of a `welcome` event, sent once right after connecting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

/// Body of an `error` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

/// Messages a session sends to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    RegisterRole(RoleRequest),
    Signal(SignalPayload),
    Telemetry(TelemetrySample),
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages the server sends to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    Welcome(Welcome),
    PublisherStatus(PublisherStatus),
    Signal(SignalPayload),
    Telemetry(TelemetrySample),
    ForceDisconnect(ForceDisconnect),
    Error(ErrorNotice),
}

impl ServerMessage {
    pub fn welcome(session_id: SessionId) -> Self {
        ServerMessage::Welcome(Welcome { session_id })
    }

    pub fn publisher_status(connected: bool) -> Self {
        ServerMessage::PublisherStatus(PublisherStatus { connected })
    }

    pub fn force_disconnect(reason: impl Into<String>) -> Self {
        ServerMessage::ForceDisconnect(ForceDisconnect {
            reason: reason.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorNotice {
            message: message.into(),
        })
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetrySource;

    #[test]
    fn test_role_parse() {
        assert_eq!("publisher".parse::<Role>().unwrap(), Role::Publisher);
        assert_eq!("subscriber".parse::<Role>().unwrap(), Role::Subscriber);
        assert!(matches!(
            "drone".parse::<Role>(),
            Err(ProtocolError::UnknownRole(r)) if r == "drone"
        ));
    }

    #[test]
    fn test_register_role_envelope() {
        let msg = ClientMessage::decode(r#"{"type":"register-role","data":{"role":"subscriber"}}"#)
            .unwrap();

        match msg {
            ClientMessage::RegisterRole(req) => assert_eq!(req.parse().unwrap(), Role::Subscriber),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_role_still_decodes() {
        let msg = ClientMessage::decode(r#"{"type":"register-role","data":{"role":"admin"}}"#)
            .unwrap();
        let ClientMessage::RegisterRole(req) = msg else {
            panic!("expected register-role");
        };
        assert!(req.parse().is_err());
    }

    #[test]
    fn test_telemetry_envelope() {
        let text = r#"{"type":"telemetry","data":{"latitude":37.7749,"longitude":-122.4194,"altitude":100,"heading":0,"speed":0,"timestamp":1700000000000,"source":"live"}}"#;
        let ClientMessage::Telemetry(sample) = ClientMessage::decode(text).unwrap() else {
            panic!("expected telemetry");
        };

        assert_eq!(sample.latitude, 37.7749);
        assert_eq!(sample.timestamp, 1_700_000_000_000);
        assert_eq!(sample.source, TelemetrySource::Live);
    }

    #[test]
    fn test_server_message_shapes() {
        let status = ServerMessage::publisher_status(false).encode().unwrap();
        assert_eq!(status, r#"{"type":"publisher-status","data":{"connected":false}}"#);

        let kicked = ServerMessage::force_disconnect("replaced").encode().unwrap();
        assert_eq!(kicked, r#"{"type":"force-disconnect","data":{"reason":"replaced"}}"#);

        let welcome = ServerMessage::welcome(SessionId::from("s1")).encode().unwrap();
        assert_eq!(welcome, r#"{"type":"welcome","data":{"sessionId":"s1"}}"#);

        let error = ServerMessage::error("publisher not connected").encode().unwrap();
        assert_eq!(error, r#"{"type":"error","data":{"message":"publisher not connected"}}"#);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"dance","data":{}}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
