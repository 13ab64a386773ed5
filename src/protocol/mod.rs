//! Wire protocol
//!
//! Every WebSocket text frame carries one JSON envelope of the form
//! `{"type": <event>, "data": <payload>}`. Clients send [`ClientMessage`]s,
//! the server answers with [`ServerMessage`]s.

pub mod message;
pub mod signal;

pub use message::{
    ClientMessage, ErrorNotice, ForceDisconnect, PublisherStatus, Role, RoleRequest,
    ServerMessage, SessionId, Welcome,
};
pub use signal::{CandidatePayload, DescriptionKind, SessionDescription, SignalPayload};

/// Errors raised while encoding or decoding wire messages
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown role: {0}")]
    UnknownRole(String),
}
