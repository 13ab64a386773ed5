//! Crate-level error type

use crate::client::ClientError;
use crate::negotiation::NegotiationError;
use crate::protocol::ProtocolError;
use crate::registry::RegistryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),
}
