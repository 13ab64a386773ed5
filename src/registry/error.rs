//! Registry error types

use crate::protocol::SessionId;
use crate::telemetry::TelemetryError;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// Session id is not (or no longer) known
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Registration with a role other than publisher/subscriber
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// A subscriber signaled while no publisher is connected
    #[error("publisher not connected")]
    PublisherNotConnected,

    /// The session has not registered a role yet
    #[error("session not registered: {0}")]
    NotRegistered(SessionId),

    /// Telemetry from a session that does not hold the publisher slot
    #[error("session is not the publisher: {0}")]
    NotPublisher(SessionId),

    /// Telemetry sample failed validation
    #[error("invalid telemetry: {0}")]
    InvalidTelemetry(#[from] TelemetryError),

    /// The registry has been shut down
    #[error("registry is shutting down")]
    ShuttingDown,
}
