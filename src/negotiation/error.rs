//! Negotiation error types

/// Failure reported by the underlying media engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error type for [`PeerLink`](super::PeerLink) operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    /// A description or candidate is missing required fields
    #[error("malformed signal: {0}")]
    MalformedSignal(String),

    /// The engine rejected a description or candidate
    #[error("transport failure: {0}")]
    Transport(#[from] EngineError),

    /// A telemetry sample could not be encoded for the direct channel
    #[error("telemetry encoding failed: {0}")]
    Encode(String),

    /// A local offer is already being created
    #[error("local offer already in flight")]
    OfferInFlight,

    /// The link has been cleaned up
    #[error("peer link closed")]
    Closed,
}
