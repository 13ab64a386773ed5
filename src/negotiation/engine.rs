//! Media engine capability
//!
//! The engine owns the actual transport: description generation, candidate
//! gathering, media tracks and the direct message channel. The negotiation
//! layer only drives it through [`MediaEngine`] and hears back from it
//! through [`EngineEvent`]s.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::EngineError;
use super::signal::IceCandidate;
use crate::protocol::{DescriptionKind, SessionDescription};

/// Primitives the negotiation layer needs from a transport engine
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Generate a local offer or answer
    async fn create_description(
        &self,
        kind: DescriptionKind,
    ) -> Result<SessionDescription, EngineError>;

    /// Install a description we generated
    async fn apply_local_description(
        &self,
        description: &SessionDescription,
    ) -> Result<(), EngineError>;

    /// Install a description received from the remote peer
    ///
    /// Applying a remote offer while a local offer is outstanding rolls the
    /// local offer back.
    async fn apply_remote_description(
        &self,
        description: &SessionDescription,
    ) -> Result<(), EngineError>;

    /// Add a remote connectivity candidate; `None` marks end of candidates
    async fn add_candidate(&self, candidate: Option<&IceCandidate>) -> Result<(), EngineError>;

    /// Create the direct message channel
    async fn open_channel(&self, label: &str) -> Result<(), EngineError>;

    /// Send one frame on the direct message channel
    async fn send_channel_message(&self, data: Bytes) -> Result<(), EngineError>;

    /// Close the channel and transport and stop local media
    async fn close(&self);
}

/// Kind of a remote media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A media track announced by the remote peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
}

/// Transport connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Asynchronous notifications from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Local tracks or channels changed; a new offer is needed
    NegotiationNeeded,
    /// A local candidate was gathered
    LocalCandidate(IceCandidate),
    /// Candidate gathering finished
    EndOfLocalCandidates,
    /// The remote peer added a track
    RemoteTrack(TrackInfo),
    /// The direct channel is open
    ChannelOpen { label: String },
    /// A frame arrived on the direct channel
    ChannelMessage(Bytes),
    /// The direct channel closed
    ChannelClosed,
    /// Transport connection state changed
    ConnectionState(ConnectionState),
}
