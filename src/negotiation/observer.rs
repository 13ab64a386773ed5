//! Callbacks out of a peer link

use super::engine::TrackInfo;
use super::error::NegotiationError;
use super::signal::SignalMessage;
use crate::telemetry::TelemetrySample;

/// Receives everything a [`PeerLink`](super::PeerLink) produces
///
/// Callbacks are invoked outside the link's lock and must not block.
pub trait NegotiationObserver: Send + Sync {
    /// An outgoing signal (offer, answer, candidate or end-of-candidates)
    /// is ready to be relayed
    fn on_local_description_ready(&self, signal: SignalMessage);

    fn on_remote_track(&self, _track: TrackInfo) {}

    fn on_channel_open(&self, _label: &str) {}

    /// A telemetry sample arrived over the direct channel
    fn on_channel_message(&self, _sample: TelemetrySample) {}

    fn on_error(&self, _error: NegotiationError) {}
}
