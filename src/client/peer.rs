//! Peer session: a negotiation link driven by a signaling client
//!
//! Wires a [`PeerLink`] to a [`SignalingClient`]. Outgoing signals from the
//! link are sent through the client; relayed signals from the server are fed
//! back into the link. Telemetry from both the registry broadcast and the
//! direct channel lands in one [`TelemetryView`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connector::{ClientError, ClientEvent, SignalingClient};
use crate::negotiation::{
    EngineEvent, MediaEngine, NegotiationError, NegotiationObserver, PeerLink, PeerLinkConfig,
    SignalMessage, TrackInfo,
};
use crate::protocol::Role;
use crate::telemetry::{TelemetryOrigin, TelemetrySample, TelemetryView};

/// Forwards link output to the server and channel telemetry to the view
struct SessionObserver {
    client: SignalingClient,
    view: Arc<Mutex<TelemetryView>>,
}

impl NegotiationObserver for SessionObserver {
    fn on_local_description_ready(&self, signal: SignalMessage) {
        if let Err(e) = self.client.send_signal(signal.to_payload()) {
            warn!(error = %e, "Failed to send signal");
        }
    }

    fn on_remote_track(&self, track: TrackInfo) {
        info!(track_id = %track.id, kind = ?track.kind, "Receiving remote media");
    }

    fn on_channel_open(&self, label: &str) {
        info!(label = %label, "Direct telemetry channel open");
    }

    fn on_channel_message(&self, sample: TelemetrySample) {
        self.view.lock().observe(sample, TelemetryOrigin::DirectChannel);
    }

    fn on_error(&self, error: NegotiationError) {
        warn!(error = %error, "Negotiation error");
    }
}

/// One end of the publisher/subscriber relationship
pub struct PeerSession<E: MediaEngine> {
    role: Role,
    client: SignalingClient,
    link: PeerLink<E>,
    view: Arc<Mutex<TelemetryView>>,
    publisher_connected: AtomicBool,
}

impl<E: MediaEngine> PeerSession<E> {
    /// Build a session; politeness follows from `role`
    pub fn new(role: Role, client: SignalingClient, engine: E) -> Self {
        let view = Arc::new(Mutex::new(TelemetryView::new()));
        let observer = Arc::new(SessionObserver {
            client: client.clone(),
            view: Arc::clone(&view),
        });

        Self {
            role,
            client,
            link: PeerLink::new(engine, PeerLinkConfig::for_role(role), observer),
            view,
            publisher_connected: AtomicBool::new(false),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn link(&self) -> &PeerLink<E> {
        &self.link
    }

    pub fn client(&self) -> &SignalingClient {
        &self.client
    }

    /// Copy of the telemetry view
    pub fn view(&self) -> TelemetryView {
        self.view.lock().clone()
    }

    pub fn latest_sample(&self) -> Option<TelemetrySample> {
        self.view.lock().latest().map(|observed| observed.sample)
    }

    pub fn publisher_connected(&self) -> bool {
        self.publisher_connected.load(Ordering::Acquire)
    }

    /// Register with the server; a publisher also opens the direct channel
    /// and sends the first offer
    pub async fn start(&self) -> Result<(), crate::Error> {
        self.client.register(self.role)?;

        if self.role == Role::Publisher {
            self.link.open_channel().await?;
            self.link.negotiation_needed().await?;
        }
        Ok(())
    }

    /// Apply one server event
    ///
    /// Returns `false` once the session is over (disconnected or evicted).
    pub async fn handle_event(&self, event: ClientEvent) -> bool {
        match event {
            ClientEvent::Welcome(id) => {
                debug!(session_id = %id, "Session id assigned");
                self.link.set_local_id(id);
            }
            ClientEvent::PublisherStatus(connected) => {
                self.publisher_connected.store(connected, Ordering::Release);
                info!(connected = connected, "Publisher status");
            }
            ClientEvent::Signal(payload) => {
                if let Err(e) = self.link.handle_signal(payload).await {
                    debug!(error = %e, "Signal not applied");
                }
            }
            ClientEvent::Telemetry(sample) => {
                self.view.lock().observe(sample, TelemetryOrigin::Relay);
            }
            ClientEvent::Error(message) => {
                warn!(message = %message, "Server error notice");
            }
            ClientEvent::ForceDisconnect(reason) => {
                warn!(reason = %reason, "Disconnected by server");
                return false;
            }
            ClientEvent::Disconnected => {
                info!("Signaling connection closed");
                return false;
            }
        }
        true
    }

    /// Forward an engine notification to the link
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        if let Err(e) = self.link.handle_engine_event(event).await {
            debug!(error = %e, "Engine event not handled");
        }
    }

    /// Send a sample through the registry and, when open, the direct channel
    ///
    /// Returns whether the direct channel carried it too.
    pub async fn publish_telemetry(&self, sample: TelemetrySample) -> Result<bool, ClientError> {
        self.client.send_telemetry(sample)?;
        match self.link.send_telemetry(&sample).await {
            Ok(sent) => Ok(sent),
            Err(e) => {
                debug!(error = %e, "Direct channel send skipped");
                Ok(false)
            }
        }
    }

    /// Publish every sample from `samples` until the feed ends or the
    /// connection closes
    ///
    /// Pair with [`FlightSimulator::spawn`](crate::telemetry::FlightSimulator::spawn)
    /// when there is no live position source. Returns the number of samples
    /// published.
    pub async fn publish_from(&self, mut samples: mpsc::Receiver<TelemetrySample>) -> u64 {
        let mut published = 0;
        while let Some(sample) = samples.recv().await {
            if let Err(e) = self.publish_telemetry(sample).await {
                debug!(error = %e, "Telemetry feed stopped");
                break;
            }
            published += 1;
        }
        published
    }

    /// Pump server and engine events until the session ends, then clean up
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<ClientEvent>,
        mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let event = event.unwrap_or(ClientEvent::Disconnected);
                    if !self.handle_event(event).await {
                        break;
                    }
                }
                Some(event) = engine_events.recv() => self.handle_engine_event(event).await,
            }
        }
        self.close().await;
    }

    /// Tear down the link and close the connection
    pub async fn close(&self) {
        self.link.cleanup().await;
        self.client.close();
    }
}
