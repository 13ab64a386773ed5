//! Session registry implementation
//!
//! The central registry that tracks every connected session, holds the
//! publisher slot and routes signals and telemetry between the publisher and
//! its subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use super::config::{RegistryConfig, REPLACED_REASON};
use super::error::RegistryError;
use super::session::SessionEntry;
use crate::protocol::{Role, ServerMessage, SessionId, SignalPayload};
use crate::telemetry::TelemetrySample;

/// Log every Nth accepted telemetry sample
const TELEMETRY_LOG_EVERY: u64 = 10;

/// Log a broadcast summary every Nth sample
const TELEMETRY_SUMMARY_EVERY: u64 = 50;

/// Snapshot of registry state
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryStats {
    /// Sessions connected, registered or not
    pub session_count: usize,
    /// Registered subscribers
    pub subscriber_count: usize,
    /// Whether the publisher slot is occupied
    pub publisher_connected: bool,
    /// Telemetry samples accepted since start
    pub telemetry_count: u64,
    /// Cached sample, if any
    pub last_sample: Option<TelemetrySample>,
}

/// Shared state guarded by the registry lock
struct RegistryState {
    sessions: HashMap<SessionId, SessionEntry>,
    publisher: Option<SessionId>,
    subscribers: HashSet<SessionId>,
    last_sample: Option<TelemetrySample>,
    telemetry_count: u64,
    accepting: bool,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            publisher: None,
            subscribers: HashSet::new(),
            last_sample: None,
            telemetry_count: 0,
            accepting: true,
        }
    }

    fn is_publisher(&self, id: &SessionId) -> bool {
        self.publisher.as_ref() == Some(id)
    }

    fn send_to(&self, id: &SessionId, message: ServerMessage) -> bool {
        match self.sessions.get(id) {
            Some(entry) => entry.send(message),
            None => false,
        }
    }

    /// Send to every subscriber, returning how many accepted the message
    fn broadcast_to_subscribers(&self, message: &ServerMessage) -> usize {
        self.subscribers
            .iter()
            .filter(|id| self.send_to(id, message.clone()))
            .count()
    }

    fn set_role(&mut self, id: &SessionId, role: Option<Role>) {
        if let Some(entry) = self.sessions.get_mut(id) {
            entry.role = role;
        }
    }

    /// Empty the publisher slot and tell subscribers
    fn vacate_publisher(&mut self) {
        if let Some(id) = self.publisher.take() {
            self.set_role(&id, None);
            self.broadcast_to_subscribers(&ServerMessage::publisher_status(false));
        }
    }
}

/// Central registry for all connected sessions
///
/// Thread-safe via `RwLock`. Relays only read the routing tables; everything
/// that changes membership or the telemetry cache takes the write lock.
pub struct SessionRegistry {
    state: RwLock<RegistryState>,

    /// Configuration
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a new session registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new session registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Admit a new session with no role
    ///
    /// Returns the session id and the receiving end of its outbound queue.
    pub async fn connect(
        &self,
    ) -> Result<(SessionId, mpsc::Receiver<ServerMessage>), RegistryError> {
        let mut state = self.state.write().await;
        if !state.accepting {
            return Err(RegistryError::ShuttingDown);
        }

        let id = SessionId::generate();
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        state
            .sessions
            .insert(id.clone(), SessionEntry::new(id.clone(), tx));

        tracing::debug!(
            session_id = %id,
            sessions = state.sessions.len(),
            "Session connected"
        );

        Ok((id, rx))
    }

    /// Register a session under the requested role
    ///
    /// A new publisher evicts the current one, which receives a
    /// force-disconnect notice first. Unknown roles are answered with an
    /// error notice and change nothing.
    pub async fn register_role(&self, id: &SessionId, role: &str) -> Result<Role, RegistryError> {
        let mut state = self.state.write().await;

        if !state.sessions.contains_key(id) {
            return Err(RegistryError::SessionNotFound(id.clone()));
        }

        let role = match role.parse::<Role>() {
            Ok(role) => role,
            Err(_) => {
                tracing::warn!(session_id = %id, role = role, "Unknown role requested");
                state.send_to(id, ServerMessage::error(format!("Unknown role: {}", role)));
                return Err(RegistryError::UnknownRole(role.to_owned()));
            }
        };

        match role {
            Role::Publisher => {
                if state.is_publisher(id) {
                    tracing::debug!(session_id = %id, "Publisher re-registered");
                    state.broadcast_to_subscribers(&ServerMessage::publisher_status(true));
                    return Ok(role);
                }

                state.subscribers.remove(id);

                if let Some(previous) = state.publisher.take() {
                    // Dropping the entry closes its queue once the notice drains
                    if let Some(entry) = state.sessions.remove(&previous) {
                        entry.send(ServerMessage::force_disconnect(REPLACED_REASON));
                    }
                    tracing::info!(
                        session_id = %id,
                        previous = %previous,
                        "Evicted previous publisher"
                    );
                }

                state.publisher = Some(id.clone());
                state.set_role(id, Some(Role::Publisher));

                let notified =
                    state.broadcast_to_subscribers(&ServerMessage::publisher_status(true));

                tracing::info!(
                    session_id = %id,
                    subscribers = notified,
                    "Publisher registered"
                );

                if let Some(sample) = state.last_sample {
                    tracing::debug!(session_id = %id, "Sending cached telemetry to new publisher");
                    state.send_to(id, ServerMessage::Telemetry(sample));
                }
            }
            Role::Subscriber => {
                if state.is_publisher(id) {
                    tracing::info!(session_id = %id, "Publisher re-registering as subscriber");
                    state.vacate_publisher();
                }

                state.subscribers.insert(id.clone());
                state.set_role(id, Some(Role::Subscriber));

                let connected = state.publisher.is_some();
                state.send_to(id, ServerMessage::publisher_status(connected));

                tracing::info!(
                    session_id = %id,
                    subscribers = state.subscribers.len(),
                    publisher_connected = connected,
                    "Subscriber registered"
                );

                if let Some(sample) = state.last_sample {
                    tracing::debug!(session_id = %id, "Sending cached telemetry to new subscriber");
                    state.send_to(id, ServerMessage::Telemetry(sample));
                }
            }
        }

        Ok(role)
    }

    /// Relay a signal between the publisher and subscribers
    ///
    /// Publisher signals fan out to every subscriber; subscriber signals go
    /// to the publisher. The payload is stamped with the sender's id.
    /// Returns the number of sessions the signal was queued for.
    pub async fn relay_signal(
        &self,
        id: &SessionId,
        payload: SignalPayload,
    ) -> Result<usize, RegistryError> {
        let state = self.state.read().await;
        let stamped = ServerMessage::Signal(payload.with_sender(id));

        if state.is_publisher(id) {
            let delivered = state.broadcast_to_subscribers(&stamped);
            if delivered == 0 {
                tracing::debug!(session_id = %id, "Publisher signaled with no subscribers");
            } else {
                tracing::debug!(session_id = %id, subscribers = delivered, "Relayed publisher signal");
            }
            return Ok(delivered);
        }

        if state.subscribers.contains(id) {
            return match state.publisher.as_ref() {
                Some(publisher) => {
                    let delivered = state.send_to(publisher, stamped);
                    tracing::debug!(
                        session_id = %id,
                        publisher = %publisher,
                        "Relayed subscriber signal"
                    );
                    Ok(usize::from(delivered))
                }
                None => {
                    tracing::debug!(session_id = %id, "Subscriber signaled without a publisher");
                    state.send_to(id, ServerMessage::error("publisher not connected"));
                    Err(RegistryError::PublisherNotConnected)
                }
            };
        }

        if !state.sessions.contains_key(id) {
            return Err(RegistryError::SessionNotFound(id.clone()));
        }

        tracing::warn!(session_id = %id, "Dropping signal from unregistered session");
        state.send_to(id, ServerMessage::error("session not registered"));
        Err(RegistryError::NotRegistered(id.clone()))
    }

    /// Cache and broadcast a telemetry sample from the publisher
    ///
    /// Samples from any other session, or failing validation, are rejected
    /// without touching the cache. Returns the number of subscribers reached.
    pub async fn relay_telemetry(
        &self,
        id: &SessionId,
        sample: TelemetrySample,
    ) -> Result<usize, RegistryError> {
        let mut state = self.state.write().await;

        if !state.is_publisher(id) {
            tracing::warn!(session_id = %id, "Rejected telemetry from non-publisher");
            return Err(RegistryError::NotPublisher(id.clone()));
        }

        if let Err(e) = sample.validate() {
            tracing::warn!(session_id = %id, error = %e, "Rejected invalid telemetry");
            return Err(e.into());
        }

        state.last_sample = Some(sample);
        state.telemetry_count += 1;
        let count = state.telemetry_count;

        if count % TELEMETRY_LOG_EVERY == 0 {
            tracing::debug!(
                count = count,
                latitude = sample.latitude,
                longitude = sample.longitude,
                heading = sample.heading,
                source = ?sample.source,
                "Telemetry received"
            );
        }

        let delivered = state.broadcast_to_subscribers(&ServerMessage::Telemetry(sample));

        if count % TELEMETRY_SUMMARY_EVERY == 0 {
            tracing::info!(count = count, subscribers = delivered, "Telemetry broadcast");
        }

        Ok(delivered)
    }

    /// Remove a session
    ///
    /// If it held the publisher slot, every subscriber is told the publisher
    /// is gone after the slot is cleared. Unknown ids are ignored, which
    /// makes this safe to call for an already-evicted publisher.
    pub async fn disconnect(&self, id: &SessionId) {
        let mut state = self.state.write().await;

        let Some(entry) = state.sessions.remove(id) else {
            tracing::debug!(session_id = %id, "Disconnect for unknown session");
            return;
        };
        let connected_secs = entry.connected_at.elapsed().as_secs();

        if state.is_publisher(id) {
            state.publisher = None;
            let notified = state.broadcast_to_subscribers(&ServerMessage::publisher_status(false));
            tracing::info!(
                session_id = %id,
                subscribers = notified,
                connected_secs,
                "Publisher disconnected"
            );
        } else if state.subscribers.remove(id) {
            tracing::info!(
                session_id = %id,
                subscribers = state.subscribers.len(),
                connected_secs,
                "Subscriber disconnected"
            );
        } else {
            tracing::debug!(session_id = %id, "Unregistered session disconnected");
        }
    }

    /// Role currently held by a session
    pub async fn role_of(&self, id: &SessionId) -> Option<Role> {
        let state = self.state.read().await;
        state.sessions.get(id).and_then(|entry| entry.role)
    }

    /// Current publisher, if any
    pub async fn publisher(&self) -> Option<SessionId> {
        self.state.read().await.publisher.clone()
    }

    /// Cached telemetry sample
    pub async fn last_sample(&self) -> Option<TelemetrySample> {
        self.state.read().await.last_sample
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        RegistryStats {
            session_count: state.sessions.len(),
            subscriber_count: state.subscribers.len(),
            publisher_connected: state.publisher.is_some(),
            telemetry_count: state.telemetry_count,
            last_sample: state.last_sample,
        }
    }

    /// Start background work for this registry
    ///
    /// Spawns the periodic stats logger. Abort the returned handle to stop
    /// it; [`shutdown`](Self::shutdown) tears down the sessions.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.stats_interval;

        tokio::spawn(async move {
            if interval.is_zero() {
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = registry.stats().await;
                tracing::info!(
                    sessions = stats.session_count,
                    subscribers = stats.subscriber_count,
                    publisher_connected = stats.publisher_connected,
                    telemetry_count = stats.telemetry_count,
                    last_latitude = ?stats.last_sample.map(|s| s.latitude),
                    last_longitude = ?stats.last_sample.map(|s| s.longitude),
                    "Registry stats"
                );
            }
        })
    }

    /// Stop admitting sessions and drop every existing one
    ///
    /// Dropping the entries closes their outbound queues, which ends each
    /// connection after it drains.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let dropped = state.sessions.len();

        state.accepting = false;
        state.sessions.clear();
        state.subscribers.clear();
        state.publisher = None;
        state.last_sample = None;

        tracing::info!(sessions = dropped, "Registry shut down");
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
