//! One end of a perfect-negotiation exchange

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::engine::{ConnectionState, EngineEvent, MediaEngine};
use super::error::NegotiationError;
use super::observer::NegotiationObserver;
use super::signal::{IceCandidate, SignalMessage};
use super::state::{PeerLinkState, Politeness, SignalingPhase};
use crate::protocol::{DescriptionKind, Role, SessionDescription, SessionId, SignalPayload};
use crate::telemetry::TelemetrySample;

/// Default label of the direct telemetry channel
pub const TELEMETRY_CHANNEL: &str = "telemetry";

/// Construction parameters for a [`PeerLink`]
#[derive(Debug, Clone)]
pub struct PeerLinkConfig {
    pub politeness: Politeness,

    /// Our own session id, used to drop echoed signals
    pub local_id: Option<SessionId>,

    pub channel_label: String,
}

impl PeerLinkConfig {
    pub fn new(politeness: Politeness) -> Self {
        Self {
            politeness,
            local_id: None,
            channel_label: TELEMETRY_CHANNEL.to_string(),
        }
    }

    pub fn for_role(role: Role) -> Self {
        Self::new(Politeness::for_role(role))
    }

    pub fn local_id(mut self, id: SessionId) -> Self {
        self.local_id = Some(id);
        self
    }

    pub fn channel_label(mut self, label: impl Into<String>) -> Self {
        self.channel_label = label.into();
        self
    }
}

/// Negotiation driver for one connection
///
/// All handlers take `&self`. State lives behind a mutex that is released
/// before every engine call, so signals arriving while an engine operation is
/// suspended are judged against the current flags.
pub struct PeerLink<E: MediaEngine> {
    engine: E,
    politeness: Politeness,
    channel_label: String,
    state: Mutex<PeerLinkState>,
    observer: Mutex<Option<Arc<dyn NegotiationObserver>>>,
}

impl<E: MediaEngine> PeerLink<E> {
    pub fn new(engine: E, config: PeerLinkConfig, observer: Arc<dyn NegotiationObserver>) -> Self {
        Self {
            engine,
            politeness: config.politeness,
            channel_label: config.channel_label,
            state: Mutex::new(PeerLinkState::new(config.local_id)),
            observer: Mutex::new(Some(observer)),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn politeness(&self) -> Politeness {
        self.politeness
    }

    pub fn phase(&self) -> SignalingPhase {
        self.state.lock().phase
    }

    pub fn is_making_offer(&self) -> bool {
        self.state.lock().making_offer
    }

    pub fn is_ignoring_offer(&self) -> bool {
        self.state.lock().ignore_offer
    }

    pub fn is_channel_open(&self) -> bool {
        self.state.lock().channel_open
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn pending_candidates(&self) -> usize {
        self.state.lock().pending_candidates.len()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.state.lock().local_description.clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.state.lock().remote_description.clone()
    }

    /// Set our session id once the server has assigned it
    pub fn set_local_id(&self, id: SessionId) {
        self.state.lock().local_id = Some(id);
    }

    fn observer(&self) -> Option<Arc<dyn NegotiationObserver>> {
        self.observer.lock().clone()
    }

    fn emit(&self, signal: SignalMessage) {
        if let Some(observer) = self.observer() {
            observer.on_local_description_ready(signal);
        }
    }

    fn fail(&self, error: NegotiationError) -> NegotiationError {
        warn!(politeness = ?self.politeness, error = %error, "Negotiation step failed");
        if let Some(observer) = self.observer() {
            observer.on_error(error.clone());
        }
        error
    }

    /// React to a local change by offering a new description
    ///
    /// Returns `Ok(false)` when no offer was sent: either an exchange is in
    /// progress (the offer is deferred until it settles) or a remote offer
    /// superseded ours while it was being created.
    pub async fn negotiation_needed(&self) -> Result<bool, NegotiationError> {
        let begun = self.state.lock().begin_offer();
        let Some(epoch) = begun? else {
            debug!(politeness = ?self.politeness, "Exchange in progress, deferring offer");
            return Ok(false);
        };

        let offer = match self.engine.create_description(DescriptionKind::Offer).await {
            Ok(offer) => offer,
            Err(e) => {
                self.state.lock().offer_failed(epoch);
                return Err(self.fail(e.into()));
            }
        };

        let current = self.state.lock().offer_current(epoch);
        if !current {
            debug!(politeness = ?self.politeness, "Local offer superseded before apply");
            return Ok(false);
        }

        if let Err(e) = self.engine.apply_local_description(&offer).await {
            self.state.lock().offer_failed(epoch);
            return Err(self.fail(e.into()));
        }

        let applied = self.state.lock().offer_applied(epoch, offer.clone());
        if !applied {
            debug!(politeness = ?self.politeness, "Local offer superseded after apply");
            return Ok(false);
        }

        debug!(politeness = ?self.politeness, "Sending offer");
        self.emit(SignalMessage::Description(offer));
        Ok(true)
    }

    /// Handle a signal relayed from the remote peer
    pub async fn handle_signal(&self, payload: SignalPayload) -> Result<(), NegotiationError> {
        let echo = {
            let state = self.state.lock();
            state.ensure_open()?;
            state.is_echo(payload.sender_id.as_ref())
        };
        if echo {
            trace!("Dropping own signal");
            return Ok(());
        }

        let message = SignalMessage::from_payload(&payload).inspect_err(|e| {
            warn!(error = %e, "Dropping malformed signal");
        })?;

        match message {
            SignalMessage::Description(description) => match description.kind {
                DescriptionKind::Offer => self.handle_offer(description).await,
                DescriptionKind::Answer => self.handle_answer(description).await,
            },
            SignalMessage::Candidate(candidate) => self.handle_candidate(Some(candidate)).await,
            SignalMessage::EndOfCandidates => self.handle_candidate(None).await,
        }
    }

    async fn handle_offer(&self, offer: SessionDescription) -> Result<(), NegotiationError> {
        {
            let mut state = self.state.lock();
            if state.should_ignore_offer(self.politeness) {
                debug!(politeness = ?self.politeness, phase = ?state.phase, "Ignoring colliding offer");
                return Ok(());
            }
            state.accept_remote_offer();
        }

        if let Err(e) = self.engine.apply_remote_description(&offer).await {
            self.state.lock().offer_rejected();
            return Err(self.fail(e.into()));
        }

        let queued = {
            let mut state = self.state.lock();
            state.ensure_open()?;
            state.remote_applied(offer)
        };
        self.flush_candidates(queued).await;

        let answer = match self.engine.create_description(DescriptionKind::Answer).await {
            Ok(answer) => answer,
            Err(e) => {
                self.state.lock().offer_rejected();
                return Err(self.fail(e.into()));
            }
        };
        if let Err(e) = self.engine.apply_local_description(&answer).await {
            self.state.lock().offer_rejected();
            return Err(self.fail(e.into()));
        }

        {
            let mut state = self.state.lock();
            state.ensure_open()?;
            state.local_answer_applied(answer.clone());
        }

        debug!(politeness = ?self.politeness, "Sending answer");
        self.emit(SignalMessage::Description(answer));
        self.run_deferred().await;
        Ok(())
    }

    async fn handle_answer(&self, answer: SessionDescription) -> Result<(), NegotiationError> {
        let begun = self.state.lock().begin_answer();
        let Some(cancelled) = begun else {
            warn!(politeness = ?self.politeness, "Dropping answer with no local offer pending");
            return Ok(());
        };

        tokio::select! {
            biased;
            Ok(()) = cancelled => {
                debug!(politeness = ?self.politeness, "Answer apply superseded by remote offer");
                return Ok(());
            }
            result = self.engine.apply_remote_description(&answer) => {
                if let Err(e) = result {
                    let owned = self.state.lock().answer_failed();
                    if !owned {
                        return Ok(());
                    }
                    return Err(self.fail(e.into()));
                }
            }
        }

        let queued = self.state.lock().answer_applied(answer);
        let Some(queued) = queued else {
            debug!(politeness = ?self.politeness, "Answer apply superseded by remote offer");
            return Ok(());
        };
        self.flush_candidates(queued).await;
        self.run_deferred().await;
        Ok(())
    }

    async fn handle_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), NegotiationError> {
        let admitted = self.state.lock().admit_candidate(candidate);
        match admitted {
            Some(candidate) => self.apply_candidate(candidate.as_ref()).await,
            None => {
                trace!("Queued candidate until remote description is set");
                Ok(())
            }
        }
    }

    async fn apply_candidate(&self, candidate: Option<&IceCandidate>) -> Result<(), NegotiationError> {
        let Err(e) = self.engine.add_candidate(candidate).await else {
            return Ok(());
        };

        let ignoring = self.state.lock().ignore_offer;
        if ignoring {
            debug!(error = %e, "Candidate failed while ignoring offer");
            return Ok(());
        }
        Err(self.fail(e.into()))
    }

    /// Apply queued candidates in arrival order; failures don't stop the flush
    async fn flush_candidates(&self, queued: Vec<Option<IceCandidate>>) {
        if !queued.is_empty() {
            debug!(count = queued.len(), "Flushing queued candidates");
        }
        for candidate in queued {
            let _ = self.apply_candidate(candidate.as_ref()).await;
        }
    }

    async fn run_deferred(&self) {
        let deferred = self.state.lock().take_deferred();
        if deferred {
            if let Err(e) = self.negotiation_needed().await {
                debug!(error = %e, "Deferred offer failed");
            }
        }
    }

    /// Handle an asynchronous notification from the engine
    pub async fn handle_engine_event(&self, event: EngineEvent) -> Result<(), NegotiationError> {
        self.state.lock().ensure_open()?;

        match event {
            EngineEvent::NegotiationNeeded => {
                self.negotiation_needed().await?;
            }
            EngineEvent::LocalCandidate(candidate) => {
                self.emit(SignalMessage::Candidate(candidate));
            }
            EngineEvent::EndOfLocalCandidates => {
                self.emit(SignalMessage::EndOfCandidates);
            }
            EngineEvent::RemoteTrack(track) => {
                debug!(track_id = %track.id, kind = ?track.kind, "Remote track");
                if let Some(observer) = self.observer() {
                    observer.on_remote_track(track);
                }
            }
            EngineEvent::ChannelOpen { label } => {
                self.state.lock().channel_open = true;
                debug!(label = %label, "Direct channel open");
                if let Some(observer) = self.observer() {
                    observer.on_channel_open(&label);
                }
            }
            EngineEvent::ChannelMessage(data) => match TelemetrySample::from_slice(&data) {
                Ok(sample) => {
                    if let Some(observer) = self.observer() {
                        observer.on_channel_message(sample);
                    }
                }
                Err(e) => {
                    warn!(error = %e, len = data.len(), "Dropping malformed channel message");
                }
            },
            EngineEvent::ChannelClosed => {
                self.state.lock().channel_open = false;
                debug!("Direct channel closed");
            }
            EngineEvent::ConnectionState(state) => match state {
                ConnectionState::Failed | ConnectionState::Disconnected => {
                    warn!(state = ?state, "Transport connection degraded");
                }
                _ => debug!(state = ?state, "Transport connection state"),
            },
        }
        Ok(())
    }

    /// Ask the engine to create the direct telemetry channel
    pub async fn open_channel(&self) -> Result<(), NegotiationError> {
        self.state.lock().ensure_open()?;
        self.engine
            .open_channel(&self.channel_label)
            .await
            .map_err(|e| self.fail(e.into()))
    }

    /// Push a sample over the direct channel
    ///
    /// Returns `Ok(false)` without sending while the channel is not open.
    pub async fn send_telemetry(&self, sample: &TelemetrySample) -> Result<bool, NegotiationError> {
        {
            let state = self.state.lock();
            state.ensure_open()?;
            if !state.channel_open {
                return Ok(false);
            }
        }

        let data = sample
            .to_bytes()
            .map_err(|e| NegotiationError::Encode(e.to_string()))?;
        self.engine.send_channel_message(data).await.map_err(|e| {
            warn!(error = %e, "Direct channel send failed");
            NegotiationError::from(e)
        })?;
        Ok(true)
    }

    /// Close the link and release the engine
    ///
    /// Idempotent. Every handler on a closed link returns
    /// [`NegotiationError::Closed`].
    pub async fn cleanup(&self) {
        let first = self.state.lock().reset();
        if !first {
            return;
        }
        self.observer.lock().take();
        self.engine.close().await;
        debug!(politeness = ?self.politeness, "Peer link closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::memory::{EngineCall, MemoryEngine};
    use crate::protocol::CandidatePayload;
    use crate::telemetry::TelemetrySource;
    use bytes::Bytes;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        signals: Mutex<Vec<SignalMessage>>,
        errors: Mutex<Vec<NegotiationError>>,
        samples: Mutex<Vec<TelemetrySample>>,
    }

    impl NegotiationObserver for Recorder {
        fn on_local_description_ready(&self, signal: SignalMessage) {
            self.signals.lock().push(signal);
        }

        fn on_channel_message(&self, sample: TelemetrySample) {
            self.samples.lock().push(sample);
        }

        fn on_error(&self, error: NegotiationError) {
            self.errors.lock().push(error);
        }
    }

    fn link(politeness: Politeness) -> (PeerLink<MemoryEngine>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = PeerLinkConfig::new(politeness).local_id(SessionId::from("self"));
        let link = PeerLink::new(MemoryEngine::new("local"), config, recorder.clone());
        (link, recorder)
    }

    fn candidate(line: &str) -> SignalPayload {
        SignalPayload::candidate(CandidatePayload {
            candidate: Some(line.to_string()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_offer_emitted() {
        let (link, recorder) = link(Politeness::Impolite);

        assert!(link.negotiation_needed().await.unwrap());
        assert_eq!(link.phase(), SignalingPhase::LocalOfferPending);
        assert!(!link.is_making_offer());

        let signals = recorder.signals.lock();
        assert!(matches!(
            &signals[..],
            [SignalMessage::Description(d)] if d.kind == DescriptionKind::Offer
        ));
    }

    #[tokio::test]
    async fn test_offer_then_answer_returns_to_stable() {
        let (link, _) = link(Politeness::Impolite);
        link.negotiation_needed().await.unwrap();

        let answer = SignalPayload::description(SessionDescription::answer("remote-answer"));
        link.handle_signal(answer).await.unwrap();

        assert_eq!(link.phase(), SignalingPhase::Stable);
        assert_eq!(
            link.remote_description().map(|d| d.payload),
            Some("remote-answer".to_string())
        );
    }

    #[tokio::test]
    async fn test_remote_offer_answered() {
        let (link, recorder) = link(Politeness::Polite);

        let offer = SignalPayload::description(SessionDescription::offer("remote-offer"));
        link.handle_signal(offer).await.unwrap();

        assert_eq!(link.phase(), SignalingPhase::Stable);
        let signals = recorder.signals.lock();
        assert!(matches!(
            &signals[..],
            [SignalMessage::Description(d)] if d.kind == DescriptionKind::Answer
        ));
    }

    #[tokio::test]
    async fn test_impolite_ignores_colliding_offer() {
        let (link, recorder) = link(Politeness::Impolite);
        link.negotiation_needed().await.unwrap();

        let offer = SignalPayload::description(SessionDescription::offer("remote-offer"));
        link.handle_signal(offer).await.unwrap();

        assert!(link.is_ignoring_offer());
        assert_eq!(link.phase(), SignalingPhase::LocalOfferPending);
        assert_eq!(recorder.signals.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_polite_yields_to_colliding_offer() {
        let (link, recorder) = link(Politeness::Polite);
        link.negotiation_needed().await.unwrap();

        let offer = SignalPayload::description(SessionDescription::offer("remote-offer"));
        link.handle_signal(offer).await.unwrap();

        assert!(!link.is_ignoring_offer());
        assert_eq!(link.phase(), SignalingPhase::Stable);
        assert!(link.engine().calls().contains(&EngineCall::Rollback));

        let signals = recorder.signals.lock();
        assert_eq!(signals.len(), 2);
        assert!(matches!(&signals[1], SignalMessage::Description(d) if d.kind == DescriptionKind::Answer));
    }

    #[tokio::test]
    async fn test_echo_dropped() {
        let (link, recorder) = link(Politeness::Polite);

        let offer = SignalPayload::description(SessionDescription::offer("mine"))
            .with_sender(&SessionId::from("self"));
        link.handle_signal(offer).await.unwrap();

        assert_eq!(link.phase(), SignalingPhase::Stable);
        assert!(link.remote_description().is_none());
        assert!(recorder.signals.lock().is_empty());
    }

    #[tokio::test]
    async fn test_early_candidates_flushed_in_order() {
        let (link, _) = link(Politeness::Polite);

        link.handle_signal(candidate("c1")).await.unwrap();
        link.handle_signal(candidate("c2")).await.unwrap();
        assert_eq!(link.pending_candidates(), 2);
        assert!(link.engine().candidates().is_empty());

        let offer = SignalPayload::description(SessionDescription::offer("remote-offer"));
        link.handle_signal(offer).await.unwrap();

        assert_eq!(link.pending_candidates(), 0);
        assert_eq!(
            link.engine().candidates(),
            vec![Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_flush_continues_past_failed_candidate() {
        let (link, recorder) = link(Politeness::Polite);

        for line in ["c1", "fail-2", "c3"] {
            link.handle_signal(candidate(line)).await.unwrap();
        }
        assert_eq!(link.pending_candidates(), 3);

        let offer = SignalPayload::description(SessionDescription::offer("remote-offer"));
        link.handle_signal(offer).await.unwrap();

        assert_eq!(link.pending_candidates(), 0);
        assert_eq!(
            link.engine().candidates(),
            vec![Some("c1".to_string()), Some("c3".to_string())]
        );
        assert_eq!(recorder.errors.lock().len(), 1);
        assert_eq!(link.phase(), SignalingPhase::Stable);
    }

    #[tokio::test]
    async fn test_remote_offer_cancels_answer_apply() {
        let (link, recorder) = link(Politeness::Polite);
        link.negotiation_needed().await.unwrap();
        link.engine().set_delay(Duration::from_millis(100));

        let answer = SignalPayload::description(SessionDescription::answer("A"));
        let offer = SignalPayload::description(SessionDescription::offer("O"));
        let (answered, offered) = tokio::join!(link.handle_signal(answer), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            link.handle_signal(offer).await
        });
        answered.unwrap();
        offered.unwrap();

        assert_eq!(link.phase(), SignalingPhase::Stable);
        assert_eq!(link.remote_description(), Some(SessionDescription::offer("O")));
        assert_eq!(
            link.engine().remote_descriptions(),
            vec![SessionDescription::offer("O")]
        );
        assert!(link.engine().calls().contains(&EngineCall::Rollback));

        let signals = recorder.signals.lock();
        assert_eq!(signals.len(), 2);
        assert!(matches!(&signals[0], SignalMessage::Description(d) if d.kind == DescriptionKind::Offer));
        assert!(matches!(&signals[1], SignalMessage::Description(d) if d.kind == DescriptionKind::Answer));
    }

    #[tokio::test]
    async fn test_end_of_candidates_applied_immediately() {
        let (link, _) = link(Politeness::Polite);

        link.handle_signal(candidate("")).await.unwrap();
        assert_eq!(link.pending_candidates(), 0);
        assert_eq!(link.engine().candidates(), vec![None]);
    }

    #[tokio::test]
    async fn test_malformed_candidate_dropped() {
        let (link, _) = link(Politeness::Polite);

        let payload = SignalPayload::candidate(CandidatePayload::default());
        let result = link.handle_signal(payload).await;

        assert!(matches!(result, Err(NegotiationError::MalformedSignal(_))));
        assert_eq!(link.pending_candidates(), 0);
    }

    #[tokio::test]
    async fn test_candidate_failure_reported() {
        let (link, recorder) = link(Politeness::Polite);
        link.handle_signal(SignalPayload::description(SessionDescription::offer("o")))
            .await
            .unwrap();

        let result = link.handle_signal(candidate("fail-me")).await;
        assert!(matches!(result, Err(NegotiationError::Transport(_))));
        assert_eq!(recorder.errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_candidate_failure_suppressed_while_ignoring() {
        let (link, recorder) = link(Politeness::Impolite);
        link.handle_signal(SignalPayload::description(SessionDescription::offer("o")))
            .await
            .unwrap();
        link.negotiation_needed().await.unwrap();
        link.handle_signal(SignalPayload::description(SessionDescription::offer("o2")))
            .await
            .unwrap();
        assert!(link.is_ignoring_offer());

        link.handle_signal(candidate("fail-me")).await.unwrap();
        assert!(recorder.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn test_second_trigger_rejected() {
        let (link, _) = link(Politeness::Impolite);
        link.engine().set_delay(Duration::from_millis(50));

        let (first, second) = tokio::join!(link.negotiation_needed(), async {
            tokio::task::yield_now().await;
            link.negotiation_needed().await
        });

        assert_eq!(first, Ok(true));
        assert_eq!(second, Err(NegotiationError::OfferInFlight));
    }

    #[tokio::test]
    async fn test_trigger_deferred_until_stable() {
        let (link, recorder) = link(Politeness::Impolite);
        link.negotiation_needed().await.unwrap();

        assert_eq!(link.negotiation_needed().await, Ok(false));

        link.handle_signal(SignalPayload::description(SessionDescription::answer("a")))
            .await
            .unwrap();

        assert_eq!(link.phase(), SignalingPhase::LocalOfferPending);
        assert_eq!(recorder.signals.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_channel_telemetry() {
        let (link, recorder) = link(Politeness::Impolite);
        let sample = TelemetrySample::new(37.7749, -122.4194, 100.0, 90.0, 5.0, 1, TelemetrySource::Live);

        assert_eq!(link.send_telemetry(&sample).await, Ok(false));

        link.handle_engine_event(EngineEvent::ChannelOpen { label: TELEMETRY_CHANNEL.into() })
            .await
            .unwrap();
        assert_eq!(link.send_telemetry(&sample).await, Ok(true));
        assert_eq!(link.engine().sent_messages().len(), 1);

        link.handle_engine_event(EngineEvent::ChannelMessage(Bytes::from_static(b"not json")))
            .await
            .unwrap();
        assert!(link.is_channel_open());
        assert!(recorder.samples.lock().is_empty());

        let data = sample.to_bytes().unwrap();
        link.handle_engine_event(EngineEvent::ChannelMessage(data)).await.unwrap();
        assert_eq!(recorder.samples.lock().as_slice(), &[sample]);
    }

    #[tokio::test]
    async fn test_local_candidates_emitted() {
        let (link, recorder) = link(Politeness::Impolite);

        link.handle_engine_event(EngineEvent::LocalCandidate(IceCandidate::new("local-c1")))
            .await
            .unwrap();
        link.handle_engine_event(EngineEvent::EndOfLocalCandidates).await.unwrap();

        let signals = recorder.signals.lock();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[1], SignalMessage::EndOfCandidates);
    }

    #[tokio::test]
    async fn test_cleanup_idempotent() {
        let (link, _) = link(Politeness::Polite);
        link.handle_signal(candidate("c1")).await.unwrap();

        link.cleanup().await;
        link.cleanup().await;

        assert!(link.is_closed());
        assert_eq!(link.pending_candidates(), 0);
        assert_eq!(link.engine().close_count(), 1);
        assert_eq!(
            link.handle_signal(candidate("c2")).await,
            Err(NegotiationError::Closed)
        );
        assert_eq!(link.negotiation_needed().await, Err(NegotiationError::Closed));
    }
}
