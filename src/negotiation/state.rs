//! Peer link state machine
//!
//! Pure bookkeeping for one end of a negotiation. Every method runs under the
//! link's mutex and never awaits; the async sequencing lives in
//! [`PeerLink`](super::PeerLink).

use std::collections::VecDeque;

use tokio::sync::oneshot;

use super::error::NegotiationError;
use super::signal::IceCandidate;
use crate::protocol::{Role, SessionDescription, SessionId};

/// Fixed collision-resolution role of one link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Politeness {
    /// Yields to an incoming offer on collision
    Polite,
    /// Keeps its own offer on collision
    Impolite,
}

impl Politeness {
    /// The publisher is impolite, subscribers are polite
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Publisher => Politeness::Impolite,
            Role::Subscriber => Politeness::Polite,
        }
    }

    pub fn is_polite(self) -> bool {
        self == Politeness::Polite
    }
}

/// Where the offer/answer exchange currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingPhase {
    /// No exchange in progress
    Stable,
    /// Our offer is applied, waiting for the answer
    LocalOfferPending,
    /// A remote offer is being applied and answered
    RemoteOfferPending,
}

/// Mutable state of a [`PeerLink`](super::PeerLink)
#[derive(Debug)]
pub struct PeerLinkState {
    pub phase: SignalingPhase,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,
    pub making_offer: bool,
    pub ignore_offer: bool,
    /// Candidates received before any remote description; `None` is the
    /// end-of-candidates marker
    pub pending_candidates: VecDeque<Option<IceCandidate>>,
    pub channel_open: bool,
    pub closed: bool,
    pub local_id: Option<SessionId>,

    /// Cancels an in-flight remote answer apply
    answer_cancel: Option<oneshot::Sender<()>>,

    /// Bumped whenever our own offer is superseded by a remote one
    offer_epoch: u64,

    /// A local change arrived mid-exchange and still needs an offer
    negotiation_deferred: bool,
}

impl PeerLinkState {
    pub fn new(local_id: Option<SessionId>) -> Self {
        Self {
            phase: SignalingPhase::Stable,
            local_description: None,
            remote_description: None,
            making_offer: false,
            ignore_offer: false,
            pending_candidates: VecDeque::new(),
            channel_open: false,
            closed: false,
            local_id,
            answer_cancel: None,
            offer_epoch: 0,
            negotiation_deferred: false,
        }
    }

    pub fn ensure_open(&self) -> Result<(), NegotiationError> {
        if self.closed {
            Err(NegotiationError::Closed)
        } else {
            Ok(())
        }
    }

    /// True when the signal was sent by this very session
    pub fn is_echo(&self, sender: Option<&SessionId>) -> bool {
        matches!((sender, &self.local_id), (Some(s), Some(own)) if s == own)
    }

    /// Start creating a local offer
    ///
    /// Returns `Ok(None)` when an exchange is already underway; the offer is
    /// then deferred until the link is stable again.
    pub fn begin_offer(&mut self) -> Result<Option<u64>, NegotiationError> {
        self.ensure_open()?;
        if self.making_offer {
            return Err(NegotiationError::OfferInFlight);
        }
        if self.phase != SignalingPhase::Stable {
            self.negotiation_deferred = true;
            return Ok(None);
        }
        self.making_offer = true;
        self.negotiation_deferred = false;
        Ok(Some(self.offer_epoch))
    }

    /// Whether an offer started at `epoch` is still ours to complete
    pub fn offer_current(&self, epoch: u64) -> bool {
        !self.closed && self.making_offer && self.offer_epoch == epoch
    }

    /// Local offer installed; returns false if it was superseded meanwhile
    pub fn offer_applied(&mut self, epoch: u64, offer: SessionDescription) -> bool {
        if !self.offer_current(epoch) {
            return false;
        }
        self.making_offer = false;
        self.phase = SignalingPhase::LocalOfferPending;
        self.local_description = Some(offer);
        true
    }

    /// Local offer creation failed
    pub fn offer_failed(&mut self, epoch: u64) {
        if self.offer_epoch == epoch {
            self.making_offer = false;
        }
    }

    /// Evaluate an incoming offer and record whether it must be ignored
    pub fn should_ignore_offer(&mut self, politeness: Politeness) -> bool {
        let collision = self.making_offer || self.phase != SignalingPhase::Stable;
        self.ignore_offer = !politeness.is_polite() && collision;
        self.ignore_offer
    }

    /// Commit to answering a remote offer
    ///
    /// Any local offer in progress is superseded and any in-flight answer
    /// apply is cancelled.
    pub fn accept_remote_offer(&mut self) {
        if let Some(cancel) = self.answer_cancel.take() {
            let _ = cancel.send(());
        }
        if self.making_offer {
            self.making_offer = false;
            self.offer_epoch += 1;
        }
        if self.phase == SignalingPhase::LocalOfferPending {
            self.local_description = None;
        }
        self.phase = SignalingPhase::RemoteOfferPending;
    }

    /// Start applying a remote answer; `None` if no local offer awaits one
    pub fn begin_answer(&mut self) -> Option<oneshot::Receiver<()>> {
        if self.phase != SignalingPhase::LocalOfferPending {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        self.answer_cancel = Some(tx);
        Some(rx)
    }

    /// Record a remote description and drain candidates queued before it
    pub fn remote_applied(&mut self, description: SessionDescription) -> Vec<Option<IceCandidate>> {
        self.remote_description = Some(description);
        self.pending_candidates.drain(..).collect()
    }

    /// Remote answer applied; back to stable
    ///
    /// Returns `None` if a remote offer took over while the answer was being
    /// applied.
    pub fn answer_applied(
        &mut self,
        answer: SessionDescription,
    ) -> Option<Vec<Option<IceCandidate>>> {
        self.answer_cancel.take()?;
        self.phase = SignalingPhase::Stable;
        Some(self.remote_applied(answer))
    }

    /// Remote answer rejected; returns false if it was already superseded
    pub fn answer_failed(&mut self) -> bool {
        if self.answer_cancel.take().is_none() {
            return false;
        }
        self.phase = SignalingPhase::Stable;
        true
    }

    /// Local answer installed; back to stable
    pub fn local_answer_applied(&mut self, answer: SessionDescription) {
        self.local_description = Some(answer);
        self.phase = SignalingPhase::Stable;
    }

    /// Remote offer rejected; back to stable
    pub fn offer_rejected(&mut self) {
        self.phase = SignalingPhase::Stable;
    }

    /// Queue a candidate unless a remote description is set
    ///
    /// Returns the candidate back when it should be applied right away. The
    /// end-of-candidates marker is never queued.
    pub fn admit_candidate(&mut self, candidate: Option<IceCandidate>) -> Option<Option<IceCandidate>> {
        if self.remote_description.is_some() || candidate.is_none() {
            return Some(candidate);
        }
        self.pending_candidates.push_back(candidate);
        None
    }

    /// Take the deferred-negotiation flag if the link is stable
    pub fn take_deferred(&mut self) -> bool {
        if self.closed || self.phase != SignalingPhase::Stable {
            return false;
        }
        std::mem::take(&mut self.negotiation_deferred)
    }

    /// Tear down; returns false if already closed
    pub fn reset(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if let Some(cancel) = self.answer_cancel.take() {
            let _ = cancel.send(());
        }
        self.closed = true;
        self.phase = SignalingPhase::Stable;
        self.making_offer = false;
        self.ignore_offer = false;
        self.channel_open = false;
        self.negotiation_deferred = false;
        self.pending_candidates.clear();
        self.offer_epoch += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_politeness_for_role() {
        assert_eq!(Politeness::for_role(Role::Publisher), Politeness::Impolite);
        assert_eq!(Politeness::for_role(Role::Subscriber), Politeness::Polite);
        assert!(Politeness::Polite.is_polite());
    }

    #[test]
    fn test_offer_lifecycle() {
        let mut state = PeerLinkState::new(None);

        let epoch = state.begin_offer().unwrap().unwrap();
        assert!(state.making_offer);
        assert_eq!(state.begin_offer(), Err(NegotiationError::OfferInFlight));

        assert!(state.offer_applied(epoch, SessionDescription::offer("o")));
        assert!(!state.making_offer);
        assert_eq!(state.phase, SignalingPhase::LocalOfferPending);

        let rx = state.begin_answer();
        assert!(rx.is_some());
        let drained = state.answer_applied(SessionDescription::answer("a")).unwrap();
        assert!(drained.is_empty());
        assert_eq!(state.phase, SignalingPhase::Stable);
    }

    #[test]
    fn test_collision_rules() {
        let mut state = PeerLinkState::new(None);
        assert!(!state.should_ignore_offer(Politeness::Impolite));

        state.begin_offer().unwrap();
        assert!(state.should_ignore_offer(Politeness::Impolite));
        assert!(!state.should_ignore_offer(Politeness::Polite));
    }

    #[test]
    fn test_remote_offer_supersedes_local() {
        let mut state = PeerLinkState::new(None);
        let epoch = state.begin_offer().unwrap().unwrap();

        state.accept_remote_offer();
        assert!(!state.making_offer);
        assert_eq!(state.phase, SignalingPhase::RemoteOfferPending);
        assert!(!state.offer_applied(epoch, SessionDescription::offer("late")));
        assert!(state.local_description.is_none());
    }

    #[test]
    fn test_accept_remote_offer_cancels_answer() {
        let mut state = PeerLinkState::new(None);
        let epoch = state.begin_offer().unwrap().unwrap();
        state.offer_applied(epoch, SessionDescription::offer("o"));

        let mut rx = state.begin_answer().unwrap();
        state.accept_remote_offer();
        assert_eq!(rx.try_recv(), Ok(()));
        assert!(state.answer_applied(SessionDescription::answer("stale")).is_none());
        assert!(!state.answer_failed());
        assert_eq!(state.phase, SignalingPhase::RemoteOfferPending);
    }

    #[test]
    fn test_candidates_queue_until_remote() {
        let mut state = PeerLinkState::new(None);

        assert!(state.admit_candidate(Some(IceCandidate::new("c1"))).is_none());
        assert!(state.admit_candidate(Some(IceCandidate::new("c2"))).is_none());
        assert_eq!(state.admit_candidate(None), Some(None));
        assert_eq!(state.pending_candidates.len(), 2);

        let drained = state.remote_applied(SessionDescription::offer("o"));
        let names: Vec<_> = drained
            .iter()
            .map(|c| c.as_ref().map(|c| c.candidate.as_str()))
            .collect();
        assert_eq!(names, vec![Some("c1"), Some("c2")]);
        assert!(state.pending_candidates.is_empty());

        assert!(state.admit_candidate(Some(IceCandidate::new("c3"))).is_some());
    }

    #[test]
    fn test_deferred_offer() {
        let mut state = PeerLinkState::new(None);
        state.accept_remote_offer();

        assert_eq!(state.begin_offer(), Ok(None));
        assert!(!state.take_deferred());

        state.local_answer_applied(SessionDescription::answer("a"));
        assert!(state.take_deferred());
        assert!(!state.take_deferred());
    }

    #[test]
    fn test_echo_detection() {
        let state = PeerLinkState::new(Some(SessionId::from("me")));
        assert!(state.is_echo(Some(&SessionId::from("me"))));
        assert!(!state.is_echo(Some(&SessionId::from("you"))));
        assert!(!state.is_echo(None));

        let anonymous = PeerLinkState::new(None);
        assert!(!anonymous.is_echo(Some(&SessionId::from("me"))));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut state = PeerLinkState::new(None);
        state.admit_candidate(Some(IceCandidate::new("c1")));

        assert!(state.reset());
        assert!(state.pending_candidates.is_empty());
        assert_eq!(state.ensure_open(), Err(NegotiationError::Closed));
        assert!(!state.reset());
    }
}
