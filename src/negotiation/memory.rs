//! In-process media engine
//!
//! Deterministic stand-in for a real transport stack. Descriptions are
//! numbered strings, every call is recorded, and two engines can be paired so
//! direct-channel frames sent on one surface as [`EngineEvent::ChannelMessage`]
//! on the other.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::engine::{EngineEvent, MediaEngine};
use super::error::EngineError;
use super::signal::IceCandidate;
use crate::protocol::{DescriptionKind, SessionDescription};

/// One recorded engine interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create(SessionDescription),
    ApplyLocal(SessionDescription),
    ApplyRemote(SessionDescription),
    /// A pending local offer was discarded by an incoming remote offer
    Rollback,
    AddCandidate(Option<String>),
    OpenChannel(String),
    Send(Bytes),
    Close,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<EngineCall>,
    generated: u32,
    local_offer: bool,
    remote_set: bool,
    closed: bool,
    delay: Option<Duration>,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
    peer: Option<mpsc::UnboundedSender<EngineEvent>>,
}

/// Recording [`MediaEngine`] for tests and demos
#[derive(Debug)]
pub struct MemoryEngine {
    name: String,
    inner: Mutex<Inner>,
}

impl MemoryEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Deliver this engine's own events (channel open) to `events`
    pub fn with_events(self, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.inner.lock().events = Some(events);
        self
    }

    /// Route direct-channel traffic to the remote engine's event stream
    pub fn connect_peer(&self, peer: mpsc::UnboundedSender<EngineEvent>) {
        self.inner.lock().peer = Some(peer);
    }

    /// Suspend description creation and remote applies for `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = Some(delay);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    /// Remote descriptions applied, in order
    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::ApplyRemote(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    /// Candidates applied, in order; `None` is end-of-candidates
    pub fn candidates(&self) -> Vec<Option<String>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::AddCandidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<Bytes> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Send(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| **call == EngineCall::Close)
            .count()
    }

    async fn pause(&self) {
        let delay = self.inner.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MediaEngine for MemoryEngine {
    async fn create_description(
        &self,
        kind: DescriptionKind,
    ) -> Result<SessionDescription, EngineError> {
        self.pause().await;

        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EngineError::new("engine closed"));
        }
        if kind == DescriptionKind::Answer && !inner.remote_set {
            return Err(EngineError::new("no remote offer to answer"));
        }
        inner.generated += 1;
        let description = SessionDescription {
            kind,
            payload: format!("{}-{}-{}", self.name, kind, inner.generated),
        };
        inner.calls.push(EngineCall::Create(description.clone()));
        Ok(description)
    }

    async fn apply_local_description(
        &self,
        description: &SessionDescription,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EngineError::new("engine closed"));
        }
        inner.local_offer = description.kind == DescriptionKind::Offer;
        inner.calls.push(EngineCall::ApplyLocal(description.clone()));
        Ok(())
    }

    async fn apply_remote_description(
        &self,
        description: &SessionDescription,
    ) -> Result<(), EngineError> {
        self.pause().await;

        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EngineError::new("engine closed"));
        }
        match description.kind {
            DescriptionKind::Offer => {
                if inner.local_offer {
                    inner.local_offer = false;
                    inner.calls.push(EngineCall::Rollback);
                }
            }
            DescriptionKind::Answer => {
                if !inner.local_offer {
                    return Err(EngineError::new("answer without local offer"));
                }
                inner.local_offer = false;
            }
        }
        inner.remote_set = true;
        inner.calls.push(EngineCall::ApplyRemote(description.clone()));
        Ok(())
    }

    async fn add_candidate(&self, candidate: Option<&IceCandidate>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if let Some(candidate) = candidate {
            if !inner.remote_set {
                return Err(EngineError::new("candidate before remote description"));
            }
            if candidate.candidate.contains("fail") {
                return Err(EngineError::new(format!(
                    "rejected candidate {}",
                    candidate.candidate
                )));
            }
        }
        inner
            .calls
            .push(EngineCall::AddCandidate(candidate.map(|c| c.candidate.clone())));
        Ok(())
    }

    async fn open_channel(&self, label: &str) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EngineError::new("engine closed"));
        }
        inner.calls.push(EngineCall::OpenChannel(label.to_string()));

        let open = EngineEvent::ChannelOpen {
            label: label.to_string(),
        };
        for sink in [&inner.events, &inner.peer].into_iter().flatten() {
            let _ = sink.send(open.clone());
        }
        Ok(())
    }

    async fn send_channel_message(&self, data: Bytes) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EngineError::new("channel closed"));
        }
        inner.calls.push(EngineCall::Send(data.clone()));
        if let Some(peer) = &inner.peer {
            let _ = peer.send(EngineEvent::ChannelMessage(data));
        }
        Ok(())
    }

    async fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.calls.push(EngineCall::Close);
        if let Some(peer) = inner.peer.take() {
            let _ = peer.send(EngineEvent::ChannelClosed);
        }
    }
}
