//! Signal payloads as they travel over the wire
//!
//! These are relayed by the registry without interpretation beyond stamping
//! `senderId`. The peer side turns them into a
//! [`SignalMessage`](crate::negotiation::SignalMessage) before acting on them.

use serde::{Deserialize, Serialize};

use super::message::SessionId;

/// Whether a description proposes (offer) or accepts (answer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    Offer,
    Answer,
}

impl std::fmt::Display for DescriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionKind::Offer => write!(f, "offer"),
            DescriptionKind::Answer => write!(f, "answer"),
        }
    }
}

/// A transport description produced by the media engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: DescriptionKind,
    pub payload: String,
}

impl SessionDescription {
    pub fn offer(payload: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Offer,
            payload: payload.into(),
        }
    }

    pub fn answer(payload: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Answer,
            payload: payload.into(),
        }
    }
}

/// Raw candidate fields; any of them may be missing on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePayload {
    #[serde(default)]
    pub candidate: Option<String>,
    #[serde(default, rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, rename = "usernameFragment")]
    pub username_fragment: Option<String>,
}

/// Body of a `signal` event
///
/// Carries either a description or a candidate. `senderId` is only ever set
/// by the registry when relaying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidatePayload>,
    #[serde(default, rename = "senderId", skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<SessionId>,
}

impl SignalPayload {
    pub fn description(description: SessionDescription) -> Self {
        Self {
            description: Some(description),
            ..Default::default()
        }
    }

    pub fn candidate(candidate: CandidatePayload) -> Self {
        Self {
            candidate: Some(candidate),
            ..Default::default()
        }
    }

    /// Copy of this payload stamped with the relaying sender's id
    pub fn with_sender(&self, sender: &SessionId) -> Self {
        Self {
            sender_id: Some(sender.clone()),
            ..self.clone()
        }
    }
}
